//! Pipeline lifecycle: start the consolidator, ingest, then shut down in order.

use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::core::counters::Counters;
use crate::model::{ScaffoldModel, SharedModel};
use crate::pipeline::bridges::BridgeSubmitter;
use crate::pipeline::config::PipelineConfig;
use crate::pipeline::consolidator::Consolidator;
use crate::pipeline::grouping::ReadGroups;
use crate::pipeline::{PipelineError, RunSummary};
use crate::report::ReportSink;
use crate::source::aligner::AlignerProcess;
use crate::source::{AlignmentSource, SourceRecord};

pub struct Pipeline<M> {
    model: SharedModel<M>,
    counters: Arc<Counters>,
    sink: ReportSink,
    min_quality: u8,
    min_coverage: f64,
    time_period: Duration,
    aligner: Option<AlignerProcess>,
}

impl<M: ScaffoldModel + 'static> Pipeline<M> {
    pub fn new(model: SharedModel<M>, sink: ReportSink, config: &PipelineConfig) -> Self {
        Self {
            model,
            counters: Arc::new(Counters::new(config.read_period)),
            sink,
            min_quality: config.min_quality,
            min_coverage: config.min_coverage,
            time_period: config.time_period,
            aligner: None,
        }
    }

    /// Reap `process` once its output has been consumed
    #[must_use]
    pub fn with_aligner(mut self, process: AlignerProcess) -> Self {
        self.aligner = Some(process);
        self
    }

    /// Scaffold from `source` until it is exhausted.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Ingest` if a record cannot be read, after the final
    /// consolidation has still run, or `PipelineError::ConsolidatorPanicked`.
    pub fn run(self, source: AlignmentSource) -> Result<RunSummary, PipelineError> {
        info!(source = source.description(), "Reading alignments");
        self.run_records(source, AlignmentSource::close)
    }

    /// Scaffold from any record stream; `close` releases it once the consolidator
    /// has finished.
    ///
    /// # Errors
    ///
    /// See [`Pipeline::run`].
    pub fn run_records<I, F>(mut self, mut records: I, close: F) -> Result<RunSummary, PipelineError>
    where
        I: Iterator<Item = io::Result<SourceRecord>>,
        F: FnOnce(&mut I),
    {
        let started = Instant::now();
        let spawned = Consolidator::new(
            Arc::clone(&self.model),
            Arc::clone(&self.counters),
            self.sink,
            self.time_period,
        )
        .spawn();
        let consolidator = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                close(&mut records);
                reap(self.aligner.take());
                return Err(e.into());
            }
        };
        info!("Scaffolding ready");

        let submitter = BridgeSubmitter::new(Arc::clone(&self.model), self.min_coverage);
        let mut batches = 0u64;
        let mut bridges = 0u64;
        let mut ingest_error = None;

        for batch in ReadGroups::new(records.by_ref(), Arc::clone(&self.counters), self.min_quality)
        {
            match batch {
                Ok(batch) => {
                    batches += 1;
                    bridges += submitter.submit(&batch) as u64;
                }
                Err(e) => {
                    warn!(error = %e, "Stopping ingest early");
                    ingest_error = Some(e);
                    break;
                }
            }
        }

        let cycles = consolidator.stop_and_join();
        close(&mut records);
        reap(self.aligner.take());

        if let Some(e) = ingest_error {
            return Err(e);
        }
        let cycles = cycles?;

        let snapshot = self.counters.snapshot();
        let summary = RunSummary {
            reads: snapshot.reads,
            bases: snapshot.bases,
            batches,
            bridges,
            cycles,
            elapsed_secs: started.elapsed().as_secs(),
        };
        info!(
            reads = summary.reads,
            bases = summary.bases,
            bridges = summary.bridges,
            cycles = summary.cycles,
            "Scaffolding finished"
        );
        Ok(summary)
    }
}

/// Wait for the aligner, if any, once its output is no longer read
fn reap(aligner: Option<AlignerProcess>) {
    if let Some(process) = aligner {
        process.wait();
    }
}
