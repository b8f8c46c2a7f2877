//! The streaming scaffolding pipeline.
//!
//! Two threads cooperate over one shared model:
//!
//! - the **ingest** thread (the caller of [`driver::Pipeline::run`]) groups alignment
//!   records by read ([`grouping`]), advances the counters and submits bridges
//!   ([`bridges`]);
//! - the **consolidator** thread ([`consolidator`]) periodically merges bridges into
//!   scaffolds and writes one report row per cycle.
//!
//! The model lock serializes bridge submission against consolidation; the counters have
//! a lock of their own so the ingest loop never waits on a running cycle just to count
//! a read.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use rt_scaffold::model::{graph::ContigGraph, shared, ScaffoldModel};
//! use rt_scaffold::parsing::fasta::load_contigs;
//! use rt_scaffold::pipeline::{config::PipelineConfig, driver::Pipeline};
//! use rt_scaffold::report::{OutputFormat, ReportSink};
//! use rt_scaffold::source::AlignmentSource;
//!
//! let config = PipelineConfig::default();
//! let contigs = load_contigs(Path::new("contigs.fasta")).unwrap();
//! let graph = ContigGraph::new(contigs, config.graph_options());
//! let source = AlignmentSource::from_path(Path::new("aln.sam"), None, graph.usability_rule()).unwrap();
//!
//! let sink = ReportSink::create(Path::new("-"), OutputFormat::Text).unwrap();
//! let summary = Pipeline::new(shared(graph), sink, &config).run(source).unwrap();
//! println!("{} reads, {} bridges", summary.reads, summary.bridges);
//! ```

use std::io;

use serde::Serialize;
use thiserror::Error;

use crate::parsing::fasta::ContigError;
use crate::source::SourceError;

pub mod bridges;
pub mod config;
pub mod consolidator;
pub mod driver;
pub mod grouping;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("Failed to launch aligner: {0}")]
    AlignerLaunch(#[source] SourceError),

    #[error("Failed to load contigs: {0}")]
    Contigs(#[from] ContigError),

    #[error("Failed to read alignment record: {0}")]
    Ingest(#[source] io::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Consolidator thread panicked")]
    ConsolidatorPanicked,
}

/// Totals of one pipeline run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Distinct read names seen
    pub reads: u64,

    /// Sum of read lengths over distinct reads
    pub bases: u64,

    /// Read batches handed to the bridge submitter
    pub batches: u64,

    pub bridges: u64,

    /// Consolidation cycles, including the final one
    pub cycles: u64,

    pub elapsed_secs: u64,
}
