//! Background consolidation and reporting.
//!
//! The consolidator sleeps on the counters until a cycle is due: `read_period` new
//! reads or `time_period` elapsed since the last cycle, whichever comes first. A cycle
//! runs entirely under the model lock, so it never overlaps bridge submission or
//! another cycle. When the ingest loop stops, exactly one final cycle runs, the
//! sequences are flushed and the report sink is closed before the thread exits.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, error, info};

use crate::core::counters::{Counters, Wake};
use crate::model::{ScaffoldModel, SharedModel};
use crate::pipeline::PipelineError;
use crate::report::{ReportRow, ReportSink};

const TIME_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

pub struct Consolidator<M> {
    model: SharedModel<M>,
    counters: Arc<Counters>,
    sink: ReportSink,
    time_period: Option<Duration>,
    started: Instant,
    cycles: u64,
}

impl<M: ScaffoldModel + 'static> Consolidator<M> {
    /// A zero `time_period` disables timed cycles.
    pub fn new(
        model: SharedModel<M>,
        counters: Arc<Counters>,
        sink: ReportSink,
        time_period: Duration,
    ) -> Self {
        Self {
            model,
            counters,
            sink,
            time_period: (!time_period.is_zero()).then_some(time_period),
            started: Instant::now(),
            cycles: 0,
        }
    }

    /// Start the consolidator on its own thread.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the thread cannot be spawned.
    pub fn spawn(self) -> std::io::Result<ConsolidatorHandle> {
        let counters = Arc::clone(&self.counters);
        let thread = thread::Builder::new()
            .name("consolidator".to_string())
            .spawn(move || self.run())?;
        Ok(ConsolidatorHandle { counters, thread })
    }

    /// Run cycles until a stop is requested, then finish. Returns the number of cycles.
    pub fn run(mut self) -> u64 {
        let mut last_tick = Instant::now();
        loop {
            let deadline = self.time_period.map(|period| last_tick + period);
            match self.counters.wait_for_tick(deadline) {
                Wake::Tick => {
                    self.cycle(false);
                    last_tick = Instant::now();
                }
                Wake::Stop => break,
            }
        }
        self.finish()
    }

    /// One consolidation and report, holding the model lock throughout
    fn cycle(&mut self, final_cycle: bool) {
        let mut model = self.model.lock();
        model.connect_bridges();

        let snapshot = self.counters.mark_tick();
        model.print_rt(snapshot.bases);
        if model.updates_in_place() {
            if let Err(e) = model.print_sequences(true, final_cycle) {
                error!(error = %e, "Failed to write scaffold sequences");
            }
        }

        let row = ReportRow {
            time: chrono::Local::now().format(TIME_FORMAT).to_string(),
            step: self.started.elapsed().as_secs(),
            reads: snapshot.reads,
            bases: snapshot.bases,
            scaffolds: model.number_of_contigs(),
            circular: model.number_of_circulars(),
            n50: model.n50(),
            gaps: model.gaps_info(),
        };
        if let Err(e) = self.sink.write_row(&row) {
            error!(error = %e, "Failed to write report row");
        }

        self.cycles += 1;
        debug!(
            cycle = self.cycles,
            reads = row.reads,
            scaffolds = row.scaffolds,
            n50 = row.n50,
            final_cycle,
            "Consolidation cycle"
        );
    }

    fn finish(mut self) -> u64 {
        info!("Stop requested, running final consolidation");
        {
            let mut model = self.model.lock();
            if model.has_auxiliary_graph() {
                model.force_deferred_bridges();
            }
        }

        self.cycle(true);

        {
            let mut model = self.model.lock();
            if !model.updates_in_place() {
                if let Err(e) = model.print_sequences(true, true) {
                    error!(error = %e, "Failed to write final scaffold sequences");
                }
            }
        }

        if let Err(e) = self.sink.close() {
            error!(error = %e, "Failed to close report");
        }
        info!(cycles = self.cycles, "Final flush complete");
        self.cycles
    }
}

/// Handle to a running consolidator thread
pub struct ConsolidatorHandle {
    counters: Arc<Counters>,
    thread: JoinHandle<u64>,
}

impl ConsolidatorHandle {
    /// Signal stop and wait for the final cycle to complete. Returns the number of cycles.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::ConsolidatorPanicked` if the thread panicked.
    pub fn stop_and_join(self) -> Result<u64, PipelineError> {
        self.counters.request_stop();
        self.thread
            .join()
            .map_err(|_| PipelineError::ConsolidatorPanicked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::shared;
    use crate::pipeline::test_support::RecordingModel;
    use crate::report::OutputFormat;
    use std::io::{self, Write};
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuf {
        fn lines(&self) -> Vec<String> {
            String::from_utf8(self.0.lock().unwrap().clone())
                .unwrap()
                .lines()
                .map(ToString::to_string)
                .collect()
        }
    }

    /// Writer logging writes, flushes and its own release
    struct LoggedWriter {
        log: Arc<Mutex<Vec<String>>>,
        lines: usize,
    }

    impl Write for LoggedWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.lines += buf.iter().filter(|&&b| b == b'\n').count();
            self.log.lock().unwrap().push("write".to_string());
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            self.log.lock().unwrap().push("flush".to_string());
            Ok(())
        }
    }

    impl Drop for LoggedWriter {
        fn drop(&mut self) {
            let lines = self.lines;
            self.log.lock().unwrap().push(format!("drop after {lines} lines"));
        }
    }

    fn sink(buf: &SharedBuf) -> ReportSink {
        ReportSink::from_writer(Box::new(buf.clone()), OutputFormat::Tsv)
    }

    #[test]
    fn test_stop_runs_one_final_cycle() {
        let model = shared(RecordingModel::default());
        let counters = Arc::new(Counters::new(0));
        let buf = SharedBuf::default();

        let handle = Consolidator::new(model.clone(), counters, sink(&buf), Duration::ZERO)
            .spawn()
            .unwrap();
        let cycles = handle.stop_and_join().unwrap();

        assert_eq!(cycles, 1);
        let model = model.lock();
        assert_eq!(model.events, ["connect", "print(true,true)"]);
        // Header plus one row
        assert_eq!(buf.lines().len(), 2);
    }

    #[test]
    fn test_sink_closed_after_final_row() {
        let model = shared(RecordingModel::default());
        let counters = Arc::new(Counters::new(0));
        let log = Arc::new(Mutex::new(Vec::new()));
        let writer = LoggedWriter {
            log: Arc::clone(&log),
            lines: 0,
        };
        let sink = ReportSink::from_writer(Box::new(writer), OutputFormat::Tsv);

        counters.record_read(10);
        let handle = Consolidator::new(model, counters, sink, Duration::ZERO)
            .spawn()
            .unwrap();
        handle.stop_and_join().unwrap();

        let events = log.lock().unwrap().clone();
        let last_write = events.iter().rposition(|e| e == "write").unwrap();
        let dropped = events.iter().position(|e| e.starts_with("drop")).unwrap();
        assert!(last_write < dropped);
        // Row flush, then the closing flush, then release with header and row written
        assert_eq!(
            events[events.len() - 3..],
            ["flush", "flush", "drop after 2 lines"]
        );
    }

    #[test]
    fn test_in_place_model_prints_every_cycle() {
        let model = shared(RecordingModel {
            in_place: true,
            auxiliary: true,
            ..RecordingModel::default()
        });
        let counters = Arc::new(Counters::new(2));
        let buf = SharedBuf::default();

        let handle = Consolidator::new(
            model.clone(),
            Arc::clone(&counters),
            sink(&buf),
            Duration::ZERO,
        )
        .spawn()
        .unwrap();

        counters.record_read(10);
        counters.record_read(10);
        // Wait for the count-driven cycle before stopping
        let start = Instant::now();
        while model.lock().connected_at.is_empty() && start.elapsed() < Duration::from_secs(5) {
            thread::sleep(Duration::from_millis(5));
        }
        let cycles = handle.stop_and_join().unwrap();

        assert_eq!(cycles, 2);
        let model = model.lock();
        assert_eq!(
            model.events,
            [
                "connect",
                "print(true,false)",
                "force",
                "connect",
                "print(true,true)"
            ]
        );
        let lines = buf.lines();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].contains("\t2\t20\t"));
    }

    #[test]
    fn test_time_period_drives_cycles() {
        let model = shared(RecordingModel::default());
        let counters = Arc::new(Counters::new(0));
        let buf = SharedBuf::default();

        let handle = Consolidator::new(
            model.clone(),
            counters,
            sink(&buf),
            Duration::from_millis(20),
        )
        .spawn()
        .unwrap();
        thread::sleep(Duration::from_millis(150));
        let cycles = handle.stop_and_join().unwrap();

        assert!(cycles >= 3, "expected timed cycles, got {cycles}");
        assert_eq!(model.lock().connected_at.len() as u64, cycles);
    }
}
