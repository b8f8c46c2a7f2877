//! End-to-end tests of the streaming pipeline against an instrumented model.

use std::io::{self, Cursor, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rt_scaffold::model::{shared, AnyMapped, ScaffoldModel, SharedModel, UsabilityRule};
use rt_scaffold::model::graph::{ContigGraph, GraphOptions};
use rt_scaffold::pipeline::config::PipelineConfig;
use rt_scaffold::pipeline::driver::Pipeline;
use rt_scaffold::report::{OutputFormat, ReportSink};
use rt_scaffold::source::{AlignmentFormat, AlignmentSource, SourceRecord};
use rt_scaffold::{AlignmentRecord, Contig, ReadBatch, Strand};

/// Model that logs every call, in order
#[derive(Default)]
struct TraceModel {
    bridges: u64,
    bridges_at_connect: Vec<u64>,
    calls: Vec<String>,
}

impl ScaffoldModel for TraceModel {
    fn usability_rule(&self) -> Arc<dyn UsabilityRule> {
        Arc::new(AnyMapped)
    }

    fn add_bridge(&mut self, read: &ReadBatch, a: &AlignmentRecord, b: &AlignmentRecord, _: f64) {
        assert!(a.usable && b.usable, "bridge from unusable record");
        assert_eq!(a.read_name, read.read_name);
        self.bridges += 1;
    }

    fn connect_bridges(&mut self) {
        self.bridges_at_connect.push(self.bridges);
        self.calls.push("connect".to_string());
    }

    fn print_sequences(&mut self, update_in_place: bool, final_flag: bool) -> io::Result<()> {
        self.calls
            .push(format!("print({update_in_place},{final_flag})"));
        Ok(())
    }

    fn number_of_contigs(&self) -> usize {
        0
    }

    fn number_of_circulars(&self) -> usize {
        0
    }

    fn n50(&self) -> u64 {
        0
    }

    fn gaps_info(&self) -> String {
        format!("{} (0)", self.bridges)
    }
}

#[derive(Clone, Default)]
struct Capture(Arc<Mutex<Vec<u8>>>);

impl Write for Capture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Capture {
    fn text(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

fn config(read_period: u64) -> PipelineConfig {
    PipelineConfig {
        read_period,
        time_period: Duration::ZERO,
        ..PipelineConfig::default()
    }
}

fn record(name: &str, contig: usize, len: u64, usable: bool) -> io::Result<SourceRecord> {
    Ok(SourceRecord {
        record: AlignmentRecord::mapped(name, contig, 60, 1, 100, Strand::Forward)
            .with_read_span(0, 100, len)
            .with_usable(usable),
        sequence: Vec::new(),
    })
}

fn run_with<M: ScaffoldModel + 'static>(
    model: &SharedModel<M>,
    records: Vec<io::Result<SourceRecord>>,
    read_period: u64,
    report: &Capture,
) -> rt_scaffold::RunSummary {
    let sink = ReportSink::from_writer(Box::new(report.clone()), OutputFormat::Tsv);
    Pipeline::new(Arc::clone(model), sink, &config(read_period))
        .run_records(records.into_iter(), |_| {})
        .unwrap()
}

#[test]
fn test_three_reads_one_bridge() {
    let model = shared(TraceModel::default());
    let report = Capture::default();
    let records = vec![
        record("R1", 0, 1000, true),
        record("R1", 1, 1000, true),
        record("R1", 2, 1000, false),
        record("R2", 0, 500, true),
        record("R3", 1, 200, false),
    ];

    let summary = run_with(&model, records, 0, &report);

    assert_eq!(summary.reads, 3);
    assert_eq!(summary.bases, 1700);
    assert_eq!(summary.bridges, 1);
    assert_eq!(summary.cycles, 1);

    let model = model.lock();
    assert_eq!(model.bridges_at_connect, [1]);

    let text = report.text();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2, "header and the final row");
    let fields: Vec<&str> = lines[1].split('\t').collect();
    assert_eq!(fields[2], "3");
    assert_eq!(fields[3], "1700");
    assert_eq!(fields[7], "1 (0)");
}

#[test]
fn test_bridges_per_read_are_pairs() {
    let model = shared(TraceModel::default());
    let mut records = Vec::new();
    for (read, k) in [0usize, 1, 2, 3, 4, 6].iter().enumerate() {
        for contig in 0..*k {
            records.push(record(&format!("read{read}"), contig, 100, true));
        }
        // An unusable record never adds pairs
        records.push(record(&format!("read{read}"), 99, 100, false));
    }

    let summary = run_with(&model, records, 0, &Capture::default());
    // 0 + 0 + 1 + 3 + 6 + 15
    assert_eq!(summary.bridges, 25);
    assert_eq!(model.lock().bridges, 25);
}

#[test]
fn test_counters_independent_of_cadence() {
    for read_period in [0, 1, 7, 1000] {
        let model = shared(TraceModel::default());
        let mut records = Vec::new();
        for i in 0..200u64 {
            for contig in 0..(i % 3) as usize {
                records.push(record(&format!("r{i}"), contig, 100 + i, true));
            }
            if i % 3 == 0 {
                records.push(record(&format!("r{i}"), 0, 100 + i, false));
            }
        }

        let summary = run_with(&model, records, read_period, &Capture::default());
        assert_eq!(summary.reads, 200, "read_period {read_period}");
        assert_eq!(summary.bases, (0..200u64).map(|i| 100 + i).sum::<u64>());
    }
}

#[test]
fn test_bridge_counts_monotonic_across_cycles() {
    let model = shared(TraceModel::default());
    let mut records = Vec::new();
    for i in 0..5000 {
        for contig in 0..3 {
            records.push(record(&format!("r{i}"), contig, 100, true));
        }
    }

    let summary = run_with(&model, records, 25, &Capture::default());
    let model = model.lock();

    assert_eq!(summary.bridges, 15_000);
    assert_eq!(model.bridges_at_connect.len() as u64, summary.cycles);
    assert!(model
        .bridges_at_connect
        .windows(2)
        .all(|w| w[0] <= w[1]));
    // Each read's three bridges land together
    assert!(model.bridges_at_connect.iter().all(|n| n % 3 == 0));
    assert_eq!(model.bridges_at_connect.last().copied(), Some(15_000));
}

#[test]
fn test_shutdown_order() {
    let model = shared(TraceModel::default());
    let observer = Arc::clone(&model);
    let sink = ReportSink::from_writer(Box::new(io::sink()), OutputFormat::Text);

    Pipeline::new(Arc::clone(&model), sink, &config(0))
        .run_records(vec![record("R1", 0, 10, true)].into_iter(), move |_| {
            observer.lock().calls.push("close source".to_string());
        })
        .unwrap();

    assert_eq!(
        model.lock().calls,
        ["connect", "print(true,true)", "close source"]
    );
}

/// Report writer that logs its own release into the model's call list
struct ClosingWriter {
    model: SharedModel<TraceModel>,
    lines: usize,
}

impl Write for ClosingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.lines += buf.iter().filter(|&&b| b == b'\n').count();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for ClosingWriter {
    fn drop(&mut self) {
        let lines = self.lines;
        self.model.lock().calls.push(format!("close sink after {lines} lines"));
    }
}

#[test]
fn test_sink_closes_between_final_cycle_and_source() {
    let model = shared(TraceModel::default());
    let observer = Arc::clone(&model);
    let writer = ClosingWriter {
        model: Arc::clone(&model),
        lines: 0,
    };
    let sink = ReportSink::from_writer(Box::new(writer), OutputFormat::Text);

    Pipeline::new(Arc::clone(&model), sink, &config(0))
        .run_records(vec![record("R1", 0, 10, true)].into_iter(), move |_| {
            observer.lock().calls.push("close source".to_string());
        })
        .unwrap();

    // Header and final row are both out before the sink is released
    assert_eq!(
        model.lock().calls,
        [
            "connect",
            "print(true,true)",
            "close sink after 2 lines",
            "close source"
        ]
    );
}

#[test]
fn test_sam_stream_through_contig_graph() {
    let dir = tempfile::tempdir().unwrap();
    let sequences = dir.path().join("scaffolds.fa");

    let contigs = vec![
        Contig::new("ctgA", vec![b'A'; 1000]),
        Contig::new("ctgB", vec![b'C'; 1000]),
    ];
    let graph = ContigGraph::new(contigs, GraphOptions::default()).with_sequence_output(&sequences);
    let rule = graph.usability_rule();
    let model = shared(graph);

    let read = "T".repeat(1000);
    let tail = "T".repeat(500);
    let sam = format!(
        "@HD\tVN:1.6\n@SQ\tSN:ctgA\tLN:1000\n@SQ\tSN:ctgB\tLN:1000\n\
         r1\t0\tctgA\t601\t60\t400M600S\t*\t0\t0\t{read}\t*\n\
         r1\t2048\tctgB\t1\t60\t500H500M\t*\t0\t0\t{tail}\t*\n\
         r2\t4\t*\t0\t0\t*\t*\t0\t0\tACGT\t*\n"
    );
    let source = AlignmentSource::from_reader(
        Cursor::new(sam.into_bytes()),
        AlignmentFormat::Sam,
        rule,
    )
    .unwrap();

    let report = Capture::default();
    let sink = ReportSink::from_writer(Box::new(report.clone()), OutputFormat::Text);
    let summary = Pipeline::new(Arc::clone(&model), sink, &config(0))
        .run(source)
        .unwrap();

    assert_eq!(summary.reads, 2);
    assert_eq!(summary.bases, 1004);
    assert_eq!(summary.bridges, 1);

    let graph = model.lock();
    assert_eq!(graph.number_of_contigs(), 1);
    assert_eq!(graph.n50(), 2100);
    assert_eq!(graph.gaps_info(), "1 (100)");

    let text = report.text();
    assert!(text.starts_with("Time |"));
    assert!(text.contains("|\t2 |\t1004 |\t1 |\t0 |\t2100 |\t1 (100)"));

    let fasta = std::fs::read_to_string(&sequences).unwrap();
    assert!(fasta.starts_with(">scaffold1 length=2100"));
}
