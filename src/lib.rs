//! # rt-scaffold
//!
//! A library for scaffolding a draft genome assembly in real time from long reads.
//!
//! Long reads are aligned against the contigs of a draft assembly while they are still
//! being sequenced. A read whose alignments span several contigs is evidence that those
//! contigs are neighbours in the genome. `rt-scaffold` consumes the alignments as a
//! stream, accumulates that evidence in a shared model and, on a fixed read or time
//! cadence, joins contigs into scaffolds and reports how the assembly improves.
//!
//! ## Features
//!
//! - **Streaming input**: SAM/BAM files, stdin, or a `bwa mem`/`minimap2` process
//!   started on raw reads
//! - **Concurrent consolidation**: a background thread consolidates and reports while
//!   ingestion continues
//! - **Pluggable model**: the pipeline drives any [`model::ScaffoldModel`]; a contig-end
//!   graph is provided
//! - **Ordered shutdown**: one final consolidation, sequence output, then cleanup
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use rt_scaffold::{ContigGraph, Pipeline, PipelineConfig, ReportSink, AlignmentSource};
//! use rt_scaffold::model::{shared, ScaffoldModel};
//! use rt_scaffold::parsing::fasta::load_contigs;
//! use rt_scaffold::report::OutputFormat;
//!
//! let config = PipelineConfig::default();
//! let graph = ContigGraph::new(load_contigs(Path::new("draft.fa")).unwrap(), config.graph_options())
//!     .with_sequence_output("scaffolds.fa");
//! let source = AlignmentSource::from_path(Path::new("aln.bam"), None, graph.usability_rule()).unwrap();
//! let sink = ReportSink::create(Path::new("report.txt"), OutputFormat::Text).unwrap();
//!
//! let summary = Pipeline::new(shared(graph), sink, &config).run(source).unwrap();
//! println!("{} reads -> {} bridges", summary.reads, summary.bridges);
//! ```
//!
//! ## Modules
//!
//! - [`core`]: Alignment records, read batches, contigs and shared counters
//! - [`source`]: Streaming alignment sources and the external aligner launcher
//! - [`model`]: The scaffold model interface and the contig-end graph
//! - [`pipeline`]: Grouping, bridge submission, consolidation and lifecycle
//! - [`report`]: Per-cycle progress report
//! - [`parsing`]: Draft assembly FASTA loader
//! - [`cli`]: Command-line interface implementation

pub mod cli;
pub mod core;
pub mod model;
pub mod parsing;
pub mod pipeline;
pub mod report;
pub mod source;
pub mod utils;

// Re-export commonly used types for convenience
pub use core::contig::Contig;
pub use core::types::*;
pub use model::graph::ContigGraph;
pub use model::{ScaffoldModel, SharedModel, UsabilityRule};
pub use pipeline::config::PipelineConfig;
pub use pipeline::driver::Pipeline;
pub use pipeline::{PipelineError, RunSummary};
pub use report::ReportSink;
pub use source::AlignmentSource;
