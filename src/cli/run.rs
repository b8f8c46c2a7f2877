use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Args;
use tracing::{info, warn};

use crate::cli::{ConfigArgs, OutputFormat};
use crate::model::graph::ContigGraph;
use crate::model::{shared, ScaffoldModel};
use crate::parsing::fasta::{is_fasta_file, load_contigs};
use crate::pipeline::driver::Pipeline;
use crate::pipeline::PipelineError;
use crate::report::ReportSink;
use crate::source::aligner;
use crate::source::{AlignmentFormat, AlignmentSource};
use crate::utils::validation::is_stdin_path;

#[derive(Args)]
pub struct RunArgs {
    /// Alignments (SAM/BAM) or raw reads (FASTQ/FASTA); '-' for stdin
    #[arg(short, long, default_value = "-")]
    pub input: PathBuf,

    /// Input format (detected from the extension by default, SAM for stdin)
    #[arg(long, value_enum)]
    pub input_format: Option<InputFormat>,

    /// Draft assembly to scaffold (FASTA, optionally gzipped)
    #[arg(short, long, required = true)]
    pub contigs: PathBuf,

    /// Report destination; '-' for stdout
    #[arg(short, long, default_value = "-")]
    pub output: PathBuf,

    /// Write scaffold sequences as FASTA to this file
    #[arg(long)]
    pub sequences: Option<PathBuf>,

    #[command(flatten)]
    pub config: ConfigArgs,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum InputFormat {
    Sam,
    Bam,
    Fastq,
    Fasta,
}

impl InputFormat {
    /// Detect from the file name; stdin and unknown extensions are treated as SAM
    fn detect(path: &Path) -> Self {
        if is_stdin_path(path) {
            return Self::Sam;
        }
        if is_fastq_file(path) {
            return Self::Fastq;
        }
        if is_fasta_file(path) {
            return Self::Fasta;
        }
        match AlignmentFormat::from_path(path) {
            Some(AlignmentFormat::Bam) => Self::Bam,
            _ => Self::Sam,
        }
    }

    fn alignment_format(self) -> Option<AlignmentFormat> {
        match self {
            Self::Sam => Some(AlignmentFormat::Sam),
            Self::Bam => Some(AlignmentFormat::Bam),
            Self::Fastq | Self::Fasta => None,
        }
    }
}

fn is_fastq_file(path: &Path) -> bool {
    let name = path.to_string_lossy().to_lowercase();
    let name = name.strip_suffix(".gz").unwrap_or(&name);
    name.ends_with(".fastq") || name.ends_with(".fq")
}

/// Execute run subcommand
///
/// # Errors
///
/// Returns an error if the configuration is invalid, the contigs or input cannot be
/// opened, the aligner cannot be started, or reading alignments fails.
#[allow(clippy::needless_pass_by_value)] // CLI entry point, values from clap
pub fn run(args: RunArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    let config = args.config.resolve()?;
    if verbose {
        info!(config = %serde_json::to_string(&config)?, "Effective configuration");
    }

    let contigs = load_contigs(&args.contigs)
        .map_err(PipelineError::from)
        .with_context(|| format!("Failed to read contigs from {}", args.contigs.display()))?;

    let mut graph = ContigGraph::new(contigs, config.graph_options());
    let contig_names: Vec<String> = graph.contigs().iter().map(|c| c.name.clone()).collect();
    if let Some(path) = &args.sequences {
        graph = graph.with_sequence_output(path);
    }
    let rule = graph.usability_rule();

    let sink = ReportSink::create(&args.output, format)
        .with_context(|| format!("Failed to open report {}", args.output.display()))?;

    let input_format = args
        .input_format
        .unwrap_or_else(|| InputFormat::detect(&args.input));
    let pipeline = Pipeline::new(shared(graph), sink, &config);

    let (source, pipeline) = match input_format.alignment_format() {
        Some(alignment_format) => {
            let source = AlignmentSource::from_path(&args.input, Some(alignment_format), rule)
                .map_err(PipelineError::from)
                .with_context(|| format!("Failed to open {}", args.input.display()))?;
            (source, pipeline)
        }
        None => {
            let mut aligner_config = config.aligner.clone();
            if aligner_config.index.is_none() {
                aligner_config.index = Some(args.contigs.clone());
            }
            let (source, process) = aligner::launch(&aligner_config, &args.input, rule)
                .map_err(PipelineError::AlignerLaunch)?;
            (source, pipeline.with_aligner(process))
        }
    };

    check_reference_names(source.reference_names(), &contig_names);

    let summary = pipeline.run(source)?;
    if matches!(format, OutputFormat::Json) {
        eprintln!("{}", serde_json::to_string_pretty(&summary)?);
    }
    Ok(())
}

/// Records refer to contigs by header index, so the header must list the draft's
/// contigs in the same order
fn check_reference_names(header: &[String], contigs: &[String]) {
    if header.is_empty() || header == contigs {
        return;
    }
    let mismatched = header
        .iter()
        .zip(contigs)
        .filter(|(h, c)| h != c)
        .count()
        + header.len().abs_diff(contigs.len());
    warn!(
        header_sequences = header.len(),
        contigs = contigs.len(),
        mismatched,
        "Alignment header does not match the draft assembly; bridges may be misattributed"
    );
}
