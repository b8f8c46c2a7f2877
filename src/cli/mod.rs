//! Command-line interface for rt-scaffold.
//!
//! This module implements the CLI using clap. Available commands:
//!
//! - **run**: Scaffold a draft assembly from a stream of long-read alignments
//! - **show-config**: Print the effective configuration as JSON
//!
//! ## Usage
//!
//! ```text
//! # Scaffold from a finished alignment file
//! rt-scaffold run --contigs draft.fasta --input reads.bam
//!
//! # Align reads as they arrive and scaffold in real time
//! cat pass/*.fastq | rt-scaffold run --contigs draft.fasta --input - --input-format fastq \
//!     --aligner minimap2 --sequences scaffolds.fasta
//!
//! # Report cycles as JSON lines
//! rt-scaffold run --contigs draft.fasta --input aln.sam --format json
//! ```

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};

use crate::pipeline::config::PipelineConfig;
use crate::source::aligner::AlignerProfile;

pub use crate::report::OutputFormat;

pub mod run;

#[derive(Parser)]
#[command(name = "rt-scaffold")]
#[command(version)]
#[command(about = "Scaffold a draft assembly in real time from streaming long-read alignments")]
#[command(
    long_about = "rt-scaffold reads alignments of long reads against a draft assembly as they are produced, either from a file, from stdin, or from an aligner it runs itself.\n\nWhile reads arrive it:\n- Collects bridges between contig ends from reads spanning several contigs\n- Periodically joins contigs into scaffolds\n- Reports read, base and scaffold statistics after every cycle"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Report format
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scaffold contigs from a stream of alignments
    Run(run::RunArgs),

    /// Print the effective configuration as JSON
    ShowConfig(ConfigArgs),
}

/// Settings shared by `run` and `show-config`.
///
/// Flags override values from `--config`, which override the defaults.
#[derive(Args, Debug, Default)]
pub struct ConfigArgs {
    /// JSON configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Minimum mapping quality of alignments used for scaffolding
    #[arg(long)]
    pub min_quality: Option<u8>,

    /// Minimum read support for joining two contigs
    #[arg(long)]
    pub min_coverage: Option<f64>,

    /// Reads between consolidation cycles (0 disables)
    #[arg(long)]
    pub read_period: Option<u64>,

    /// Seconds between consolidation cycles (0 disables)
    #[arg(long)]
    pub time_period: Option<u64>,

    /// Aligner used for raw read input
    #[arg(long, value_enum)]
    pub aligner: Option<AlignerProfile>,

    /// Path to the aligner executable
    #[arg(long)]
    pub aligner_exe: Option<String>,

    /// Aligner threads
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// Aligner index of the draft assembly (defaults to the contigs file)
    #[arg(long)]
    pub index: Option<PathBuf>,

    /// minimap2 preset
    #[arg(long)]
    pub preset: Option<String>,

    /// Leave short scaffolds out of the sequence output
    #[arg(long)]
    pub trim: bool,
}

impl ConfigArgs {
    /// Build the effective configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file cannot be loaded or the result is invalid.
    pub fn resolve(&self) -> anyhow::Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::load_from_file(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
            None => PipelineConfig::default(),
        };

        if let Some(min_quality) = self.min_quality {
            config.min_quality = min_quality;
        }
        if let Some(min_coverage) = self.min_coverage {
            config.min_coverage = min_coverage;
        }
        if let Some(read_period) = self.read_period {
            config.read_period = read_period;
        }
        if let Some(seconds) = self.time_period {
            config.time_period = std::time::Duration::from_secs(seconds);
        }
        if let Some(profile) = self.aligner {
            config.aligner.profile = profile;
        }
        if let Some(exe) = &self.aligner_exe {
            config.aligner.executable = Some(exe.clone());
        }
        if let Some(threads) = self.threads {
            config.aligner.threads = threads;
        }
        if let Some(index) = &self.index {
            config.aligner.index = Some(index.clone());
        }
        if let Some(preset) = &self.preset {
            config.aligner.preset.clone_from(preset);
        }
        if self.trim {
            config.trim = true;
        }

        config.validate()?;
        Ok(config)
    }
}

/// Execute show-config subcommand
///
/// # Errors
///
/// Returns an error if the configuration cannot be resolved.
pub fn show_config(args: &ConfigArgs) -> anyhow::Result<()> {
    let config = args.resolve()?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
