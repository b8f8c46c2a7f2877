//! Progress report written once per consolidation cycle.
//!
//! Three renderings of the same row are supported:
//!
//! - **text**: the classic pipe-and-tab table, header written once before the first row
//! - **tsv**: tab-separated with a plain header line
//! - **json**: one JSON object per line
//!
//! Rows are flushed as soon as they are written so a consumer tailing the output sees
//! each cycle immediately.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::utils::validation::is_stdout_path;

pub const TEXT_HEADER: &str = "Time |\tStep |\tRead count |\tBase count|\tNumber of scaffolds|\tCircular scaffolds |\tN50 | \tBreaks (maxlen)";

pub const TSV_HEADER: &str =
    "time\tstep\treads\tbases\tscaffolds\tcircular_scaffolds\tn50\tbreaks";

/// Report rendering
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Tsv,
}

/// One line of the progress report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    /// Wall-clock time the cycle ran
    pub time: String,

    /// Seconds since the consolidator started
    pub step: u64,

    pub reads: u64,
    pub bases: u64,
    pub scaffolds: usize,
    pub circular: usize,
    pub n50: u64,

    /// Gap summary as reported by the model
    pub gaps: String,
}

impl ReportRow {
    fn to_text(&self) -> String {
        format!(
            "{} |\t{} |\t{} |\t{} |\t{} |\t{} |\t{} |\t{}",
            self.time,
            self.step,
            self.reads,
            self.bases,
            self.scaffolds,
            self.circular,
            self.n50,
            self.gaps
        )
    }

    fn to_tsv(&self) -> String {
        format!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.time,
            self.step,
            self.reads,
            self.bases,
            self.scaffolds,
            self.circular,
            self.n50,
            self.gaps
        )
    }
}

/// Destination of report rows
pub struct ReportSink {
    out: Option<Box<dyn Write + Send>>,
    format: OutputFormat,
    header_written: bool,
    rows: usize,
}

impl ReportSink {
    /// Open a report at `path`, or stdout for "-".
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be created.
    pub fn create(path: &Path, format: OutputFormat) -> io::Result<Self> {
        let out: Box<dyn Write + Send> = if is_stdout_path(path) {
            Box::new(io::stdout())
        } else {
            Box::new(BufWriter::new(File::create(path)?))
        };
        Ok(Self::from_writer(out, format))
    }

    #[must_use]
    pub fn from_writer(out: Box<dyn Write + Send>, format: OutputFormat) -> Self {
        Self {
            out: Some(out),
            format,
            header_written: false,
            rows: 0,
        }
    }

    /// Rows written so far
    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.out.is_none()
    }

    /// Write and flush one row.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if writing fails or the sink is already closed.
    pub fn write_row(&mut self, row: &ReportRow) -> io::Result<()> {
        let out = self
            .out
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "report sink is closed"))?;

        if !self.header_written {
            match self.format {
                OutputFormat::Text => writeln!(out, "{TEXT_HEADER}")?,
                OutputFormat::Tsv => writeln!(out, "{TSV_HEADER}")?,
                OutputFormat::Json => {}
            }
            self.header_written = true;
        }

        match self.format {
            OutputFormat::Text => writeln!(out, "{}", row.to_text())?,
            OutputFormat::Tsv => writeln!(out, "{}", row.to_tsv())?,
            OutputFormat::Json => {
                serde_json::to_writer(&mut *out, row).map_err(io::Error::other)?;
                writeln!(out)?;
            }
        }
        out.flush()?;
        self.rows += 1;
        Ok(())
    }

    /// Flush and release the destination. Closing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the final flush fails.
    pub fn close(&mut self) -> io::Result<()> {
        match self.out.take() {
            Some(mut out) => out.flush(),
            None => Ok(()),
        }
    }
}
