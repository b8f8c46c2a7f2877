//! Loader for draft assembly contigs using noodles.
//!
//! Supports both uncompressed and gzip/bgzip compressed files.
//!
//! Supported extensions:
//! - `.fa`, `.fasta`, `.fna` (uncompressed)
//! - `.fa.gz`, `.fasta.gz`, `.fna.gz` (gzip compressed)
//! - `.fa.bgz`, `.fasta.bgz`, `.fna.bgz` (bgzip compressed)

use std::ffi::OsStr;
use std::io::{BufRead, BufReader};
use std::path::Path;

use flate2::read::MultiGzDecoder;
use noodles::fasta;
use thiserror::Error;
use tracing::info;

use crate::core::contig::Contig;
use crate::utils::validation::{check_contig_limit, ValidationError};

#[derive(Error, Debug)]
pub enum ContigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("noodles error: {0}")]
    Noodles(String),

    #[error("Invalid contig file: {0}")]
    InvalidFormat(String),

    #[error(transparent)]
    Limit(#[from] ValidationError),
}

/// Check if the path has a FASTA extension
pub fn is_fasta_file(path: &Path) -> bool {
    let path_str = path.to_string_lossy().to_lowercase();

    if path_str.ends_with(".fa.gz")
        || path_str.ends_with(".fasta.gz")
        || path_str.ends_with(".fna.gz")
        || path_str.ends_with(".fa.bgz")
        || path_str.ends_with(".fasta.bgz")
        || path_str.ends_with(".fna.bgz")
    {
        return true;
    }

    matches!(
        path.extension()
            .and_then(OsStr::to_str)
            .map(str::to_lowercase)
            .as_deref(),
        Some("fa" | "fasta" | "fna")
    )
}

/// Check if the path is a gzipped file
#[allow(clippy::case_sensitive_file_extension_comparisons)] // Already lowercased
pub(crate) fn is_gzipped(path: &Path) -> bool {
    let path_str = path.to_string_lossy().to_lowercase();
    path_str.ends_with(".gz") || path_str.ends_with(".bgz")
}

/// Load every contig of a FASTA file, keeping sequences in memory.
///
/// Sequences are uppercased. Contig order follows the file, which must match the
/// `@SQ` order of the alignments that will be streamed against it.
///
/// # Errors
///
/// Returns `ContigError::Io` if the file cannot be read, `ContigError::Noodles` if
/// parsing fails, `ContigError::InvalidFormat` if no contigs are found, or
/// `ContigError::Limit` if the contig limit is exceeded.
pub fn load_contigs(path: &Path) -> Result<Vec<Contig>, ContigError> {
    let file = std::fs::File::open(path)?;
    let contigs = if is_gzipped(path) {
        let mut reader = fasta::io::Reader::new(BufReader::new(MultiGzDecoder::new(file)));
        read_contigs(&mut reader)?
    } else {
        let mut reader = fasta::io::Reader::new(BufReader::new(file));
        read_contigs(&mut reader)?
    };

    info!(
        path = %path.display(),
        contigs = contigs.len(),
        bases = contigs.iter().map(|c| c.length).sum::<u64>(),
        "Loaded draft assembly"
    );

    Ok(contigs)
}

/// Read contigs from a noodles FASTA reader
fn read_contigs<R: BufRead>(reader: &mut fasta::io::Reader<R>) -> Result<Vec<Contig>, ContigError> {
    let mut contigs = Vec::new();

    for result in reader.records() {
        let record = result
            .map_err(|e| ContigError::Noodles(format!("Failed to parse FASTA record: {e}")))?;

        check_contig_limit(contigs.len())?;

        let name = String::from_utf8_lossy(record.name()).to_string();
        let sequence: Vec<u8> = record
            .sequence()
            .as_ref()
            .iter()
            .map(u8::to_ascii_uppercase)
            .collect();

        contigs.push(Contig::new(name, sequence));
    }

    if contigs.is_empty() {
        return Err(ContigError::InvalidFormat(
            "No sequences found in FASTA file".to_string(),
        ));
    }

    Ok(contigs)
}
