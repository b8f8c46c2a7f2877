//! Centralized validation and helper functions.

use std::path::Path;

/// Maximum number of contigs accepted from a draft assembly
pub const MAX_CONTIGS: usize = 1_000_000;

/// Presets accepted by minimap2 for `-x`
pub const MINIMAP2_PRESETS: &[&str] = &[
    "map-ont", "map-pb", "map-hifi", "lr:hq", "ava-ont", "ava-pb", "asm5", "asm10", "asm20",
    "sr", "splice",
];

/// Configuration validation errors
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ValidationError {
    #[error("Minimum coverage must be a finite, non-negative number (got {0})")]
    InvalidCoverage(f64),
    #[error("Thread count must be at least 1")]
    ZeroThreads,
    #[error("Unknown minimap2 preset: {0}")]
    UnknownPreset(String),
    #[error("Too many contigs: {0} exceeds maximum allowed ({MAX_CONTIGS})")]
    TooManyContigs(usize),
}

/// Check if a path refers to stdin.
///
/// Returns true if the path is "-" or "/dev/stdin".
///
/// # Examples
///
/// ```
/// use rt_scaffold::utils::validation::is_stdin_path;
/// use std::path::Path;
///
/// assert!(is_stdin_path(Path::new("-")));
/// assert!(!is_stdin_path(Path::new("reads.fastq")));
/// ```
#[must_use]
pub fn is_stdin_path(path: &Path) -> bool {
    let path_str = path.to_string_lossy();
    path_str == "-" || path_str == "/dev/stdin"
}

/// Check if a path refers to stdout ("-")
#[must_use]
pub fn is_stdout_path(path: &Path) -> bool {
    path.to_string_lossy() == "-"
}

/// Validate a minimum bridge coverage threshold.
///
/// # Errors
///
/// Returns `ValidationError::InvalidCoverage` for NaN, infinite or negative values.
pub fn validate_min_coverage(coverage: f64) -> Result<f64, ValidationError> {
    if coverage.is_finite() && coverage >= 0.0 {
        Ok(coverage)
    } else {
        Err(ValidationError::InvalidCoverage(coverage))
    }
}

/// Validate an aligner thread count.
///
/// # Errors
///
/// Returns `ValidationError::ZeroThreads` when `threads` is 0.
pub fn validate_threads(threads: usize) -> Result<usize, ValidationError> {
    if threads == 0 {
        Err(ValidationError::ZeroThreads)
    } else {
        Ok(threads)
    }
}

/// Validate a minimap2 `-x` preset name.
///
/// # Errors
///
/// Returns `ValidationError::UnknownPreset` if the preset is not a known minimap2 preset.
pub fn validate_preset(preset: &str) -> Result<(), ValidationError> {
    if MINIMAP2_PRESETS.contains(&preset) {
        Ok(())
    } else {
        Err(ValidationError::UnknownPreset(preset.to_string()))
    }
}

/// Check if adding another contig would exceed the maximum allowed.
///
/// Call this with the current count BEFORE adding a new contig.
///
/// # Errors
///
/// Returns `ValidationError::TooManyContigs` once `count` reaches [`MAX_CONTIGS`].
pub fn check_contig_limit(count: usize) -> Result<(), ValidationError> {
    if count >= MAX_CONTIGS {
        Err(ValidationError::TooManyContigs(count))
    } else {
        Ok(())
    }
}
