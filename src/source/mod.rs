//! Streaming alignment sources.
//!
//! An [`AlignmentSource`] turns SAM or BAM bytes into [`AlignmentRecord`]s one record
//! at a time, so records produced by a live aligner are processed as soon as they are
//! written. Three constructions are supported:
//!
//! | Construction | Input |
//! |--------------|-------|
//! | [`AlignmentSource::from_path`] | a finished SAM/BAM file, or "-" for stdin |
//! | [`AlignmentSource::from_stdin`] | this process's standard input |
//! | [`aligner::launch`] | the stdout of a freshly spawned aligner |
//!
//! Records of one read must be contiguous in the stream (as aligners write them); this
//! is relied on downstream but not checked here.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;
use std::sync::Arc;

use noodles::sam::alignment::record::cigar::op::Kind;
use noodles::sam::alignment::record_buf::RecordBuf;
use noodles::{bam, sam};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::types::{AlignmentRecord, Strand};
use crate::model::UsabilityRule;
use crate::utils::sequence::reverse_complement;
use crate::utils::validation::is_stdin_path;

pub mod aligner;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read alignment header: {0}")]
    Header(String),

    #[error("Unsupported alignment format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("An aligner index is required to align raw reads")]
    MissingIndex,
}

/// Serialization of an alignment stream
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum AlignmentFormat {
    Sam,
    Bam,
}

impl AlignmentFormat {
    /// Detect the format from a file extension, `None` for unknown extensions
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);

        match extension.as_deref() {
            Some("sam") | None => Some(Self::Sam),
            Some("bam") => Some(Self::Bam),
            Some(_) => None,
        }
    }
}

/// One parsed record together with the read bases it carried
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRecord {
    pub record: AlignmentRecord,

    /// Full read in sequencing orientation; empty when the record did not carry the
    /// whole read (secondary alignments, hard clips)
    pub sequence: Vec<u8>,
}

type NextRecord = Box<dyn FnMut(&mut RecordBuf) -> io::Result<usize>>;

/// A lazy, forward-only stream of alignment records
pub struct AlignmentSource {
    next: Option<NextRecord>,
    buf: RecordBuf,
    rule: Arc<dyn UsabilityRule>,
    reference_names: Vec<String>,
    description: String,
}

impl AlignmentSource {
    /// Open a SAM/BAM file, or stdin when `path` is "-".
    ///
    /// Without an explicit `format` it is detected from the extension; stdin defaults
    /// to SAM.
    ///
    /// # Errors
    ///
    /// Returns `SourceError::Io` if the file cannot be opened,
    /// `SourceError::UnsupportedFormat` for unknown extensions, or
    /// `SourceError::Header` if the header cannot be parsed.
    pub fn from_path(
        path: &Path,
        format: Option<AlignmentFormat>,
        rule: Arc<dyn UsabilityRule>,
    ) -> Result<Self, SourceError> {
        if is_stdin_path(path) {
            return Self::from_stdin(format.unwrap_or(AlignmentFormat::Sam), rule);
        }

        let format = match format {
            Some(format) => format,
            None => AlignmentFormat::from_path(path).ok_or_else(|| {
                SourceError::UnsupportedFormat(path.display().to_string())
            })?,
        };

        let file = File::open(path)?;
        let mut source = Self::from_reader(file, format, rule)?;
        source.description = path.display().to_string();
        Ok(source)
    }

    /// Read alignments from this process's standard input.
    ///
    /// # Errors
    ///
    /// Returns `SourceError::Header` if the header cannot be parsed.
    pub fn from_stdin(
        format: AlignmentFormat,
        rule: Arc<dyn UsabilityRule>,
    ) -> Result<Self, SourceError> {
        let mut source = Self::from_reader(io::stdin(), format, rule)?;
        source.description = "stdin".to_string();
        Ok(source)
    }

    /// Read alignments from any byte stream.
    ///
    /// The header is read immediately, which blocks until a live producer has
    /// written it.
    ///
    /// # Errors
    ///
    /// Returns `SourceError::Header` if the header cannot be parsed.
    pub fn from_reader<R: Read + 'static>(
        reader: R,
        format: AlignmentFormat,
        rule: Arc<dyn UsabilityRule>,
    ) -> Result<Self, SourceError> {
        let (header, next): (sam::Header, NextRecord) = match format {
            AlignmentFormat::Sam => {
                let mut reader = sam::io::Reader::new(BufReader::new(reader));
                let header = reader
                    .read_header()
                    .map_err(|e| SourceError::Header(e.to_string()))?;
                let records_header = header.clone();
                let next: NextRecord = Box::new(move |record: &mut RecordBuf| {
                    reader.read_record_buf(&records_header, record)
                });
                (header, next)
            }
            AlignmentFormat::Bam => {
                let mut reader = bam::io::Reader::new(reader);
                let header = reader
                    .read_header()
                    .map_err(|e| SourceError::Header(e.to_string()))?;
                let records_header = header.clone();
                let next: NextRecord = Box::new(move |record: &mut RecordBuf| {
                    reader.read_record_buf(&records_header, record)
                });
                (header, next)
            }
        };

        let reference_names = header
            .reference_sequences()
            .keys()
            .map(ToString::to_string)
            .collect();

        Ok(Self {
            next: Some(next),
            buf: RecordBuf::default(),
            rule,
            reference_names,
            description: "stream".to_string(),
        })
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Reference sequence names from the header, in `@SQ` order
    #[must_use]
    pub fn reference_names(&self) -> &[String] {
        &self.reference_names
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.next.is_none()
    }

    /// Release the underlying reader. Closing twice is a no-op.
    pub fn close(&mut self) {
        self.next = None;
    }
}

impl Iterator for AlignmentSource {
    type Item = io::Result<SourceRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.next.as_mut()?;
        match next(&mut self.buf) {
            Ok(0) => {
                self.close();
                None
            }
            Ok(_) => Some(Ok(to_source_record(&self.buf, self.rule.as_ref()))),
            Err(e) => Some(Err(e)),
        }
    }
}

/// Lengths of the leading clip, the aligned read segment and the trailing clip
fn clip_spans(record: &RecordBuf) -> (u64, u64, u64) {
    let mut leading = 0;
    let mut aligned = 0;
    let mut trailing = 0;

    for op in record.cigar().as_ref() {
        let len = op.len() as u64;
        match op.kind() {
            Kind::SoftClip | Kind::HardClip if aligned == 0 => leading += len,
            Kind::SoftClip | Kind::HardClip => trailing += len,
            Kind::Match | Kind::Insertion | Kind::SequenceMatch | Kind::SequenceMismatch => {
                aligned += len;
            }
            _ => {}
        }
    }

    (leading, aligned, trailing)
}

fn to_source_record(record: &RecordBuf, rule: &dyn UsabilityRule) -> SourceRecord {
    let flags = record.flags();
    let read_name = record
        .name()
        .map(|name| String::from_utf8_lossy(<_ as AsRef<[u8]>>::as_ref(name)).into_owned())
        .unwrap_or_default();

    let bases: &[u8] = record.sequence().as_ref();
    let (leading, aligned, trailing) = clip_spans(record);
    let read_length = (leading + aligned + trailing).max(bases.len() as u64);
    let strand = if flags.is_reverse_complemented() {
        Strand::Reverse
    } else {
        Strand::Forward
    };

    let mapped = match (
        flags.is_unmapped(),
        record.reference_sequence_id(),
        record.alignment_start(),
    ) {
        (false, Some(contig), Some(start)) => Some((contig, start)),
        _ => None,
    };

    let mut alignment = match mapped {
        None => AlignmentRecord::unmapped(read_name, read_length),
        Some((contig, start)) => {
            let ref_start = usize::from(start) as u64;
            let ref_end = record
                .alignment_end()
                .map_or(ref_start, |end| usize::from(end) as u64);
            let mapping_quality = record.mapping_quality().map_or(u8::MAX, |q| q.get());

            // Clips are listed in alignment orientation; flip them back onto the read
            let (read_start, read_end) = if strand.is_reverse() {
                (
                    read_length.saturating_sub(leading + aligned),
                    read_length.saturating_sub(leading),
                )
            } else {
                (leading, leading + aligned)
            };

            AlignmentRecord::mapped(read_name, contig, mapping_quality, ref_start, ref_end, strand)
                .with_read_span(read_start, read_end, read_length)
        }
    };
    alignment.usable = rule.is_usable(&alignment);

    let sequence = if !bases.is_empty() && bases.len() as u64 == read_length {
        if strand.is_reverse() {
            reverse_complement(bases)
        } else {
            bases.to_vec()
        }
    } else {
        Vec::new()
    };

    SourceRecord {
        record: alignment,
        sequence,
    }
}
