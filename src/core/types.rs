use serde::{Deserialize, Serialize};

/// Strand of an alignment relative to the target contig
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Strand {
    #[default]
    Forward,
    Reverse,
}

impl Strand {
    #[must_use]
    pub fn is_reverse(self) -> bool {
        matches!(self, Self::Reverse)
    }
}

impl std::fmt::Display for Strand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Forward => write!(f, "+"),
            Self::Reverse => write!(f, "-"),
        }
    }
}

/// One alignment of a read (or a fragment of it) against one contig.
///
/// Reference coordinates are 1-based and inclusive. Read coordinates are 0-based,
/// half-open and expressed in the orientation the read was sequenced in, so two
/// records of the same read can be ordered along the read regardless of strand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignmentRecord {
    /// Read name (QNAME)
    pub read_name: String,

    /// Index of the target contig, `None` when unmapped
    pub contig: Option<usize>,

    /// Mapping quality, 255 when unavailable
    pub mapping_quality: u8,

    /// First aligned position on the contig
    pub ref_start: u64,

    /// Last aligned position on the contig
    pub ref_end: u64,

    /// First aligned base on the read
    pub read_start: u64,

    /// One past the last aligned base on the read
    pub read_end: u64,

    /// Full read length, including clipped bases
    pub read_length: u64,

    pub strand: Strand,

    pub unmapped: bool,

    /// Whether the scaffold model considers this alignment eligible for bridging
    pub usable: bool,
}

impl AlignmentRecord {
    /// An unmapped record, never usable
    pub fn unmapped(read_name: impl Into<String>, read_length: u64) -> Self {
        Self {
            read_name: read_name.into(),
            contig: None,
            mapping_quality: 0,
            ref_start: 0,
            ref_end: 0,
            read_start: 0,
            read_end: 0,
            read_length,
            strand: Strand::Forward,
            unmapped: true,
            usable: false,
        }
    }

    /// A mapped record covering `ref_start..=ref_end` of `contig`.
    ///
    /// The read coordinates default to an end-to-end alignment of the read; use
    /// [`AlignmentRecord::with_read_span`] when the read is clipped.
    pub fn mapped(
        read_name: impl Into<String>,
        contig: usize,
        mapping_quality: u8,
        ref_start: u64,
        ref_end: u64,
        strand: Strand,
    ) -> Self {
        let length = ref_end.saturating_sub(ref_start) + 1;
        Self {
            read_name: read_name.into(),
            contig: Some(contig),
            mapping_quality,
            ref_start,
            ref_end,
            read_start: 0,
            read_end: length,
            read_length: length,
            strand,
            unmapped: false,
            usable: false,
        }
    }

    #[must_use]
    pub fn with_read_span(mut self, read_start: u64, read_end: u64, read_length: u64) -> Self {
        self.read_start = read_start;
        self.read_end = read_end;
        self.read_length = read_length;
        self
    }

    #[must_use]
    pub fn with_usable(mut self, usable: bool) -> Self {
        self.usable = usable;
        self
    }

    /// Number of contig bases covered by the alignment
    #[must_use]
    pub fn aligned_length(&self) -> u64 {
        if self.unmapped {
            0
        } else {
            self.ref_end.saturating_sub(self.ref_start) + 1
        }
    }
}

/// All alignments of one read that passed the quality filter, plus the read sequence.
///
/// A batch is built while records of its read are consumed and handed off once the
/// next read starts; it is not modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadBatch {
    pub read_name: String,

    /// Read bases in sequencing orientation, empty if no record carried the full read
    pub sequence: Vec<u8>,

    pub records: Vec<AlignmentRecord>,
}

impl ReadBatch {
    pub fn new(read_name: impl Into<String>) -> Self {
        Self {
            read_name: read_name.into(),
            sequence: Vec::new(),
            records: Vec::new(),
        }
    }

    pub fn usable_records(&self) -> impl Iterator<Item = &AlignmentRecord> {
        self.records.iter().filter(|r| r.usable)
    }

    #[must_use]
    pub fn usable_count(&self) -> usize {
        self.usable_records().count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapped_record_defaults() {
        let rec = AlignmentRecord::mapped("r1", 2, 60, 101, 200, Strand::Reverse);
        assert_eq!(rec.aligned_length(), 100);
        assert_eq!(rec.read_end, 100);
        assert!(!rec.unmapped);
        assert!(!rec.usable);
        assert!(rec.strand.is_reverse());
    }

    #[test]
    fn test_unmapped_record() {
        let rec = AlignmentRecord::unmapped("r1", 500);
        assert!(rec.unmapped);
        assert_eq!(rec.contig, None);
        assert_eq!(rec.aligned_length(), 0);
        assert_eq!(rec.read_length, 500);
    }

    #[test]
    fn test_usable_records() {
        let mut batch = ReadBatch::new("r1");
        batch
            .records
            .push(AlignmentRecord::mapped("r1", 0, 60, 1, 10, Strand::Forward).with_usable(true));
        batch
            .records
            .push(AlignmentRecord::mapped("r1", 1, 60, 1, 10, Strand::Forward));
        assert_eq!(batch.usable_count(), 1);
        assert!(!batch.is_empty());
    }

    #[test]
    fn test_strand_display() {
        assert_eq!(Strand::Forward.to_string(), "+");
        assert_eq!(Strand::Reverse.to_string(), "-");
    }
}
