//! The scaffold model driven by the streaming pipeline.
//!
//! The pipeline only talks to the model through [`ScaffoldModel`]. It submits bridges
//! from the ingest thread and consolidates/reports from the consolidator thread, always
//! holding the model lock ([`SharedModel`]), so implementations need no internal
//! synchronization.
//!
//! [`graph::ContigGraph`] is the implementation used by the command-line tool.

use std::io;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::types::{AlignmentRecord, ReadBatch};

pub mod graph;

/// A model shared between the ingest thread and the consolidator
pub type SharedModel<M> = Arc<Mutex<M>>;

/// Wrap a model for sharing with a pipeline
pub fn shared<M: ScaffoldModel>(model: M) -> SharedModel<M> {
    Arc::new(Mutex::new(model))
}

/// Decides whether an alignment is eligible for bridge construction.
///
/// Evaluated once per record while the record is parsed, outside the model lock.
pub trait UsabilityRule: Send + Sync {
    fn is_usable(&self, record: &AlignmentRecord) -> bool;
}

/// Accepts every mapped record
#[derive(Debug, Clone, Copy, Default)]
pub struct AnyMapped;

impl UsabilityRule for AnyMapped {
    fn is_usable(&self, record: &AlignmentRecord) -> bool {
        !record.unmapped
    }
}

/// Operations the pipeline needs from an assembly/scaffold graph
pub trait ScaffoldModel: Send {
    /// Rule used to flag records as usable while they are parsed
    fn usability_rule(&self) -> Arc<dyn UsabilityRule>;

    /// Record evidence from one read that the contigs of `a` and `b` are adjacent
    fn add_bridge(
        &mut self,
        read: &ReadBatch,
        a: &AlignmentRecord,
        b: &AlignmentRecord,
        min_coverage: f64,
    );

    /// Merge accumulated bridge evidence into scaffolds
    fn connect_bridges(&mut self);

    /// Emit the current scaffold sequences.
    ///
    /// # Errors
    ///
    /// Returns any I/O error raised while writing the sequences.
    fn print_sequences(&mut self, update_in_place: bool, final_flag: bool) -> io::Result<()>;

    fn number_of_contigs(&self) -> usize;

    fn number_of_circulars(&self) -> usize;

    fn n50(&self) -> u64;

    /// Human-readable summary of the gaps left in the scaffolds
    fn gaps_info(&self) -> String;

    /// Real-time annotation hook, called once per cycle with the bases seen so far
    fn print_rt(&mut self, _base_count: u64) {}

    /// Whether sequences are rewritten on every cycle rather than once at the end
    fn updates_in_place(&self) -> bool {
        false
    }

    /// Whether bridges were informed by an auxiliary assembly graph
    fn has_auxiliary_graph(&self) -> bool {
        false
    }

    /// Resolve bridges that were held back waiting for more evidence
    fn force_deferred_bridges(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Strand;

    #[test]
    fn test_any_mapped() {
        let rule = AnyMapped;
        assert!(rule.is_usable(&AlignmentRecord::mapped("r", 0, 0, 1, 5, Strand::Forward)));
        assert!(!rule.is_usable(&AlignmentRecord::unmapped("r", 5)));
    }
}
