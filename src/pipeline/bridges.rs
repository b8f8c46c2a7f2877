//! Submission of read bridges into the shared model.

use crate::core::types::ReadBatch;
use crate::model::{ScaffoldModel, SharedModel};

/// Submits one bridge per unordered pair of usable records of a batch.
pub struct BridgeSubmitter<M> {
    model: SharedModel<M>,
    min_coverage: f64,
}

impl<M: ScaffoldModel> BridgeSubmitter<M> {
    pub fn new(model: SharedModel<M>, min_coverage: f64) -> Self {
        Self {
            model,
            min_coverage,
        }
    }

    /// Submit the bridges of `batch` and return how many were submitted.
    ///
    /// Pairs are submitted as `(earlier, later)` in record order. All bridges of one
    /// batch go in under a single acquisition of the model lock, so a consolidation
    /// cycle sees either none or all of them.
    pub fn submit(&self, batch: &ReadBatch) -> usize {
        let usable: Vec<_> = batch.usable_records().collect();
        if usable.len() < 2 {
            return 0;
        }

        let mut model = self.model.lock();
        let mut submitted = 0;
        for (i, a) in usable.iter().enumerate() {
            for b in &usable[i + 1..] {
                model.add_bridge(batch, a, b, self.min_coverage);
                submitted += 1;
            }
        }
        submitted
    }
}
