//! Grouping of consecutive alignment records into one batch per read.

use std::io;
use std::sync::Arc;

use tracing::warn;

use crate::core::counters::Counters;
use crate::core::types::ReadBatch;
use crate::pipeline::PipelineError;
use crate::source::SourceRecord;

/// Iterator adapter yielding one [`ReadBatch`] per distinct read name.
///
/// A batch is sealed when a record with a different read name arrives or the records
/// run out. The counters advance by one read, and by that read's length, on the first
/// record of each name, whether or not that record survives the filter. Unmapped
/// records and records below `min_quality` are dropped from the batch; a read with no
/// surviving records still yields an empty batch.
///
/// A record that fails to parse is skipped with a warning. Any other read error ends
/// the iteration with `PipelineError::Ingest`.
///
/// Records of one read are expected to be contiguous. A name that reappears later is
/// counted again as a new read.
pub struct ReadGroups<I> {
    records: I,
    counters: Arc<Counters>,
    min_quality: u8,
    current: Option<ReadBatch>,
    skipped: u64,
    done: bool,
}

impl<I> ReadGroups<I>
where
    I: Iterator<Item = io::Result<SourceRecord>>,
{
    pub fn new(records: I, counters: Arc<Counters>, min_quality: u8) -> Self {
        Self {
            records,
            counters,
            min_quality,
            current: None,
            skipped: 0,
            done: false,
        }
    }

    /// Malformed records skipped so far
    #[must_use]
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    fn passes(&self, record: &SourceRecord) -> bool {
        !record.record.unmapped && record.record.mapping_quality >= self.min_quality
    }
}

impl<I> Iterator for ReadGroups<I>
where
    I: Iterator<Item = io::Result<SourceRecord>>,
{
    type Item = Result<ReadBatch, PipelineError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            let record = match self.records.next() {
                Some(Ok(record)) => record,
                Some(Err(e)) if e.kind() == io::ErrorKind::InvalidData => {
                    self.skipped += 1;
                    warn!(error = %e, skipped = self.skipped, "Skipping malformed alignment record");
                    continue;
                }
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(PipelineError::Ingest(e)));
                }
                None => {
                    self.done = true;
                    return self.current.take().map(Ok);
                }
            };

            let is_new_read = self
                .current
                .as_ref()
                .map_or(true, |batch| batch.read_name != record.record.read_name);

            let sealed = if is_new_read {
                self.counters.record_read(record.record.read_length);
                self.current
                    .replace(ReadBatch::new(record.record.read_name.clone()))
            } else {
                None
            };

            let keep = self.passes(&record);
            if let Some(batch) = self.current.as_mut() {
                if batch.sequence.is_empty() && !record.sequence.is_empty() {
                    batch.sequence = record.sequence;
                }
                if keep {
                    batch.records.push(record.record);
                }
            }

            if let Some(batch) = sealed {
                return Some(Ok(batch));
            }
        }
    }
}
