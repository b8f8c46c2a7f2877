//! Core data types for real-time scaffolding.
//!
//! - [`AlignmentRecord`](types::AlignmentRecord): one alignment of a read against a contig
//! - [`ReadBatch`](types::ReadBatch): all usable-candidate alignments of one read
//! - [`Contig`](contig::Contig): a draft assembly contig
//! - [`Counters`](counters::Counters): running read/base totals shared across threads
//!
//! ## Coordinates
//!
//! | Field | Base | Interval |
//! |-------|------|----------|
//! | `ref_start`, `ref_end` | 1 | closed |
//! | `read_start`, `read_end` | 0 | half-open, sequencing orientation |

pub mod contig;
pub mod counters;
pub mod types;
