//! Parsers for the draft assembly fed to the scaffolder.
//!
//! ## Example
//!
//! ```rust,no_run
//! use rt_scaffold::parsing::fasta::load_contigs;
//! use std::path::Path;
//!
//! let contigs = load_contigs(Path::new("contigs.fasta")).unwrap();
//! println!("{} contigs", contigs.len());
//! ```
//!
//! Alignment records are not parsed here; see [`crate::source`], which streams them
//! through noodles as they arrive.

pub mod fasta;
