//! fsindex Indexer
//!
//! This crate provides the filesystem side of the fsindex pipeline:
//! - Exclusion matching against root-relative glob patterns
//! - Stability filtering of recently modified files
//! - Path-independent document identity from (device, inode)
//! - Iterative, lazy tree scanning producing [`FileRecord`]s

mod error;
mod record;
pub mod scanner;

pub use error::IndexerError;
pub use record::{FileRecord, ScanId};
pub use scanner::{
    compute_id, ExclusionMatcher, ScanCounters, ScanOptions, Scanner, StabilityFilter, TreeScan,
};
