//! File system scanner module.
//!
//! Turns a root directory into a lazy sequence of [`FileRecord`]s, applying
//! exclusion patterns and the stability window along the way.

mod exclude;
mod identity;
mod stability;
mod walker;

pub use exclude::ExclusionMatcher;
pub use identity::compute_id;
pub use stability::StabilityFilter;
pub use walker::TreeScan;

use crate::{FileRecord, ScanId};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Options for scanning a root.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Logical root name stamped on every record
    pub root_name: String,
    /// Minimum quiet time before a file is indexed
    pub stability_window: Duration,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            root_name: "data".to_string(),
            stability_window: Duration::from_secs(30),
        }
    }
}

/// Per-scan counters. Owned by a single [`TreeScan`] and read once it is
/// exhausted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanCounters {
    /// Files emitted as records
    pub files_scanned: u64,
    /// Files excluded by pattern or deferred by the stability window
    pub files_skipped: u64,
    /// Entry and directory errors, plus a missing root
    pub errors: u64,
}

/// Builds [`TreeScan`]s sharing one exclusion matcher.
#[derive(Debug, Clone)]
pub struct Scanner {
    options: ScanOptions,
    excludes: Arc<ExclusionMatcher>,
}

impl Scanner {
    /// Create a scanner with default options and no exclusions.
    pub fn new() -> Self {
        Self::with_options(ScanOptions::default(), Arc::new(ExclusionMatcher::empty()))
    }

    /// Create a scanner with custom options.
    pub fn with_options(options: ScanOptions, excludes: Arc<ExclusionMatcher>) -> Self {
        Self { options, excludes }
    }

    /// Start a lazy scan of `root_dir`. Every record carries `seen_at = scan_id`.
    pub fn scan(&self, root_dir: &Path, scan_id: ScanId) -> TreeScan {
        TreeScan::new(
            root_dir,
            &self.options.root_name,
            scan_id,
            self.excludes.clone(),
            StabilityFilter::new(self.options.stability_window),
        )
    }

    /// Scan `root_dir` to completion, collecting records and counters.
    pub fn scan_all(&self, root_dir: &Path, scan_id: ScanId) -> (Vec<FileRecord>, ScanCounters) {
        let mut scan = self.scan(root_dir, scan_id);
        let records: Vec<_> = scan.by_ref().collect();
        (records, scan.counters())
    }
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new()
    }
}
