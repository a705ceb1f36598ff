//! Iterative directory walk.
//!
//! Uses an explicit work list instead of recursion, so tree depth is bounded
//! only by memory. Symbolic links are never followed: a link is neither
//! descended into nor indexed. A shared stop flag ends the walk early.

use super::{ExclusionMatcher, ScanCounters, StabilityFilter};
use crate::{FileRecord, ScanId};
use std::fs::{self, DirEntry, ReadDir};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, error, warn};

/// A lazy scan of one root directory.
///
/// Yields one [`FileRecord`] per stable, non-excluded regular file.
/// Filesystem errors never end the iteration: a failing entry is skipped,
/// a failing directory is abandoned, and both are counted.
pub struct TreeScan {
    root_dir: PathBuf,
    root_name: String,
    scan_id: ScanId,
    now: SystemTime,
    excludes: Arc<ExclusionMatcher>,
    stability: StabilityFilter,
    stack: Vec<PathBuf>,
    current_dir: PathBuf,
    entries: Option<ReadDir>,
    counters: ScanCounters,
    stop: Arc<AtomicBool>,
}

impl TreeScan {
    pub(crate) fn new(
        root_dir: &Path,
        root_name: &str,
        scan_id: ScanId,
        excludes: Arc<ExclusionMatcher>,
        stability: StabilityFilter,
    ) -> Self {
        let mut scan = Self {
            root_dir: root_dir.to_path_buf(),
            root_name: root_name.to_string(),
            scan_id,
            now: SystemTime::now(),
            excludes,
            stability,
            stack: Vec::new(),
            current_dir: root_dir.to_path_buf(),
            entries: None,
            counters: ScanCounters::default(),
            stop: Arc::new(AtomicBool::new(false)),
        };

        if root_dir.exists() {
            scan.stack.push(root_dir.to_path_buf());
        } else {
            error!(path = %root_dir.display(), "root_dir_not_found");
            scan.counters.errors += 1;
        }

        scan
    }

    /// Counters accumulated so far.
    pub fn counters(&self) -> ScanCounters {
        self.counters
    }

    /// End the walk once `stop` is set. Checked before every entry.
    pub fn with_stop(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = stop;
        self
    }

    /// Open the next directory from the work list, unless it is excluded.
    fn open_dir(&mut self, dir: PathBuf) {
        let rel_dir = relative_path(&self.root_dir, &dir);
        if !rel_dir.is_empty() && self.excludes.is_excluded(&rel_dir) {
            debug!(path = %rel_dir, "excluded_dir");
            return;
        }

        match fs::read_dir(&dir) {
            Ok(entries) => {
                self.entries = Some(entries);
                self.current_dir = dir;
            }
            Err(e) => {
                error!(path = %dir.display(), error = %e, "dir_scan_error");
                self.counters.errors += 1;
            }
        }
    }

    /// Handle one directory entry, returning a record for indexable files.
    fn visit_entry(&mut self, entry: DirEntry) -> Option<FileRecord> {
        let path = entry.path();

        let file_type = match entry.file_type() {
            Ok(ft) => ft,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "file_stat_error");
                self.counters.errors += 1;
                return None;
            }
        };

        // Filtered when popped, once the relative path is known.
        if file_type.is_dir() {
            self.stack.push(path);
            return None;
        }
        if !file_type.is_file() {
            return None;
        }

        let rel_path = relative_path(&self.root_dir, &path);
        if self.excludes.is_excluded(&rel_path) {
            self.counters.files_skipped += 1;
            return None;
        }

        let metadata = match entry.metadata() {
            Ok(m) => m,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "file_stat_error");
                self.counters.errors += 1;
                return None;
            }
        };
        let mtime = match metadata.modified() {
            Ok(t) => t,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "file_stat_error");
                self.counters.errors += 1;
                return None;
            }
        };

        if self.stability.is_unstable(self.now, mtime) {
            debug!(path = %path.display(), "skipped_recent_file");
            self.counters.files_skipped += 1;
            return None;
        }

        self.counters.files_scanned += 1;
        Some(FileRecord::from_metadata(
            &self.root_name,
            &path,
            &metadata,
            self.scan_id,
        ))
    }
}

impl Iterator for TreeScan {
    type Item = FileRecord;

    fn next(&mut self) -> Option<FileRecord> {
        loop {
            if self.stop.load(Ordering::Relaxed) {
                if self.entries.take().is_some() || !self.stack.is_empty() {
                    debug!(pending_dirs = self.stack.len(), "scan_stopped");
                    self.stack.clear();
                }
                return None;
            }

            let Some(entries) = self.entries.as_mut() else {
                let dir = self.stack.pop()?;
                self.open_dir(dir);
                continue;
            };

            match entries.next() {
                Some(Ok(entry)) => {
                    if let Some(record) = self.visit_entry(entry) {
                        return Some(record);
                    }
                }
                Some(Err(e)) => {
                    // Enumeration broke mid-directory; children already
                    // pushed are still visited.
                    error!(path = %self.current_dir.display(), error = %e, "dir_scan_error");
                    self.counters.errors += 1;
                    self.entries = None;
                }
                None => {
                    self.entries = None;
                }
            }
        }
    }
}

/// Root-relative path with `/` separators; empty for the root itself.
fn relative_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
