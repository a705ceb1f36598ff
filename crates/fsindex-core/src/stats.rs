//! Per-run statistics.

use chrono::{DateTime, Utc};
use fsindex_indexer::{ScanCounters, ScanId};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Counters for one scan pass. Owned by the pass and passed explicitly.
#[derive(Debug, Clone)]
pub struct ScanStats {
    /// Files emitted by the scanner
    pub files_scanned: u64,
    /// Files excluded or deferred by the stability window
    pub files_skipped: u64,
    /// Documents acknowledged by the engine
    pub files_indexed: u64,
    /// Documents removed by the sweep, as reported by the engine
    pub files_deleted: u64,
    /// Upsert calls issued
    pub batches: u64,
    /// Filesystem errors, including missing roots
    pub errors: u64,
    started_at: DateTime<Utc>,
    start_time: Instant,
}

impl Default for ScanStats {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanStats {
    pub fn new() -> Self {
        Self {
            files_scanned: 0,
            files_skipped: 0,
            files_indexed: 0,
            files_deleted: 0,
            batches: 0,
            errors: 0,
            started_at: Utc::now(),
            start_time: Instant::now(),
        }
    }

    /// Fold in the counters of a finished root scan.
    pub fn record_scan(&mut self, counters: &ScanCounters) {
        self.files_scanned += counters.files_scanned;
        self.files_skipped += counters.files_skipped;
        self.errors += counters.errors;
    }

    /// Record an acknowledged batch.
    pub fn record_batch(&mut self, size: usize) {
        self.batches += 1;
        self.files_indexed += size as u64;
    }

    /// Record a sweep result. Unknown counts add nothing.
    pub fn record_deleted(&mut self, deleted: Option<u64>) {
        self.files_deleted += deleted.unwrap_or(0);
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Scanned files per second over `elapsed`.
    pub fn files_per_sec(&self, elapsed: Duration) -> f64 {
        let secs = elapsed.as_secs_f64();
        if secs <= 0.0 {
            0.0
        } else {
            self.files_scanned as f64 / secs
        }
    }

    pub fn summary(&self, scan_id: ScanId) -> RunSummary {
        let elapsed = self.elapsed();
        RunSummary {
            scan_id,
            started_at: self.started_at,
            duration_secs: round2(elapsed.as_secs_f64()),
            files_scanned: self.files_scanned,
            files_skipped: self.files_skipped,
            files_indexed: self.files_indexed,
            files_deleted: self.files_deleted,
            batches: self.batches,
            errors: self.errors,
            files_per_sec: round2(self.files_per_sec(elapsed)),
        }
    }
}

/// Structured result of a completed pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub scan_id: ScanId,
    pub started_at: DateTime<Utc>,
    pub duration_secs: f64,
    pub files_scanned: u64,
    pub files_skipped: u64,
    pub files_indexed: u64,
    pub files_deleted: u64,
    pub batches: u64,
    pub errors: u64,
    pub files_per_sec: f64,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
