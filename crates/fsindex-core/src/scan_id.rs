//! Scan pass identifiers.

use fsindex_indexer::ScanId;
use std::sync::atomic::{AtomicU64, Ordering};

/// Issues scan ids from the wall clock in milliseconds, never repeating or
/// going backwards within a process.
#[derive(Debug, Default)]
pub struct ScanIdGenerator {
    last: AtomicU64,
}

impl ScanIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next id for the current time.
    pub fn next_id(&self) -> ScanId {
        let now = chrono::Utc::now().timestamp_millis().max(0) as u64;
        self.next_at(now)
    }

    /// Next id given the current time in milliseconds.
    pub fn next_at(&self, now_ms: u64) -> ScanId {
        let mut issued = now_ms;
        // fetch_update only fails when the closure returns None
        let _ = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                issued = now_ms.max(last.saturating_add(1));
                Some(issued)
            });
        issued
    }

    /// Most recently issued id, or zero.
    pub fn last(&self) -> ScanId {
        self.last.load(Ordering::SeqCst)
    }
}
