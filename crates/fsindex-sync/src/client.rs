//! The engine-agnostic write contract.

use crate::SyncError;
use async_trait::async_trait;
use fsindex_indexer::{FileRecord, ScanId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Handle of an asynchronous engine task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How the engine acknowledged a write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteAck {
    /// Applied before the call returned
    Completed {
        /// Rows affected, when the engine reports it
        affected: Option<u64>,
    },
    /// Accepted; settles asynchronously
    Enqueued(TaskId),
}

/// Final state of a polled task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Succeeded { affected: Option<u64> },
    Failed { message: String },
    /// Still pending when the timeout elapsed; the write may or may not land.
    TimedOut,
}

/// Write operations against the external search engine.
///
/// Implementations make exactly one network call per operation and never
/// retry on their own; retry and acknowledgement policy lives in
/// [`SyncWriter`](crate::SyncWriter).
#[async_trait]
pub trait BatchSyncClient: Send + Sync {
    /// Short backend name for logs.
    fn backend(&self) -> &'static str;

    /// Create the destination index if it does not exist. Safe to repeat.
    async fn ensure_schema(&self) -> Result<(), SyncError>;

    /// Insert or replace the given documents, keyed by `id`.
    async fn bulk_upsert(&self, records: &[FileRecord]) -> Result<WriteAck, SyncError>;

    /// Remove every document of `root` whose `seen_at` is strictly below
    /// `max_seen_at`.
    async fn delete_where(&self, root: &str, max_seen_at: ScanId) -> Result<WriteAck, SyncError>;

    /// Poll a task until it settles or `timeout` elapses.
    async fn wait_for_completion(
        &self,
        task: TaskId,
        timeout: Duration,
    ) -> Result<TaskOutcome, SyncError>;
}
