//! In-process engine used for dry runs and tests.
//!
//! Applies writes to a map keyed by document id with the same semantics as
//! the network backends. It can acknowledge immediately or through tasks,
//! and can inject transient failures, rejections and stalled tasks.

use crate::{BatchSyncClient, SyncError, TaskId, TaskOutcome, WriteAck};
use async_trait::async_trait;
use fsindex_indexer::{FileRecord, ScanId};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

#[derive(Default)]
struct MemoryState {
    documents: BTreeMap<u64, FileRecord>,
    schema_ready: bool,
    upsert_calls: usize,
    delete_calls: usize,
    upsert_batch_sizes: Vec<usize>,
    transient_failures: u32,
    delete_failures: u32,
    rejections: u32,
    stalled_tasks: u32,
    failing_tasks: u32,
    next_task: u64,
    tasks: HashMap<TaskId, Option<u64>>,
}

/// An in-memory search engine.
pub struct MemoryClient {
    state: Mutex<MemoryState>,
    use_tasks: bool,
}

impl Default for MemoryClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryClient {
    /// Engine that acknowledges writes immediately.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            use_tasks: false,
        }
    }

    /// Engine that acknowledges writes through pollable tasks.
    pub fn with_tasks() -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            use_tasks: true,
        }
    }

    /// Fail the next `n` writes with a retryable transport error.
    pub fn fail_next(&self, n: u32) {
        self.state.lock().transient_failures = n;
    }

    /// Fail the next `n` sweeps with a retryable transport error. Upserts
    /// are unaffected.
    pub fn fail_next_deletes(&self, n: u32) {
        self.state.lock().delete_failures = n;
    }

    /// Reject the next `n` writes with a non-retryable engine error.
    pub fn reject_next(&self, n: u32) {
        self.state.lock().rejections = n;
    }

    /// Report the next `n` polled tasks as still pending.
    pub fn stall_next_tasks(&self, n: u32) {
        self.state.lock().stalled_tasks = n;
    }

    /// Report the next `n` polled tasks as failed.
    pub fn fail_next_tasks(&self, n: u32) {
        self.state.lock().failing_tasks = n;
    }

    /// Seed a document directly.
    pub fn insert(&self, record: FileRecord) {
        self.state.lock().documents.insert(record.id, record);
    }

    pub fn get(&self, id: u64) -> Option<FileRecord> {
        self.state.lock().documents.get(&id).cloned()
    }

    /// All documents, ordered by id.
    pub fn documents(&self) -> Vec<FileRecord> {
        self.state.lock().documents.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.state.lock().documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().documents.is_empty()
    }

    pub fn schema_ready(&self) -> bool {
        self.state.lock().schema_ready
    }

    /// Number of `bulk_upsert` calls received, failed ones included.
    pub fn upsert_calls(&self) -> usize {
        self.state.lock().upsert_calls
    }

    /// Number of `delete_where` calls received, failed ones included.
    pub fn delete_calls(&self) -> usize {
        self.state.lock().delete_calls
    }

    /// Sizes of the upsert batches that were applied, in order.
    pub fn upsert_batch_sizes(&self) -> Vec<usize> {
        self.state.lock().upsert_batch_sizes.clone()
    }

    fn acknowledge(&self, state: &mut MemoryState, affected: u64) -> WriteAck {
        if !self.use_tasks {
            return WriteAck::Completed {
                affected: Some(affected),
            };
        }
        state.next_task += 1;
        let task = TaskId(state.next_task);
        state.tasks.insert(task, Some(affected));
        WriteAck::Enqueued(task)
    }
}

/// Consume one injected failure, if any is armed.
fn injected_failure(state: &mut MemoryState) -> Option<SyncError> {
    if state.rejections > 0 {
        state.rejections -= 1;
        return Some(SyncError::Engine("injected rejection".to_string()));
    }
    if state.transient_failures > 0 {
        state.transient_failures -= 1;
        return Some(SyncError::Transport {
            message: "injected transient failure".to_string(),
            retryable: true,
        });
    }
    None
}

#[async_trait]
impl BatchSyncClient for MemoryClient {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn ensure_schema(&self) -> Result<(), SyncError> {
        self.state.lock().schema_ready = true;
        Ok(())
    }

    async fn bulk_upsert(&self, records: &[FileRecord]) -> Result<WriteAck, SyncError> {
        let mut state = self.state.lock();
        state.upsert_calls += 1;
        if let Some(err) = injected_failure(&mut state) {
            return Err(err);
        }

        for record in records {
            state.documents.insert(record.id, record.clone());
        }
        state.upsert_batch_sizes.push(records.len());
        Ok(self.acknowledge(&mut state, records.len() as u64))
    }

    async fn delete_where(&self, root: &str, max_seen_at: ScanId) -> Result<WriteAck, SyncError> {
        let mut state = self.state.lock();
        state.delete_calls += 1;
        if state.delete_failures > 0 {
            state.delete_failures -= 1;
            return Err(SyncError::Transport {
                message: "injected sweep failure".to_string(),
                retryable: true,
            });
        }
        if let Some(err) = injected_failure(&mut state) {
            return Err(err);
        }

        let before = state.documents.len();
        state
            .documents
            .retain(|_, doc| !(doc.root == root && doc.seen_at < max_seen_at));
        let deleted = (before - state.documents.len()) as u64;
        Ok(self.acknowledge(&mut state, deleted))
    }

    async fn wait_for_completion(
        &self,
        task: TaskId,
        _timeout: Duration,
    ) -> Result<TaskOutcome, SyncError> {
        let mut state = self.state.lock();
        let Some(affected) = state.tasks.get(&task).copied() else {
            return Err(SyncError::InvalidResponse(format!("unknown task {task}")));
        };

        if state.stalled_tasks > 0 {
            state.stalled_tasks -= 1;
            return Ok(TaskOutcome::TimedOut);
        }
        if state.failing_tasks > 0 {
            state.failing_tasks -= 1;
            return Ok(TaskOutcome::Failed {
                message: "injected task failure".to_string(),
            });
        }

        state.tasks.remove(&task);
        Ok(TaskOutcome::Succeeded { affected })
    }
}
