//! Retrying, acknowledgement-aware front end over a [`BatchSyncClient`].

use crate::retry::{retry_with_backoff, RetryPolicy};
use crate::{BatchSyncClient, SyncError, TaskOutcome, WriteAck};
use fsindex_indexer::{FileRecord, ScanId};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Issues writes through a client, waits for their acknowledgement and
/// retries the pair as one unit.
///
/// A task that times out is treated as transient and the whole write is
/// replayed; upserts and sweeps are idempotent, so a late-landing first
/// attempt is harmless. A failed task is fatal.
#[derive(Clone)]
pub struct SyncWriter {
    client: Arc<dyn BatchSyncClient>,
    retry: RetryPolicy,
    task_timeout: Duration,
}

impl SyncWriter {
    pub fn new(client: Arc<dyn BatchSyncClient>, retry: RetryPolicy, task_timeout: Duration) -> Self {
        Self {
            client,
            retry,
            task_timeout,
        }
    }

    pub fn client(&self) -> &Arc<dyn BatchSyncClient> {
        &self.client
    }

    /// Ensure the destination schema, retrying transient failures.
    pub async fn ensure_schema(&self) -> Result<(), SyncError> {
        retry_with_backoff(
            &self.retry,
            "ensure_schema",
            || self.client.ensure_schema(),
            SyncError::is_retryable,
        )
        .await?;
        info!(backend = self.client.backend(), "table_ensured");
        Ok(())
    }

    /// Upsert one batch and wait until the engine has applied it.
    pub async fn upsert_batch(&self, records: &[FileRecord]) -> Result<(), SyncError> {
        if records.is_empty() {
            return Ok(());
        }

        let client = &self.client;
        retry_with_backoff(
            &self.retry,
            "bulk_upsert",
            move || async move {
                let ack = client.bulk_upsert(records).await?;
                self.settle(ack).await
            },
            SyncError::is_retryable,
        )
        .await
        .map_err(|e| {
            error!(error = %e, count = records.len(), "bulk_upsert_failed");
            e
        })?;

        info!(count = records.len(), "batch_indexed");
        Ok(())
    }

    /// Delete the documents of `root` not seen since `cutoff`. Returns the
    /// number of deleted documents when the engine reports it.
    pub async fn sweep(&self, root: &str, cutoff: ScanId) -> Result<Option<u64>, SyncError> {
        let client = &self.client;
        let deleted = retry_with_backoff(
            &self.retry,
            "delete_where",
            move || async move {
                let ack = client.delete_where(root, cutoff).await?;
                self.settle(ack).await
            },
            SyncError::is_retryable,
        )
        .await
        .map_err(|e| {
            error!(error = %e, root, "deletion_sweep_failed");
            e
        })?;

        info!(root, deleted = deleted.unwrap_or(0), "deletion_sweep_complete");
        Ok(deleted)
    }

    /// Resolve an acknowledgement into an affected-row count.
    async fn settle(&self, ack: WriteAck) -> Result<Option<u64>, SyncError> {
        let task = match ack {
            WriteAck::Completed { affected } => return Ok(affected),
            WriteAck::Enqueued(task) => task,
        };

        match self
            .client
            .wait_for_completion(task, self.task_timeout)
            .await?
        {
            TaskOutcome::Succeeded { affected } => Ok(affected),
            TaskOutcome::Failed { message } => Err(SyncError::TaskFailed { task, message }),
            TaskOutcome::TimedOut => Err(SyncError::TaskTimeout {
                task,
                timeout: self.task_timeout,
            }),
        }
    }
}
