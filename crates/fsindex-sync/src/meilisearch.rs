//! Meilisearch backend.
//!
//! Writes are enqueued as engine tasks and acknowledged with
//! [`WriteAck::Enqueued`]; [`BatchSyncClient::wait_for_completion`] polls
//! `GET /tasks/{uid}` until the task settles.

use crate::{BatchSyncClient, SyncError, TaskId, TaskOutcome, WriteAck};
use async_trait::async_trait;
use fsindex_indexer::{FileRecord, ScanId};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection settings for a Meilisearch server.
#[derive(Debug, Clone)]
pub struct MeilisearchOptions {
    /// Base URL, e.g. `http://meilisearch:7700`
    pub url: String,
    /// Index uid
    pub index: String,
    /// Sent as a bearer token when set
    pub api_key: Option<String>,
    pub request_timeout: Duration,
    /// Delay between task status polls
    pub poll_interval: Duration,
}

impl Default for MeilisearchOptions {
    fn default() -> Self {
        Self {
            url: "http://meilisearch:7700".to_string(),
            index: "files".to_string(),
            api_key: None,
            request_timeout: Duration::from_secs(120),
            poll_interval: Duration::from_millis(250),
        }
    }
}

/// Body returned by every enqueuing route.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnqueuedTask {
    task_uid: u64,
}

#[derive(Debug, Deserialize)]
struct TaskView {
    status: String,
    #[serde(default)]
    details: Option<Value>,
    #[serde(default)]
    error: Option<TaskError>,
}

#[derive(Debug, Deserialize)]
struct TaskError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    code: String,
}

/// Batch sync client for Meilisearch.
pub struct MeilisearchClient {
    http: reqwest::Client,
    base_url: String,
    options: MeilisearchOptions,
}

impl MeilisearchClient {
    /// Create a client.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built.
    pub fn new(options: MeilisearchOptions) -> Result<Self, SyncError> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(options.request_timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: options.url.trim_end_matches('/').to_string(),
            options,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.options.api_key {
            Some(key) if !key.is_empty() => request.bearer_auth(key),
            _ => request,
        }
    }

    /// Send a request and decode a JSON body, mapping non-success statuses.
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Value, SyncError> {
        let response = self.authorize(request).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(SyncError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(serde_json::from_str(&body)?)
    }

    async fn enqueue(&self, request: reqwest::RequestBuilder) -> Result<TaskId, SyncError> {
        let body = self.send(request).await?;
        let task: EnqueuedTask = serde_json::from_value(body)?;
        Ok(TaskId(task.task_uid))
    }

    async fn task_status(&self, task: TaskId) -> Result<TaskView, SyncError> {
        let body = self
            .send(self.http.get(self.url(&format!("/tasks/{}", task.0))))
            .await?;
        Ok(serde_json::from_value(body)?)
    }

    async fn create_index(&self) -> Result<(), SyncError> {
        let task = self
            .enqueue(
                self.http
                    .post(self.url("/indexes"))
                    .json(&json!({ "uid": self.options.index, "primaryKey": "id" })),
            )
            .await?;

        let view = self.poll(task, self.options.request_timeout).await?;
        match view {
            Some(view) if view.status == "succeeded" => Ok(()),
            Some(view) => {
                let error = view.error.unwrap_or(TaskError {
                    message: view.status.clone(),
                    code: String::new(),
                });
                if error.code == "index_already_exists" {
                    debug!(index = %self.options.index, "index_already_exists");
                    Ok(())
                } else {
                    Err(SyncError::TaskFailed {
                        task,
                        message: error.message,
                    })
                }
            }
            None => Err(SyncError::TaskTimeout {
                task,
                timeout: self.options.request_timeout,
            }),
        }
    }

    /// Poll until the task leaves the queue. `None` means it was still pending
    /// at the deadline.
    async fn poll(&self, task: TaskId, timeout: Duration) -> Result<Option<TaskView>, SyncError> {
        let deadline = Instant::now() + timeout;
        loop {
            let view = self.task_status(task).await?;
            if matches!(view.status.as_str(), "succeeded" | "failed" | "canceled") {
                return Ok(Some(view));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(self.options.poll_interval).await;
        }
    }
}

#[async_trait]
impl BatchSyncClient for MeilisearchClient {
    fn backend(&self) -> &'static str {
        "meilisearch"
    }

    async fn ensure_schema(&self) -> Result<(), SyncError> {
        self.create_index().await?;

        let settings = settings_body();
        let task = self
            .enqueue(
                self.http
                    .patch(self.url(&format!("/indexes/{}/settings", self.options.index)))
                    .json(&settings),
            )
            .await?;
        match self
            .wait_for_completion(task, self.options.request_timeout)
            .await?
        {
            TaskOutcome::Succeeded { .. } => {
                info!(index = %self.options.index, "index_settings_applied");
                Ok(())
            }
            TaskOutcome::Failed { message } => Err(SyncError::TaskFailed { task, message }),
            TaskOutcome::TimedOut => Err(SyncError::TaskTimeout {
                task,
                timeout: self.options.request_timeout,
            }),
        }
    }

    async fn bulk_upsert(&self, records: &[FileRecord]) -> Result<WriteAck, SyncError> {
        if records.is_empty() {
            return Ok(WriteAck::Completed { affected: Some(0) });
        }
        let task = self
            .enqueue(
                self.http
                    .post(self.url(&format!("/indexes/{}/documents", self.options.index)))
                    .query(&[("primaryKey", "id")])
                    .json(records),
            )
            .await?;
        debug!(task = %task, count = records.len(), "documents_enqueued");
        Ok(WriteAck::Enqueued(task))
    }

    async fn delete_where(&self, root: &str, max_seen_at: ScanId) -> Result<WriteAck, SyncError> {
        let task = self
            .enqueue(
                self.http
                    .post(self.url(&format!(
                        "/indexes/{}/documents/delete",
                        self.options.index
                    )))
                    .json(&json!({ "filter": delete_filter(root, max_seen_at) })),
            )
            .await?;
        Ok(WriteAck::Enqueued(task))
    }

    async fn wait_for_completion(
        &self,
        task: TaskId,
        timeout: Duration,
    ) -> Result<TaskOutcome, SyncError> {
        let Some(view) = self.poll(task, timeout).await? else {
            warn!(task = %task, timeout_secs = timeout.as_secs_f64(), "task_still_pending");
            return Ok(TaskOutcome::TimedOut);
        };

        if view.status == "succeeded" {
            let affected = view
                .details
                .as_ref()
                .and_then(|d| {
                    d.get("deletedDocuments")
                        .or_else(|| d.get("indexedDocuments"))
                })
                .and_then(Value::as_u64);
            return Ok(TaskOutcome::Succeeded { affected });
        }

        let message = view
            .error
            .map(|e| e.message)
            .filter(|m| !m.is_empty())
            .unwrap_or(view.status);
        Ok(TaskOutcome::Failed { message })
    }
}

fn settings_body() -> Value {
    json!({
        "filterableAttributes": ["root", "seen_at", "ext", "dirpath", "mtime", "size"],
        "sortableAttributes": ["mtime", "size", "path"],
        "searchableAttributes": ["basename", "path"],
    })
}

/// Escape a value for a single-quoted filter string.
pub fn escape_filter_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

pub fn delete_filter(root: &str, max_seen_at: ScanId) -> String {
    format!(
        "root = '{}' AND seen_at < {max_seen_at}",
        escape_filter_value(root)
    )
}
