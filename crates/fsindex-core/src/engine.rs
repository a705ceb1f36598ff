//! Engine client construction from configuration.

use crate::{Backend, CoreError, EngineConfig, IndexerConfig};
use fsindex_sync::{
    BatchSyncClient, ManticoreClient, ManticoreOptions, MeilisearchClient, MeilisearchOptions,
    SyncWriter,
};
use std::sync::Arc;
use std::time::Duration;

/// Build the client for the configured backend.
pub fn connect(config: &EngineConfig) -> Result<Arc<dyn BatchSyncClient>, CoreError> {
    let request_timeout = Duration::from_secs(config.request_timeout_secs);
    let client: Arc<dyn BatchSyncClient> = match config.backend {
        Backend::Manticore => Arc::new(ManticoreClient::new(ManticoreOptions {
            url: config.url.clone(),
            index: config.index.clone(),
            request_timeout,
            sweep_timeout: Duration::from_secs(config.sweep_timeout_secs),
        })?),
        Backend::Meilisearch => Arc::new(MeilisearchClient::new(MeilisearchOptions {
            url: config.url.clone(),
            index: config.index.clone(),
            api_key: config.api_key.clone(),
            request_timeout,
            poll_interval: Duration::from_millis(config.task_poll_interval_ms),
        })?),
    };
    Ok(client)
}

/// Wrap a client in the configured retry and task-timeout policy.
pub fn writer_for(config: &IndexerConfig, client: Arc<dyn BatchSyncClient>) -> SyncWriter {
    SyncWriter::new(
        client,
        config.retry_policy(),
        Duration::from_secs(config.engine.task_timeout_secs),
    )
}
