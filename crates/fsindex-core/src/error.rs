//! Core error types for fsindex.

use fsindex_indexer::IndexerError;
use fsindex_sync::SyncError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur in core operations
#[derive(Debug, Error)]
pub enum CoreError {
    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Configuration file could not be parsed
    #[error("Config parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Filesystem side failure
    #[error(transparent)]
    Indexer(#[from] IndexerError),

    /// Search engine failure that survived retries
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// Another live process holds the PID lock
    #[error("Indexer already running (PID: {pid}, lock {})", pid_file.display())]
    AlreadyRunning { pid: u32, pid_file: PathBuf },

    /// Scanner worker thread died
    #[error("Scanner task failed: {0}")]
    ScannerTask(String),
}
