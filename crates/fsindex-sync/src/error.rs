//! Sync error types.

use crate::TaskId;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while talking to the search engine.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Network-level failure (connect, timeout, broken body)
    #[error("Transport error: {message}")]
    Transport { message: String, retryable: bool },

    /// Engine answered with a non-success HTTP status
    #[error("Engine returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Engine accepted the call but reported an error in the payload
    #[error("Engine rejected request: {0}")]
    Engine(String),

    /// Asynchronous task finished unsuccessfully
    #[error("Task {task} failed: {message}")]
    TaskFailed { task: TaskId, message: String },

    /// Asynchronous task did not settle in time
    #[error("Task {task} still pending after {timeout:?}")]
    TaskTimeout { task: TaskId, timeout: Duration },

    /// Response body did not have the expected shape
    #[error("Invalid engine response: {0}")]
    InvalidResponse(String),

    /// Client could not be constructed from its options
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl SyncError {
    /// Check if this error is worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { retryable, .. } => *retryable,
            SyncError::Status { status, .. } => *status >= 500 || *status == 429 || *status == 408,
            SyncError::TaskTimeout { .. } => true,
            SyncError::Engine(_) => false,
            SyncError::TaskFailed { .. } => false,
            SyncError::InvalidResponse(_) => false,
            SyncError::InvalidConfig(_) => false,
        }
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_builder() {
            return SyncError::InvalidConfig(e.to_string());
        }
        if e.is_decode() {
            return SyncError::InvalidResponse(e.to_string());
        }
        if let Some(status) = e.status() {
            return SyncError::Status {
                status: status.as_u16(),
                body: e.to_string(),
            };
        }
        SyncError::Transport {
            retryable: e.is_timeout() || e.is_connect() || e.is_request() || e.is_body(),
            message: e.to_string(),
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self {
        SyncError::InvalidResponse(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_retryability() {
        let status = |status| SyncError::Status {
            status,
            body: String::new(),
        };
        assert!(status(500).is_retryable());
        assert!(status(503).is_retryable());
        assert!(status(429).is_retryable());
        assert!(!status(400).is_retryable());
        assert!(!status(404).is_retryable());
    }

    #[test]
    fn test_task_errors_retryability() {
        let timeout = SyncError::TaskTimeout {
            task: TaskId(7),
            timeout: Duration::from_secs(1),
        };
        let failed = SyncError::TaskFailed {
            task: TaskId(7),
            message: "bad filter".to_string(),
        };
        assert!(timeout.is_retryable());
        assert!(!failed.is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = SyncError::Status {
            status: 502,
            body: "bad gateway".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("502"));
        assert!(msg.contains("bad gateway"));

        let err = SyncError::TaskFailed {
            task: TaskId(12),
            message: "invalid_document_id".to_string(),
        };
        assert!(err.to_string().contains("Task 12"));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: SyncError = json_err.into();
        assert!(matches!(err, SyncError::InvalidResponse(_)));
        assert!(!err.is_retryable());
    }
}
