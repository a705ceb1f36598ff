//! Indexer error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while preparing or running a scan.
#[derive(Debug, Error)]
pub enum IndexerError {
    /// Failed to read the exclusion pattern file
    #[error("Failed to read exclusion file {path}: {source}")]
    ExcludesFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Compiled pattern set could not be built
    #[error("Invalid exclusion pattern {pattern}: {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excludes_file_display() {
        let err = IndexerError::ExcludesFile {
            path: PathBuf::from("/test/excludes.txt"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        let msg = err.to_string();
        assert!(msg.contains("/test/excludes.txt"));
        assert!(msg.contains("denied"));
    }

    #[test]
    fn test_invalid_pattern_display() {
        let err = IndexerError::InvalidPattern {
            pattern: "[abc".to_string(),
            reason: "unclosed character class".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("[abc"));
        assert!(msg.contains("unclosed"));
    }
}
