//! Storage error types

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while writing or reading archive files
///
/// Any of these aborts the run.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Cannot derive an archive path for {url}: {reason}")]
    InvalidPath { url: String, reason: String },
}

impl StorageError {
    /// Builds a closure that wraps an IO error with the path it happened at
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
