//! Blog-Archiver: a resumable sitemap-driven blog archiver
//!
//! This crate discovers every post of a blog from its sitemap index, fetches
//! each post politely, extracts structured fields and persists one JSON
//! document per post plus a master index. Progress is checkpointed so an
//! interrupted run picks up where it stopped.

pub mod config;
pub mod crawler;
pub mod model;
pub mod output;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Blog-Archiver operations
///
/// Only the variants wrapped here abort a run. Per-post fetch and
/// extraction failures are recorded in the checkpoint instead.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Discovery error: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Checkpoint state error: {0}")]
    State(#[from] state::StateError),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Errors surfaced by the HTTP fetcher once its retries are exhausted
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Connection failed for {url}: {message}")]
    Connect { url: String, message: String },

    #[error("Failed to read response body from {url}: {message}")]
    Body { url: String, message: String },

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Request to {url} failed: {message}")]
    Request { url: String, message: String },
}

impl FetchError {
    /// Returns true if retrying the same request may succeed
    ///
    /// Timeouts, connection failures, interrupted bodies and 5xx responses
    /// are transient. Client errors (4xx) and anything else are not.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Connect { .. } | Self::Body { .. } => true,
            Self::Status { status, .. } => *status >= 500,
            Self::Request { .. } => false,
        }
    }

    /// The URL the failed request was made for
    pub fn url(&self) -> &str {
        match self {
            Self::Timeout { url }
            | Self::Connect { url, .. }
            | Self::Body { url, .. }
            | Self::Status { url, .. }
            | Self::Request { url, .. } => url,
        }
    }
}

/// Sitemap index failures that make the whole run impossible
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Failed to fetch sitemap index: {0}")]
    IndexUnreachable(#[source] FetchError),

    #[error("Failed to parse sitemap index {url}: {message}")]
    IndexMalformed { url: String, message: String },

    #[error("Sitemap index {url} lists no child sitemaps matching '{filter}'")]
    EmptyIndex { url: String, filter: String },
}

/// Per-post extraction failures
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("Required field '{0}' is missing")]
    MissingField(&'static str),

    #[error("URL has no /YYYY/MM/DD/slug/ date segment: {0}")]
    UndatedUrl(String),
}

/// Result type alias for Blog-Archiver operations
pub type Result<T> = std::result::Result<T, ArchiveError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Coordinator, Phase, RunOutcome, RunReport};
pub use model::{IndexEntry, Post, PostUrl};
pub use state::{CheckpointState, PostStatus};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_transience() {
        let url = "https://example.com/".to_string();
        assert!(FetchError::Timeout { url: url.clone() }.is_transient());
        assert!(FetchError::Status {
            url: url.clone(),
            status: 503
        }
        .is_transient());
        assert!(!FetchError::Status {
            url: url.clone(),
            status: 404
        }
        .is_transient());
        assert!(!FetchError::Request {
            url,
            message: "builder".to_string()
        }
        .is_transient());
    }
}
