/// Post status definitions for tracking archive progress
///
/// Every discovered URL is in exactly one of these states at any time.
use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents the current status of a post URL in the checkpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    /// Discovered but not yet successfully archived
    Pending,

    /// Fetched, extracted and written to the archive
    Done,

    /// Fetching or extraction failed permanently for this attempt
    Failed,
}

impl PostStatus {
    /// Returns true if the URL will never be crawled again
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Returns true if the URL belongs in a crawl pass
    ///
    /// Failed URLs are only crawled when the retry policy allows it.
    pub fn is_crawlable(&self, retry_failed: bool) -> bool {
        match self {
            Self::Pending => true,
            Self::Failed => retry_failed,
            Self::Done => false,
        }
    }

    /// Returns true if a transition to `next` is allowed
    ///
    /// | From | To |
    /// |------|----|
    /// | pending | done, failed |
    /// | failed | done, failed, pending (reset) |
    /// | done | nothing |
    pub fn can_transition_to(&self, next: PostStatus) -> bool {
        match self {
            Self::Pending => matches!(next, Self::Done | Self::Failed),
            Self::Failed => true,
            Self::Done => false,
        }
    }

    /// Converts the status to its checkpoint string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    /// Returns all possible statuses
    pub fn all() -> [Self; 3] {
        [Self::Pending, Self::Done, Self::Failed]
    }
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
