//! Checkpoint state: every discovered URL with its status
//!
//! The state is an in-memory value owned by the coordinator. Transitions go
//! through [`CheckpointState::record_attempt`], which consumes the state and
//! returns the updated one; persisting it is the job of the checkpoint store.

use crate::model::{IndexEntry, PostUrl};
use crate::state::PostStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Current on-disk checkpoint format version
pub const CHECKPOINT_VERSION: u32 = 1;

/// Errors raised by checkpoint state transitions and validation
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("URL is not part of the checkpoint: {0}")]
    UnknownUrl(String),

    #[error("Invalid status transition for {url}: {from} -> {to}")]
    InvalidTransition {
        url: String,
        from: PostStatus,
        to: PostStatus,
    },

    #[error("Invalid checkpoint: {0}")]
    Invalid(String),
}

/// Cumulative attempt counters across all runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    pub attempted: u64,
    pub succeeded: u64,
    pub failed: u64,
}

/// Result of one fetch-extract-write attempt for a URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The post was archived; carries its index entry
    Done(IndexEntry),
    /// The attempt failed; carries the reason
    Failed(String),
}

impl AttemptOutcome {
    fn status(&self) -> PostStatus {
        match self {
            Self::Done(_) => PostStatus::Done,
            Self::Failed(_) => PostStatus::Failed,
        }
    }
}

/// Checkpoint record of a single discovered URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlRecord {
    #[serde(flatten)]
    pub post_url: PostUrl,

    pub status: PostStatus,

    /// Number of attempts made across all runs
    #[serde(default)]
    pub attempts: u32,

    /// Reason of the most recent failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,

    /// When the most recent attempt was recorded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_attempt: Option<DateTime<Utc>>,

    /// Index entry, present exactly when the status is `done`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry: Option<IndexEntry>,
}

impl UrlRecord {
    fn pending(post_url: PostUrl) -> Self {
        Self {
            post_url,
            status: PostStatus::Pending,
            attempts: 0,
            last_error: None,
            last_attempt: None,
            entry: None,
        }
    }

    pub fn url(&self) -> &str {
        &self.post_url.url
    }
}

/// Outcome of merging a discovery result into the checkpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    /// URLs seen for the first time, now pending
    pub added: usize,
    /// URLs already tracked, left untouched
    pub known: usize,
}

/// Durable crawl progress
///
/// URLs are kept in discovery order. New URLs are only ever appended, so the
/// checkpoint is a superset of every discovery merged into it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointState {
    pub version: u32,

    /// Sitemap index the URLs were discovered from
    #[serde(default)]
    pub source: Option<String>,

    #[serde(default)]
    urls: Vec<UrlRecord>,

    #[serde(default)]
    pub counters: Counters,

    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,

    #[serde(skip)]
    positions: HashMap<String, usize>,
}

impl Default for CheckpointState {
    fn default() -> Self {
        Self::empty()
    }
}

impl CheckpointState {
    /// Creates the initial state of a first run
    pub fn empty() -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            source: None,
            urls: Vec::new(),
            counters: Counters::default(),
            last_updated: None,
            positions: HashMap::new(),
        }
    }

    /// Checks the invariants of a deserialized state and rebuilds its lookup table
    ///
    /// # Errors
    ///
    /// * Unsupported version
    /// * Duplicate URLs
    /// * A `done` record without an index entry, or with one for another URL
    /// * Counters where succeeded + failed exceeds attempted
    pub fn validated(mut self) -> Result<Self, StateError> {
        if self.version != CHECKPOINT_VERSION {
            return Err(StateError::Invalid(format!(
                "unsupported version {} (expected {})",
                self.version, CHECKPOINT_VERSION
            )));
        }

        self.positions.clear();
        for (i, record) in self.urls.iter().enumerate() {
            if self.positions.insert(record.url().to_string(), i).is_some() {
                return Err(StateError::Invalid(format!(
                    "duplicate URL {}",
                    record.url()
                )));
            }

            match (&record.status, &record.entry) {
                (PostStatus::Done, None) => {
                    return Err(StateError::Invalid(format!(
                        "{} is done but has no index entry",
                        record.url()
                    )));
                }
                (PostStatus::Done, Some(entry)) if entry.url != record.url() => {
                    return Err(StateError::Invalid(format!(
                        "{} has an index entry for {}",
                        record.url(),
                        entry.url
                    )));
                }
                _ => {}
            }
        }

        let counters = &self.counters;
        if counters.succeeded + counters.failed > counters.attempted {
            return Err(StateError::Invalid(format!(
                "counters inconsistent: {} succeeded + {} failed > {} attempted",
                counters.succeeded, counters.failed, counters.attempted
            )));
        }

        Ok(self)
    }

    /// Number of tracked URLs
    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    /// All records in discovery order
    pub fn records(&self) -> &[UrlRecord] {
        &self.urls
    }

    /// Looks up the record of a URL
    pub fn get(&self, url: &str) -> Option<&UrlRecord> {
        self.positions.get(url).map(|&i| &self.urls[i])
    }

    /// Status of a URL, if tracked
    pub fn status_of(&self, url: &str) -> Option<PostStatus> {
        self.get(url).map(|r| r.status)
    }

    /// Number of URLs currently in `status`
    pub fn count(&self, status: PostStatus) -> usize {
        self.urls.iter().filter(|r| r.status == status).count()
    }

    /// Merges a discovery result into the state
    ///
    /// Unknown URLs are appended as pending in discovery order. Known URLs keep
    /// their record untouched, so a `done` post is never queued again.
    pub fn merge_discovered(&mut self, discovered: &[PostUrl]) -> MergeSummary {
        let mut summary = MergeSummary::default();

        for post_url in discovered {
            if self.positions.contains_key(&post_url.url) {
                summary.known += 1;
                continue;
            }

            self.positions
                .insert(post_url.url.clone(), self.urls.len());
            self.urls.push(UrlRecord::pending(post_url.clone()));
            summary.added += 1;
        }

        summary
    }

    /// Records the outcome of an attempt and returns the updated state
    ///
    /// Allowed transitions are pending→done, pending→failed, and, during a
    /// retry pass, failed→done and failed→failed. Counters are incremented.
    pub fn record_attempt(
        mut self,
        url: &str,
        outcome: AttemptOutcome,
        at: DateTime<Utc>,
    ) -> Result<Self, StateError> {
        let index = *self
            .positions
            .get(url)
            .ok_or_else(|| StateError::UnknownUrl(url.to_string()))?;

        let record = &mut self.urls[index];
        let next = outcome.status();
        if !record.status.can_transition_to(next) {
            return Err(StateError::InvalidTransition {
                url: url.to_string(),
                from: record.status,
                to: next,
            });
        }

        record.status = next;
        record.attempts += 1;
        record.last_attempt = Some(at);
        self.counters.attempted += 1;

        match outcome {
            AttemptOutcome::Done(entry) => {
                record.entry = Some(entry);
                record.last_error = None;
                self.counters.succeeded += 1;
            }
            AttemptOutcome::Failed(reason) => {
                record.entry = None;
                record.last_error = Some(reason);
                self.counters.failed += 1;
            }
        }

        self.last_updated = Some(at);
        Ok(self)
    }

    /// Puts every failed URL back to pending, returning how many were reset
    pub fn reset_failed(&mut self) -> usize {
        let mut reset = 0;
        for record in self.urls.iter_mut() {
            if record.status == PostStatus::Failed {
                record.status = PostStatus::Pending;
                reset += 1;
            }
        }
        reset
    }

    /// URLs to process in a crawl pass, in discovery order
    pub fn crawl_queue(&self, retry_failed: bool) -> Vec<PostUrl> {
        self.urls
            .iter()
            .filter(|r| r.status.is_crawlable(retry_failed))
            .map(|r| r.post_url.clone())
            .collect()
    }

    /// Index entries of every `done` URL, in discovery order
    pub fn index_entries(&self) -> Vec<IndexEntry> {
        self.urls
            .iter()
            .filter(|r| r.status == PostStatus::Done)
            .filter_map(|r| r.entry.clone())
            .collect()
    }

    /// Records currently marked failed
    pub fn failures(&self) -> impl Iterator<Item = &UrlRecord> {
        self.urls.iter().filter(|r| r.status == PostStatus::Failed)
    }

    /// Updates the last-modified timestamp
    pub fn touch(&mut self, at: DateTime<Utc>) {
        self.last_updated = Some(at);
    }
}
