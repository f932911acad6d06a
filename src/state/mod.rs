//! State module for tracking archive progress
//!
//! This module holds the checkpoint state that makes a run resumable.
//!
//! # Components
//!
//! - `PostStatus`: Tracks the status of an individual post URL (pending, done, failed)
//! - `CheckpointState`: Every discovered URL with its status, plus run counters

mod checkpoint;
mod post_status;

// Re-export main types
pub use checkpoint::{
    AttemptOutcome, CheckpointState, Counters, MergeSummary, StateError, UrlRecord,
    CHECKPOINT_VERSION,
};
pub use post_status::PostStatus;
