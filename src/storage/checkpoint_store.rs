//! Durable checkpoint file
//!
//! The checkpoint is `progress.json` at the archive root. Loading never
//! fails: a missing file means a first run, and an unreadable or invalid
//! file is moved aside so the run can start over without destroying it.

use crate::state::CheckpointState;
use crate::storage::{write_json_atomic, StorageResult};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// File name of the checkpoint inside the archive root
pub const CHECKPOINT_FILE: &str = "progress.json";

/// What the checkpoint file holds
enum Stored {
    Missing,
    Unreadable(std::io::Error),
    Corrupt(String),
    Valid(CheckpointState),
}

/// Loads and saves the checkpoint state
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    /// Creates a store backed by the given file
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Creates a store for `progress.json` inside `output_dir`
    pub fn in_dir(output_dir: &Path) -> Self {
        Self::new(output_dir.join(CHECKPOINT_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the checkpoint, falling back to an empty state
    ///
    /// Corruption is logged and the bad file renamed to `progress.json.corrupt`;
    /// it is never fatal.
    pub fn load(&self) -> CheckpointState {
        match self.read() {
            Stored::Missing => {
                tracing::info!(
                    "No checkpoint at {}, starting from scratch",
                    self.path.display()
                );
                CheckpointState::empty()
            }
            Stored::Unreadable(e) => {
                tracing::warn!(
                    "Failed to read checkpoint {}: {}. Starting from scratch",
                    self.path.display(),
                    e
                );
                CheckpointState::empty()
            }
            Stored::Corrupt(reason) => {
                tracing::warn!(
                    "Checkpoint {} is corrupt ({}). Starting from scratch",
                    self.path.display(),
                    reason
                );
                self.quarantine();
                CheckpointState::empty()
            }
            Stored::Valid(state) => {
                tracing::info!(
                    "Loaded checkpoint with {} URLs ({} succeeded, {} failed so far)",
                    state.len(),
                    state.counters.succeeded,
                    state.counters.failed
                );
                state
            }
        }
    }

    /// Reads the checkpoint without touching the file
    ///
    /// A missing, unreadable or corrupt checkpoint reads as an empty state
    /// and stays where it is.
    pub fn peek(&self) -> CheckpointState {
        match self.read() {
            Stored::Valid(state) => state,
            Stored::Missing => CheckpointState::empty(),
            Stored::Unreadable(e) => {
                tracing::warn!("Failed to read checkpoint {}: {}", self.path.display(), e);
                CheckpointState::empty()
            }
            Stored::Corrupt(reason) => {
                tracing::warn!("Checkpoint {} is corrupt ({})", self.path.display(), reason);
                CheckpointState::empty()
            }
        }
    }

    fn read(&self) -> Stored {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Stored::Missing,
            Err(e) => return Stored::Unreadable(e),
        };

        let parsed = serde_json::from_slice::<CheckpointState>(&bytes)
            .map_err(|e| e.to_string())
            .and_then(|state| state.validated().map_err(|e| e.to_string()));

        match parsed {
            Ok(state) => Stored::Valid(state),
            Err(reason) => Stored::Corrupt(reason),
        }
    }

    /// Atomically replaces the checkpoint file with `state`
    pub fn save(&self, state: &CheckpointState) -> StorageResult<()> {
        write_json_atomic(&self.path, state)?;
        tracing::debug!("Checkpoint saved to {}", self.path.display());
        Ok(())
    }

    /// Path the corrupt checkpoint is moved to
    pub fn quarantine_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(".corrupt");
        PathBuf::from(name)
    }

    fn quarantine(&self) {
        let target = self.quarantine_path();
        if let Err(e) = std::fs::rename(&self.path, &target) {
            tracing::warn!(
                "Failed to move corrupt checkpoint to {}: {}",
                target.display(),
                e
            );
        }
    }
}
