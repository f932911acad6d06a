//! Atomic file replacement
//!
//! Content is written to a temporary file in the destination directory,
//! flushed to disk, then renamed over the destination. A reader sees either
//! the previous complete file or the new complete file.

use crate::storage::{StorageError, StorageResult};
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Atomically replaces `path` with `bytes`, creating parent directories
pub fn write_atomic(path: &Path, bytes: &[u8]) -> StorageResult<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(StorageError::io(dir))?;

    // Same directory as the target so the rename never crosses filesystems
    let mut tmp = NamedTempFile::new_in(dir).map_err(StorageError::io(dir))?;
    tmp.write_all(bytes).map_err(StorageError::io(tmp.path()))?;
    tmp.as_file()
        .sync_all()
        .map_err(StorageError::io(tmp.path()))?;

    tmp.persist(path).map_err(|e| StorageError::Io {
        path: path.to_path_buf(),
        source: e.error,
    })?;

    Ok(())
}

/// Serializes `value` as pretty JSON with a trailing newline and writes it atomically
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> StorageResult<()> {
    let mut bytes = serde_json::to_vec_pretty(value)?;
    bytes.push(b'\n');
    write_atomic(path, &bytes)
}
