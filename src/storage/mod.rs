//! Storage module for persisting the archive
//!
//! This module handles every file the archiver writes, including:
//! - Atomic replacement of files (temp file + rename)
//! - The checkpoint file (`progress.json`) enabling resume
//! - One JSON document per post under `<year>/<month>/<slug>.json`
//! - The master index (`index.json`)

mod archive;
mod atomic;
mod checkpoint_store;
mod error;

pub use archive::{ArchiveWriter, MasterIndex, INDEX_FILE};
pub use atomic::{write_atomic, write_json_atomic};
pub use checkpoint_store::{CheckpointStore, CHECKPOINT_FILE};
pub use error::{StorageError, StorageResult};

use std::path::Path;

/// Opens the checkpoint store and archive writer rooted at `output_dir`
pub fn open_archive(output_dir: &Path) -> (CheckpointStore, ArchiveWriter) {
    (
        CheckpointStore::in_dir(output_dir),
        ArchiveWriter::new(output_dir),
    )
}
