//! Plain-text corpus export
//!
//! Concatenates every archived post into a single text file, one block per
//! post in archive path order (year, month, slug).

use crate::model::Post;
use crate::storage::{write_atomic, ArchiveWriter, StorageResult};
use std::path::Path;

/// Writes the corpus of every post under the archive root to `output_path`
///
/// Post files that cannot be read or parsed are logged and skipped.
///
/// # Returns
///
/// * `Ok(usize)` - Number of posts written
/// * `Err(StorageError)` - Listing the archive or writing the corpus failed
pub fn export_corpus(archive: &ArchiveWriter, output_path: &Path) -> StorageResult<usize> {
    let files = archive.post_files()?;
    tracing::info!("Found {} post files", files.len());

    let mut corpus = String::new();
    let mut count = 0;

    for path in &files {
        let post = std::fs::read(path)
            .map_err(|e| e.to_string())
            .and_then(|bytes| serde_json::from_slice::<Post>(&bytes).map_err(|e| e.to_string()));

        match post {
            Ok(post) => {
                corpus.push_str(&format_corpus_entry(&post));
                count += 1;
            }
            Err(e) => tracing::warn!("Skipping {}: {}", path.display(), e),
        }
    }

    write_atomic(output_path, corpus.as_bytes())?;
    tracing::info!(
        "Exported {} posts to {}",
        count,
        output_path.display()
    );

    Ok(count)
}

/// Formats one post as a corpus block
pub fn format_corpus_entry(post: &Post) -> String {
    let date = post
        .date_iso
        .as_deref()
        .filter(|d| !d.is_empty())
        .unwrap_or(&post.date_from_url);

    let mut entry = String::new();
    entry.push_str(&format!("Title: {}\n", post.title));
    entry.push_str(&format!("Date: {}\n", date));
    entry.push_str(&"-".repeat(20));
    entry.push('\n');
    entry.push_str(&post.content_text);
    entry.push('\n');
    entry.push_str(&"-".repeat(20));
    entry.push('\n');
    entry.push_str(&"=".repeat(80));
    entry.push_str("\n\n");
    entry
}
