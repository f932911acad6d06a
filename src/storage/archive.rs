//! Archive writer: post documents and the master index
//!
//! Layout under the archive root:
//!
//! ```text
//! index.json
//! progress.json
//! <year>/<month>/<slug>.json
//! ```

use crate::model::{IndexEntry, Post};
use crate::storage::{write_json_atomic, StorageError, StorageResult};
use crate::url::{slug_from_url, UrlDate};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// File name of the master index inside the archive root
pub const INDEX_FILE: &str = "index.json";

/// Upper bound on numbered variants tried when slugs collide
const MAX_COLLISION_SUFFIX: u32 = 100;

/// The master index document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterIndex {
    /// Sitemap index the archive was built from
    pub source: String,
    pub total_posts: usize,
    /// Newest first
    pub posts: Vec<IndexEntry>,
}

/// Writes post documents and the master index under an archive root
#[derive(Debug, Clone)]
pub struct ArchiveWriter {
    root: PathBuf,
}

impl ArchiveWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_FILE)
    }

    /// Writes a post document and returns its path relative to the root
    ///
    /// The path is `<year>/<month>/<slug>.json`. When that file already holds
    /// another URL's post, `<slug>-<day>.json` and then numbered variants are
    /// used instead so two posts never overwrite each other.
    pub fn write_post(&self, post: &Post) -> StorageResult<String> {
        let relative = self.resolve_post_path(post)?;
        write_json_atomic(&self.root.join(&relative), post)?;
        tracing::debug!("Wrote {} to {}", post.url, relative);
        Ok(relative)
    }

    /// Reads a post document by its relative path
    pub fn read_post(&self, relative: &str) -> StorageResult<Post> {
        read_json(&self.root.join(relative))
    }

    /// Rewrites the master index from the given entries
    ///
    /// Entries are keyed by URL (a later entry replaces an earlier one) and
    /// sorted newest first, then by URL, so the same entries always produce
    /// the same bytes.
    pub fn rebuild_index(&self, source: &str, entries: &[IndexEntry]) -> StorageResult<PathBuf> {
        let by_url: BTreeMap<&str, &IndexEntry> =
            entries.iter().map(|e| (e.url.as_str(), e)).collect();

        let mut posts: Vec<IndexEntry> = by_url.into_values().cloned().collect();
        posts.sort_by(|a, b| {
            b.date_from_url
                .cmp(&a.date_from_url)
                .then_with(|| a.url.cmp(&b.url))
        });

        let index = MasterIndex {
            source: source.to_string(),
            total_posts: posts.len(),
            posts,
        };

        let path = self.index_path();
        write_json_atomic(&path, &index)?;
        tracing::info!(
            "Index with {} posts written to {}",
            index.total_posts,
            path.display()
        );
        Ok(path)
    }

    /// Reads the master index
    pub fn read_index(&self) -> StorageResult<MasterIndex> {
        read_json(&self.index_path())
    }

    /// Lists every post document (`<year>/<month>/*.json`) in path order
    pub fn post_files(&self) -> StorageResult<Vec<PathBuf>> {
        let mut files = Vec::new();

        for year in sorted_dirs(&self.root, 4)? {
            for month in sorted_dirs(&year, 2)? {
                let entries = std::fs::read_dir(&month).map_err(StorageError::io(&month))?;
                for entry in entries {
                    let path = entry.map_err(StorageError::io(&month))?.path();
                    if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
                        files.push(path);
                    }
                }
            }
        }

        files.sort();
        Ok(files)
    }

    fn resolve_post_path(&self, post: &Post) -> StorageResult<String> {
        let date = NaiveDate::parse_from_str(&post.date_from_url, "%Y-%m-%d")
            .map(UrlDate)
            .map_err(|e| StorageError::InvalidPath {
                url: post.url.clone(),
                reason: format!("bad date_from_url '{}': {}", post.date_from_url, e),
            })?;

        let slug = slug_from_url(&post.url)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| StorageError::InvalidPath {
                url: post.url.clone(),
                reason: "URL has no path segment to use as slug".to_string(),
            })?;

        let dir = format!("{}/{}", date.year_dir(), date.month_dir());
        let candidates = std::iter::once(slug.clone())
            .chain(std::iter::once(format!("{}-{}", slug, date.day())))
            .chain((2..=MAX_COLLISION_SUFFIX).map(|n| format!("{}-{}-{}", slug, date.day(), n)));

        for name in candidates {
            let relative = format!("{}/{}.json", dir, name);
            if self.slot_is_available(&relative, &post.url) {
                return Ok(relative);
            }
            tracing::debug!("{} is taken by another post, trying next name", relative);
        }

        Err(StorageError::InvalidPath {
            url: post.url.clone(),
            reason: format!("too many posts share the slug '{}'", slug),
        })
    }

    /// A slot is free when no file exists, the file is this URL's post, or the
    /// file is not a readable post at all
    fn slot_is_available(&self, relative: &str, url: &str) -> bool {
        let path = self.root.join(relative);
        if !path.exists() {
            return true;
        }

        match read_json::<serde_json::Value>(&path) {
            Ok(existing) => existing.get("url").and_then(|u| u.as_str()) == Some(url),
            Err(_) => true,
        }
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> StorageResult<T> {
    let bytes = std::fs::read(path).map_err(StorageError::io(path))?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Subdirectories of `dir` whose names are exactly `width` ASCII digits
fn sorted_dirs(dir: &Path, width: usize) -> StorageResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(StorageError::io(dir))? {
        let path = entry.map_err(StorageError::io(dir))?.path();
        let numeric = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.len() == width && n.bytes().all(|b| b.is_ascii_digit()));
        if numeric && path.is_dir() {
            dirs.push(path);
        }
    }

    dirs.sort();
    Ok(dirs)
}
