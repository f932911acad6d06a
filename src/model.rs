//! Archive data model
//!
//! These are the records that flow through the pipeline: a [`PostUrl`] found
//! in a sitemap, the [`Post`] extracted from its page, and the lightweight
//! [`IndexEntry`] kept for the master index.

use crate::url::date_from_url;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A post location discovered from a child sitemap
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostUrl {
    /// Absolute URL, unique key of the post
    pub url: String,

    /// Last-modified timestamp reported by the sitemap
    #[serde(default)]
    pub lastmod: Option<String>,

    /// `YYYY-MM-DD` date taken from the URL path
    #[serde(default)]
    pub date: Option<String>,
}

impl PostUrl {
    /// Creates a post URL, deriving its date from the path
    pub fn new(url: impl Into<String>, lastmod: Option<String>) -> Self {
        let url = url.into();
        let date = date_from_url(&url).map(|d| d.iso());
        Self { url, lastmod, date }
    }
}

/// The structured record extracted from one post page
///
/// Field order is the on-disk order of the post JSON document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub url: String,
    pub title: String,
    pub author: Option<String>,
    /// ISO calendar date from the URL path
    pub date_from_url: String,
    /// Timestamp from the page's `<time datetime>` attribute
    pub date_iso: Option<String>,
    pub content_html: String,
    pub content_text: String,
    pub tags: Vec<String>,
    pub categories: Vec<String>,
    pub sitemap_lastmod: Option<String>,
    pub scraped_at: DateTime<Utc>,
}

impl Post {
    /// Projects the post into an index entry pointing at `path`
    pub fn index_entry(&self, path: impl Into<String>) -> IndexEntry {
        IndexEntry {
            url: self.url.clone(),
            title: self.title.clone(),
            date_from_url: self.date_from_url.clone(),
            tags: self.tags.clone(),
            categories: self.categories.clone(),
            path: path.into(),
        }
    }
}

/// Master index projection of a completed post
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub url: String,
    pub title: String,
    pub date_from_url: String,
    pub tags: Vec<String>,
    pub categories: Vec<String>,
    /// Post file path relative to the archive root, `/`-separated
    pub path: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_url_derives_date() {
        let post_url = PostUrl::new("https://example.com/2025/12/13/post-title/", None);
        assert_eq!(post_url.date.as_deref(), Some("2025-12-13"));

        let undated = PostUrl::new("https://example.com/about/", None);
        assert_eq!(undated.date, None);
    }

    #[test]
    fn test_post_json_field_order() {
        let post = Post {
            url: "https://example.com/2025/12/13/a/".to_string(),
            title: "A".to_string(),
            author: None,
            date_from_url: "2025-12-13".to_string(),
            date_iso: None,
            content_html: "<p>x</p>".to_string(),
            content_text: "x".to_string(),
            tags: vec![],
            categories: vec![],
            sitemap_lastmod: None,
            scraped_at: DateTime::parse_from_rfc3339("2025-12-14T00:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        };

        let json = serde_json::to_string(&post).unwrap();
        let keys = [
            "\"url\"",
            "\"title\"",
            "\"author\"",
            "\"date_from_url\"",
            "\"date_iso\"",
            "\"content_html\"",
            "\"content_text\"",
            "\"tags\"",
            "\"categories\"",
            "\"sitemap_lastmod\"",
            "\"scraped_at\"",
        ];
        let positions: Vec<usize> = keys.iter().map(|k| json.find(k).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));

        let entry = post.index_entry("2025/12/a.json");
        assert_eq!(entry.path, "2025/12/a.json");
        assert_eq!(entry.url, post.url);
    }
}
