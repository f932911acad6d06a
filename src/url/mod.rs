//! URL handling module for Blog-Archiver
//!
//! Post URLs carry their publication date in the path
//! (`/YYYY/MM/DD/slug/`). This module derives that date and the
//! filesystem-safe slug used to name archived post files.

mod date;
mod slug;

pub use date::{date_from_url, UrlDate};
pub use slug::{sanitize_slug, slug_from_url, MAX_SLUG_LEN};

/// Returns the non-empty path segments of a URL, or None if it does not parse
pub(crate) fn path_segments(url: &str) -> Option<Vec<String>> {
    let parsed = ::url::Url::parse(url).ok()?;
    let segments = parsed
        .path_segments()?
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    Some(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_segments_skip_empty() {
        let segments = path_segments("https://example.com/2025/12/13/post-title/").unwrap();
        assert_eq!(segments, vec!["2025", "12", "13", "post-title"]);
    }

    #[test]
    fn test_path_segments_invalid_url() {
        assert!(path_segments("not a url").is_none());
    }
}
