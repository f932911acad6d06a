use crate::url::path_segments;

/// Maximum number of characters kept from a slug
pub const MAX_SLUG_LEN: usize = 100;

/// Makes a slug safe to use as a file name
///
/// Every character that is not alphanumeric, `_` or `-` becomes `_`, and the
/// result is truncated to [`MAX_SLUG_LEN`] characters.
pub fn sanitize_slug(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .take(MAX_SLUG_LEN)
        .collect()
}

/// Returns the sanitized final path segment of a URL
///
/// # Examples
///
/// ```
/// use blog_archiver::url::slug_from_url;
///
/// assert_eq!(
///     slug_from_url("https://example.com/2025/12/13/post-title/").as_deref(),
///     Some("post-title")
/// );
/// ```
pub fn slug_from_url(url: &str) -> Option<String> {
    let segments = path_segments(url)?;
    segments.last().map(|s| sanitize_slug(s))
}
