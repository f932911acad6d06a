use crate::url::path_segments;
use chrono::{Datelike, NaiveDate};

/// A publication date taken from a post URL path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UrlDate(pub NaiveDate);

impl UrlDate {
    /// ISO calendar date, e.g. `2025-12-13`
    pub fn iso(&self) -> String {
        self.0.format("%Y-%m-%d").to_string()
    }

    /// Four-digit year directory name
    pub fn year_dir(&self) -> String {
        format!("{:04}", self.0.year())
    }

    /// Two-digit month directory name
    pub fn month_dir(&self) -> String {
        format!("{:02}", self.0.month())
    }

    /// Two-digit day, used to disambiguate colliding slugs
    pub fn day(&self) -> String {
        format!("{:02}", self.0.day())
    }
}

/// Extracts the publication date from a `/YYYY/MM/DD/slug/` URL path
///
/// The date segments must be followed by a non-empty slug segment and
/// must form a real calendar date.
///
/// # Examples
///
/// ```
/// use blog_archiver::url::date_from_url;
///
/// let date = date_from_url("https://example.com/2025/12/13/post-title/").unwrap();
/// assert_eq!(date.iso(), "2025-12-13");
/// assert!(date_from_url("https://example.com/about/").is_none());
/// ```
pub fn date_from_url(url: &str) -> Option<UrlDate> {
    let segments = path_segments(url)?;

    segments.windows(4).find_map(|window| {
        let (year, month, day) = (&window[0], &window[1], &window[2]);
        if !is_digits(year, 4) || !is_digits(month, 2) || !is_digits(day, 2) {
            return None;
        }

        NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)
            .map(UrlDate)
    })
}

fn is_digits(segment: &str, len: usize) -> bool {
    segment.len() == len && segment.bytes().all(|b| b.is_ascii_digit())
}
