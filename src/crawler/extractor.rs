//! Post field extraction
//!
//! A [`PostParser`] knows one site's markup and returns whatever fields it can
//! find. The [`PostExtractor`] applies the required-field rules on top and
//! builds the [`Post`] record. Both are pure: the same HTML always gives the
//! same result.

use crate::model::{Post, PostUrl};
use crate::ExtractionError;
use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;

/// Raw fields found on a post page, before any validation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedFields {
    pub title: Option<String>,
    pub author: Option<String>,
    pub date_iso: Option<String>,
    /// Outer HTML of the content container
    pub content_html: Option<String>,
    pub content_text: Option<String>,
    pub tags: Vec<String>,
    pub categories: Vec<String>,
}

/// Markup-specific field lookup for a post page
pub trait PostParser: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Reads the raw fields out of a post page
    fn parse(&self, html: &str) -> ParsedFields;
}

/// Parser for WordPress-style themes
///
/// Each field is looked up through a list of selectors, first match wins.
#[derive(Debug, Clone, Default)]
pub struct WordPressParser;

const TITLE_SELECTORS: &[&str] = &["h1.entry-title", "h1"];
const DATE_SELECTORS: &[&str] = &["time.entry-date", "time", ".posted-on"];
const AUTHOR_SELECTORS: &[&str] = &[".author", "a[rel=author]"];
const CONTENT_SELECTORS: &[&str] = &["div.entry-content", "article", ".post-content"];
const TAG_CONTAINERS: &[&str] = &[".tags-links", ".post-tags"];
const CATEGORY_CONTAINERS: &[&str] = &[".cat-links", ".post-categories"];

impl PostParser for WordPressParser {
    fn name(&self) -> &str {
        "wordpress"
    }

    fn parse(&self, html: &str) -> ParsedFields {
        let document = Html::parse_document(html);

        let title = first_match(&document, TITLE_SELECTORS)
            .map(inline_text)
            .filter(|t| !t.is_empty());

        let date_iso = first_match(&document, DATE_SELECTORS)
            .and_then(|el| el.value().attr("datetime"))
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());

        let author = first_match(&document, AUTHOR_SELECTORS)
            .map(inline_text)
            .filter(|a| !a.is_empty());

        let content = first_match(&document, CONTENT_SELECTORS);

        ParsedFields {
            title,
            author,
            date_iso,
            content_html: content.map(|el| el.html()),
            content_text: content.map(html_to_text),
            tags: link_texts(&document, TAG_CONTAINERS),
            categories: link_texts(&document, CATEGORY_CONTAINERS),
        }
    }
}

/// Builds [`Post`] records from fetched pages
pub struct PostExtractor {
    parser: Box<dyn PostParser>,
}

impl Default for PostExtractor {
    fn default() -> Self {
        Self::new(Box::new(WordPressParser))
    }
}

impl PostExtractor {
    pub fn new(parser: Box<dyn PostParser>) -> Self {
        Self { parser }
    }

    pub fn parser_name(&self) -> &str {
        self.parser.name()
    }

    /// Extracts a post from its page
    ///
    /// # Errors
    ///
    /// * `ExtractionError::UndatedUrl` - The URL has no `/YYYY/MM/DD/slug/` path
    /// * `ExtractionError::MissingField("title")` - No non-empty title was found
    /// * `ExtractionError::MissingField("content")` - No content container was found
    pub fn extract(
        &self,
        post_url: &PostUrl,
        html: &str,
        scraped_at: DateTime<Utc>,
    ) -> Result<Post, ExtractionError> {
        let date_from_url = post_url
            .date
            .clone()
            .ok_or_else(|| ExtractionError::UndatedUrl(post_url.url.clone()))?;

        let fields = self.parser.parse(html);

        let title = fields.title.ok_or(ExtractionError::MissingField("title"))?;
        let content_html = fields
            .content_html
            .ok_or(ExtractionError::MissingField("content"))?;

        Ok(Post {
            url: post_url.url.clone(),
            title,
            author: fields.author,
            date_from_url,
            date_iso: fields.date_iso,
            content_html,
            content_text: fields.content_text.unwrap_or_default(),
            tags: dedupe(fields.tags),
            categories: dedupe(fields.categories),
            sitemap_lastmod: post_url.lastmod.clone(),
            scraped_at,
        })
    }
}

fn first_match<'a>(document: &'a Html, selectors: &[&str]) -> Option<ElementRef<'a>> {
    selectors.iter().find_map(|s| {
        let selector = Selector::parse(s).ok()?;
        document.select(&selector).next()
    })
}

/// Texts of the links inside the first matching container
fn link_texts(document: &Html, containers: &[&str]) -> Vec<String> {
    let Some(container) = first_match(document, containers) else {
        return Vec::new();
    };
    let Ok(links) = Selector::parse("a") else {
        return Vec::new();
    };

    container
        .select(&links)
        .map(inline_text)
        .filter(|t| !t.is_empty())
        .collect()
}

/// Element text on one line with whitespace collapsed
fn inline_text(element: ElementRef) -> String {
    collapse_whitespace(&element.text().collect::<String>())
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn dedupe(values: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .into_iter()
        .filter(|v| seen.insert(v.clone()))
        .collect()
}

/// Elements whose content never reaches the text rendition
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// Elements rendered on lines of their own
const BLOCK_ELEMENTS: &[&str] = &[
    "address",
    "article",
    "aside",
    "blockquote",
    "dd",
    "div",
    "dl",
    "dt",
    "figcaption",
    "figure",
    "footer",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "header",
    "hr",
    "li",
    "ol",
    "p",
    "pre",
    "section",
    "table",
    "td",
    "th",
    "tr",
    "ul",
];

/// Renders an element as plain text
///
/// Block elements and `<br>` start new lines, whitespace inside a line is
/// collapsed and empty lines are dropped.
pub fn html_to_text(element: ElementRef) -> String {
    let mut lines = vec![String::new()];
    collect_text(element, &mut lines);

    lines
        .iter()
        .map(|line| collapse_whitespace(line))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn collect_text(element: ElementRef, lines: &mut Vec<String>) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            if let Some(line) = lines.last_mut() {
                line.push_str(text);
            }
            continue;
        }

        let Some(child) = ElementRef::wrap(child) else {
            continue;
        };

        let name = child.value().name();
        if SKIPPED_ELEMENTS.contains(&name) {
            continue;
        }
        if name == "br" {
            lines.push(String::new());
            continue;
        }

        let block = BLOCK_ELEMENTS.contains(&name);
        if block {
            lines.push(String::new());
        }
        collect_text(child, lines);
        if block {
            lines.push(String::new());
        }
    }
}
