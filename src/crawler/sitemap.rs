//! Sitemap discovery
//!
//! Discovery fetches the sitemap index, then every child sitemap it lists,
//! and flattens them into the ordered, deduplicated list of post URLs. The
//! index is essential; a broken child sitemap only costs its own URLs.

use crate::crawler::fetcher::Fetcher;
use crate::model::PostUrl;
use crate::DiscoveryError;
use sitemap::reader::{SiteMapEntity, SiteMapReader};
use std::collections::HashSet;
use std::io::Cursor;
use xml::reader::{EventReader, XmlEvent};

const URL_PATH: [&str; 2] = ["urlset", "url"];
const LOC_PATH: [&str; 3] = ["urlset", "url", "loc"];
const LASTMOD_PATH: [&str; 3] = ["urlset", "url", "lastmod"];

/// A child sitemap that was left out of discovery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedSitemap {
    pub url: String,
    pub reason: String,
}

/// Result of a discovery pass
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    /// Distinct post URLs in first-seen order
    pub posts: Vec<PostUrl>,

    /// Number of child sitemaps selected from the index
    pub child_sitemaps: usize,

    /// Child sitemaps that could not be fetched or parsed
    pub skipped: Vec<SkippedSitemap>,

    /// Number of `<url>` entries read before deduplication
    pub raw_entries: usize,
}

/// Discovers every post URL reachable from a sitemap index
///
/// Child sitemaps are fetched sequentially through the shared fetcher, in
/// index order. Only children whose URL contains `filter` are used (an empty
/// filter keeps all of them).
///
/// # Errors
///
/// * `DiscoveryError::IndexUnreachable` - The index could not be fetched after retries
/// * `DiscoveryError::IndexMalformed` - The index is not valid sitemap XML
/// * `DiscoveryError::EmptyIndex` - No child sitemap matched the filter
pub async fn discover(
    fetcher: &mut Fetcher,
    index_url: &str,
    filter: &str,
) -> Result<Discovery, DiscoveryError> {
    tracing::info!("Fetching sitemap index {}", index_url);
    let index = fetcher
        .fetch(index_url)
        .await
        .map_err(DiscoveryError::IndexUnreachable)?;

    let children: Vec<String> = parse_sitemap_index(&index.body)
        .map_err(|message| DiscoveryError::IndexMalformed {
            url: index_url.to_string(),
            message,
        })?
        .into_iter()
        .filter(|loc| filter.is_empty() || loc.contains(filter))
        .collect();

    if children.is_empty() {
        return Err(DiscoveryError::EmptyIndex {
            url: index_url.to_string(),
            filter: filter.to_string(),
        });
    }

    tracing::info!("Found {} child sitemaps", children.len());

    let mut discovery = Discovery {
        child_sitemaps: children.len(),
        ..Discovery::default()
    };
    let mut all_entries = Vec::new();

    for (i, child) in children.iter().enumerate() {
        tracing::info!("Fetching sitemap {}/{}: {}", i + 1, children.len(), child);

        let entries = match fetcher.fetch(child).await {
            Ok(fetched) => parse_url_set(&fetched.body),
            Err(e) => Err(e.to_string()),
        };

        match entries {
            Ok(entries) => {
                tracing::debug!("{} lists {} URLs", child, entries.len());
                all_entries.extend(entries);
            }
            Err(reason) => {
                tracing::warn!("Skipping sitemap {}: {}", child, reason);
                discovery.skipped.push(SkippedSitemap {
                    url: child.clone(),
                    reason,
                });
            }
        }
    }

    discovery.raw_entries = all_entries.len();
    discovery.posts = dedupe_by_url(all_entries);

    tracing::info!(
        "Discovered {} distinct post URLs ({} entries, {} sitemaps skipped)",
        discovery.posts.len(),
        discovery.raw_entries,
        discovery.skipped.len()
    );

    Ok(discovery)
}

/// Parses a sitemap index into its child sitemap locations, in document order
pub fn parse_sitemap_index(xml: &[u8]) -> Result<Vec<String>, String> {
    let mut locations = Vec::new();

    for entity in SiteMapReader::new(Cursor::new(xml)) {
        match entity {
            SiteMapEntity::SiteMap(entry) => {
                if let Some(url) = entry.loc.get_url() {
                    locations.push(url.to_string());
                }
            }
            SiteMapEntity::Err(error) => return Err(format!("{:?}", error)),
            _ => {}
        }
    }

    Ok(locations)
}

/// Parses a child sitemap into post URLs with their lastmod, in document order
///
/// The `<lastmod>` text is kept exactly as published (trimmed), whatever
/// date format the site uses. Entries whose `<loc>` is not an absolute URL
/// are dropped. Any XML error rejects the whole document.
pub fn parse_url_set(xml: &[u8]) -> Result<Vec<PostUrl>, String> {
    let mut posts = Vec::new();
    let mut path: Vec<String> = Vec::new();
    let mut loc = String::new();
    let mut lastmod: Option<String> = None;

    for event in EventReader::new(Cursor::new(xml)) {
        match event {
            Ok(XmlEvent::StartElement { name, .. }) => {
                path.push(name.local_name.to_lowercase());
                if path == URL_PATH {
                    loc.clear();
                    lastmod = None;
                }
            }
            Ok(XmlEvent::Characters(data)) | Ok(XmlEvent::CData(data)) => {
                if path == LOC_PATH {
                    loc.push_str(&data);
                } else if path == LASTMOD_PATH {
                    lastmod.get_or_insert_with(String::new).push_str(&data);
                }
            }
            Ok(XmlEvent::EndElement { .. }) => {
                if path == URL_PATH {
                    if let Ok(url) = ::url::Url::parse(loc.trim()) {
                        let lastmod = lastmod
                            .take()
                            .map(|text| text.trim().to_string())
                            .filter(|text| !text.is_empty());
                        posts.push(PostUrl::new(url.to_string(), lastmod));
                    }
                }
                path.pop();
            }
            Err(error) => return Err(error.to_string()),
            _ => {}
        }
    }

    Ok(posts)
}

/// Removes repeated URLs, keeping the first occurrence
pub fn dedupe_by_url(entries: Vec<PostUrl>) -> Vec<PostUrl> {
    let mut seen = HashSet::new();
    entries
        .into_iter()
        .filter(|p| seen.insert(p.url.clone()))
        .collect()
}
