//! Crawler module for archiving posts
//!
//! This module contains the core archiving pipeline, including:
//! - HTTP fetching with rate limiting and retry logic
//! - Sitemap discovery of post URLs
//! - Post field extraction from HTML
//! - Overall run coordination and resume

mod coordinator;
mod extractor;
mod fetcher;
mod rate_limit;
mod sitemap;

pub use coordinator::{run_crawl, Coordinator, Phase, RunOutcome, RunReport};
pub use extractor::{html_to_text, ParsedFields, PostExtractor, PostParser, WordPressParser};
pub use fetcher::{build_http_client, Backoff, FetchSettings, Fetched, Fetcher};
pub use rate_limit::RateLimiter;
pub use self::sitemap::{discover, parse_sitemap_index, parse_url_set, Discovery, SkippedSitemap};
