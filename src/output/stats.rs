//! Statistics generation from the checkpoint
//!
//! This module provides functionality for extracting and displaying
//! archive statistics from the checkpoint state.

use crate::state::{CheckpointState, Counters, PostStatus};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Number of failures listed by [`print_statistics`]
pub const RECENT_FAILURES: usize = 10;

/// Archive statistics summary
#[derive(Debug, Clone)]
pub struct ArchiveStatistics {
    /// Sitemap index the checkpoint was built from
    pub source: Option<String>,

    /// Total number of URLs discovered
    pub total_urls: usize,

    /// Count of URLs by status
    pub urls_by_status: HashMap<PostStatus, usize>,

    /// Cumulative attempt counters
    pub counters: Counters,

    pub last_updated: Option<DateTime<Utc>>,

    /// Most recent failures as (url, reason), latest attempt first
    pub recent_failures: Vec<(String, String)>,
}

impl ArchiveStatistics {
    /// Count of URLs in `status`
    pub fn count(&self, status: PostStatus) -> usize {
        self.urls_by_status.get(&status).copied().unwrap_or(0)
    }
}

/// Computes statistics from a checkpoint state
pub fn load_statistics(state: &CheckpointState) -> ArchiveStatistics {
    let urls_by_status = PostStatus::all()
        .into_iter()
        .map(|status| (status, state.count(status)))
        .collect();

    let mut failures: Vec<_> = state.failures().collect();
    failures.sort_by(|a, b| b.last_attempt.cmp(&a.last_attempt));
    let recent_failures = failures
        .iter()
        .take(RECENT_FAILURES)
        .map(|r| {
            (
                r.url().to_string(),
                r.last_error.clone().unwrap_or_else(|| "unknown".to_string()),
            )
        })
        .collect();

    ArchiveStatistics {
        source: state.source.clone(),
        total_urls: state.len(),
        urls_by_status,
        counters: state.counters,
        last_updated: state.last_updated,
        recent_failures,
    }
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &ArchiveStatistics) {
    println!("=== Archive Statistics ===\n");

    println!("Overview:");
    if let Some(source) = &stats.source {
        println!("  Source: {}", source);
    }
    println!("  Total URLs discovered: {}", stats.total_urls);
    match stats.last_updated {
        Some(at) => println!("  Last updated: {}", at.to_rfc3339()),
        None => println!("  Last updated: never"),
    }
    println!();

    println!("URLs by Status:");
    for status in PostStatus::all() {
        let count = stats.count(status);
        let percentage = if stats.total_urls > 0 {
            (count as f64 / stats.total_urls as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", status, count, percentage);
    }
    println!();

    println!("Attempts (all runs):");
    println!("  Attempted: {}", stats.counters.attempted);
    println!("  Succeeded: {}", stats.counters.succeeded);
    println!("  Failed: {}", stats.counters.failed);
    println!();

    if !stats.recent_failures.is_empty() {
        println!("Recent Failures:");
        for (url, reason) in &stats.recent_failures {
            println!("  - {}: {}", url, reason);
        }
        println!();
    }

    let done = stats.count(PostStatus::Done);
    let archived_rate = if stats.total_urls > 0 {
        (done as f64 / stats.total_urls as f64) * 100.0
    } else {
        0.0
    };

    println!(
        "Archived: {:.1}% ({} / {} posts)",
        archived_rate, done, stats.total_urls
    );
}
