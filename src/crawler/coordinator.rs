//! Crawler coordinator - main archive orchestration logic
//!
//! The coordinator drives a run through its phases:
//!
//! ```text
//! Discovering -> Crawling -> Finalizing -> Done
//!                    |
//!                    +-> Interrupted (shutdown signal or per-run post limit)
//! ```
//!
//! It owns the checkpoint state and is the only component that mutates it.
//! Per-post fetch and extraction failures are recorded and the crawl moves
//! on; storage and state errors abort the run.

use crate::config::Config;
use crate::crawler::extractor::PostExtractor;
use crate::crawler::fetcher::{FetchSettings, Fetcher};
use crate::crawler::sitemap;
use crate::model::PostUrl;
use crate::state::{AttemptOutcome, CheckpointState, Counters, PostStatus};
use crate::storage::{open_archive, ArchiveWriter, CheckpointStore};
use crate::ArchiveError;
use chrono::Utc;
use std::fmt;
use std::path::Path;
use std::time::Instant;
use tokio::sync::watch;

/// Phase of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Discovering,
    Crawling,
    Finalizing,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Discovering => "discovering",
            Self::Crawling => "crawling",
            Self::Finalizing => "finalizing",
            Self::Done => "done",
        };
        write!(f, "{}", name)
    }
}

/// Summary of a single run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Distinct post URLs found by discovery
    pub discovered: usize,
    /// URLs new to the checkpoint
    pub added: usize,
    /// Child sitemaps that were skipped
    pub skipped_sitemaps: usize,
    /// Posts attempted in this run
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// URLs still pending when the run ended
    pub remaining: usize,
    /// Cumulative counters across all runs
    pub counters: Counters,
    /// HTTP requests sent in this run, sitemaps included
    pub requests: u64,
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every queued post was attempted and the index rebuilt
    Completed(RunReport),
    /// The run stopped early; the checkpoint and index are consistent
    Interrupted(RunReport),
}

impl RunOutcome {
    pub fn report(&self) -> &RunReport {
        match self {
            Self::Completed(report) | Self::Interrupted(report) => report,
        }
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted(_))
    }
}

/// Why the crawl loop stopped before the queue was exhausted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    Shutdown,
    PostLimit(u32),
}

enum CrawlEnd {
    Exhausted,
    Stopped(StopReason),
}

/// Main archive coordinator
pub struct Coordinator {
    config: Config,
    fetcher: Fetcher,
    extractor: PostExtractor,
    store: CheckpointStore,
    writer: ArchiveWriter,
    state: CheckpointState,
    shutdown: Option<watch::Receiver<bool>>,
    fresh: bool,
    reset_failed: bool,
    phase: Phase,
    report: RunReport,
}

impl Coordinator {
    /// Creates a coordinator for the archive configured in `config`
    ///
    /// # Errors
    ///
    /// * `ArchiveError::HttpClient` - The HTTP client could not be built
    pub fn new(config: Config) -> Result<Self, ArchiveError> {
        let fetcher = Fetcher::new(&FetchSettings::from_config(&config))?;
        let (store, writer) = open_archive(Path::new(&config.output.directory));

        Ok(Self {
            config,
            fetcher,
            extractor: PostExtractor::default(),
            store,
            writer,
            state: CheckpointState::empty(),
            shutdown: None,
            fresh: false,
            reset_failed: false,
            phase: Phase::Discovering,
            report: RunReport::default(),
        })
    }

    /// Stops the crawl once the receiver observes `true`
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Replaces the default WordPress extractor
    pub fn with_extractor(mut self, extractor: PostExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    /// Ignores any existing checkpoint and starts over
    pub fn fresh(mut self, fresh: bool) -> Self {
        self.fresh = fresh;
        self
    }

    /// Puts every failed URL back to pending before crawling
    pub fn reset_failed(mut self, reset: bool) -> Self {
        self.reset_failed = reset;
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Runs the archive to completion or interruption
    ///
    /// # Returns
    ///
    /// * `Ok(RunOutcome::Completed)` - Every queued post was attempted
    /// * `Ok(RunOutcome::Interrupted)` - Stopped early, progress saved. A
    ///   shutdown during discovery leaves the checkpoint untouched
    /// * `Err(ArchiveError)` - Discovery, storage or state failure
    pub async fn run(&mut self) -> Result<RunOutcome, ArchiveError> {
        let start_time = Instant::now();
        let mut queue = Vec::new();
        self.phase = Phase::Discovering;
        self.report = RunReport::default();
        tracing::debug!("Extracting posts with the {} parser", self.extractor.parser_name());

        loop {
            tracing::debug!("Entering phase {}", self.phase);

            self.phase = match self.phase {
                Phase::Discovering => {
                    let mut shutdown = self.shutdown.clone();
                    tokio::select! {
                        biased;
                        _ = wait_for_shutdown(&mut shutdown) => {
                            tracing::info!("Shutdown requested during discovery, checkpoint left as it was");
                            return Ok(RunOutcome::Interrupted(self.build_report()));
                        }
                        discovered = self.discover() => queue = discovered?,
                    }
                    Phase::Crawling
                }
                Phase::Crawling => match self.crawl(&queue, start_time).await? {
                    CrawlEnd::Exhausted => Phase::Finalizing,
                    CrawlEnd::Stopped(reason) => {
                        self.interrupt(reason)?;
                        return Ok(RunOutcome::Interrupted(self.build_report()));
                    }
                },
                Phase::Finalizing => {
                    self.finalize()?;
                    Phase::Done
                }
                Phase::Done => {
                    let report = self.build_report();
                    tracing::info!(
                        "Archive complete: {} posts processed in {:?} ({} succeeded, {} failed)",
                        report.processed,
                        start_time.elapsed(),
                        report.succeeded,
                        report.failed
                    );
                    return Ok(RunOutcome::Completed(report));
                }
            };
        }
    }

    /// Loads the checkpoint, discovers post URLs and merges them in
    ///
    /// Returns the crawl queue in discovery order.
    async fn discover(&mut self) -> Result<Vec<PostUrl>, ArchiveError> {
        self.state = if self.fresh {
            tracing::info!("Fresh run requested, ignoring existing checkpoint");
            CheckpointState::empty()
        } else {
            self.store.load()
        };

        let index_url = self.config.crawler.sitemap_index_url.clone();
        let discovery = sitemap::discover(
            &mut self.fetcher,
            &index_url,
            &self.config.crawler.sitemap_filter,
        )
        .await?;

        if let Some(previous) = self.state.source.as_deref() {
            if previous != index_url {
                tracing::warn!(
                    "Checkpoint was built from {}, now discovering from {}",
                    previous,
                    index_url
                );
            }
        }
        self.state.source = Some(index_url);

        let merge = self.state.merge_discovered(&discovery.posts);
        tracing::info!(
            "{} new URLs added to the checkpoint, {} already known",
            merge.added,
            merge.known
        );

        if self.reset_failed {
            let reset = self.state.reset_failed();
            tracing::info!("Reset {} failed posts to pending", reset);
        }

        self.state.touch(Utc::now());
        self.store.save(&self.state)?;

        self.report.discovered = discovery.posts.len();
        self.report.added = merge.added;
        self.report.skipped_sitemaps = discovery.skipped.len();

        let queue = self.state.crawl_queue(self.config.crawler.retry_failed);
        tracing::info!(
            "{} posts queued, {} already archived",
            queue.len(),
            self.state.count(PostStatus::Done)
        );

        Ok(queue)
    }

    async fn crawl(
        &mut self,
        queue: &[PostUrl],
        start_time: Instant,
    ) -> Result<CrawlEnd, ArchiveError> {
        let mut shutdown = self.shutdown.clone();
        let flush_interval = self.config.crawler.flush_interval.max(1) as usize;
        let max_posts = self.config.crawler.max_posts;
        let mut since_flush = 0;

        for (i, post_url) in queue.iter().enumerate() {
            if let Some(limit) = max_posts {
                if self.report.processed >= limit as usize {
                    return Ok(CrawlEnd::Stopped(StopReason::PostLimit(limit)));
                }
            }
            if shutdown_requested(&shutdown) {
                return Ok(CrawlEnd::Stopped(StopReason::Shutdown));
            }

            tracing::debug!("[{}/{}] Processing {}", i + 1, queue.len(), post_url.url);

            let outcome = tokio::select! {
                outcome = self.process(post_url) => outcome?,
                _ = wait_for_shutdown(&mut shutdown) => {
                    tracing::debug!("Abandoning in-flight {}", post_url.url);
                    return Ok(CrawlEnd::Stopped(StopReason::Shutdown));
                }
            };

            self.record(post_url, outcome)?;

            since_flush += 1;
            if since_flush >= flush_interval {
                self.store.save(&self.state)?;
                since_flush = 0;

                let rate = self.report.processed as f64 / start_time.elapsed().as_secs_f64();
                tracing::info!(
                    "Progress: {}/{} posts, {} succeeded, {} failed, {:.2} posts/sec",
                    i + 1,
                    queue.len(),
                    self.report.succeeded,
                    self.report.failed,
                    rate
                );
            }
        }

        Ok(CrawlEnd::Exhausted)
    }

    /// Fetches, extracts and writes one post
    ///
    /// Fetch and extraction errors become a failed outcome; storage errors
    /// are returned.
    async fn process(&mut self, post_url: &PostUrl) -> Result<AttemptOutcome, ArchiveError> {
        let fetched = match self.fetcher.fetch(&post_url.url).await {
            Ok(fetched) => fetched,
            Err(e) => {
                tracing::warn!("Failed to fetch {}: {}", post_url.url, e);
                return Ok(AttemptOutcome::Failed(e.to_string()));
            }
        };
        if fetched.final_url != post_url.url {
            tracing::debug!("{} redirected to {}", post_url.url, fetched.final_url);
        }

        let post = match self
            .extractor
            .extract(post_url, &fetched.text(), Utc::now())
        {
            Ok(post) => post,
            Err(e) => {
                tracing::warn!("Failed to extract {}: {}", post_url.url, e);
                return Ok(AttemptOutcome::Failed(e.to_string()));
            }
        };

        let path = self.writer.write_post(&post)?;
        Ok(AttemptOutcome::Done(post.index_entry(path)))
    }

    fn record(&mut self, post_url: &PostUrl, outcome: AttemptOutcome) -> Result<(), ArchiveError> {
        match &outcome {
            AttemptOutcome::Done(_) => self.report.succeeded += 1,
            AttemptOutcome::Failed(_) => self.report.failed += 1,
        }
        self.report.processed += 1;

        let state = std::mem::take(&mut self.state);
        self.state = state.record_attempt(&post_url.url, outcome, Utc::now())?;
        Ok(())
    }

    /// Saves progress and a consistent index after an early stop
    fn interrupt(&mut self, reason: StopReason) -> Result<(), ArchiveError> {
        match reason {
            StopReason::Shutdown => tracing::info!("Shutdown requested, saving progress"),
            StopReason::PostLimit(limit) => {
                tracing::info!("Reached the limit of {} posts for this run", limit)
            }
        }

        self.save_and_index()?;
        tracing::info!(
            "Interrupted with {} posts pending. Run again to resume",
            self.state.count(PostStatus::Pending)
        );
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), ArchiveError> {
        self.save_and_index()
    }

    fn save_and_index(&mut self) -> Result<(), ArchiveError> {
        self.writer
            .rebuild_index(&self.config.crawler.sitemap_index_url, &self.state.index_entries())?;
        self.state.touch(Utc::now());
        self.store.save(&self.state)?;
        tracing::info!(
            "Checkpoint saved: {} attempted, {} succeeded, {} failed",
            self.state.counters.attempted,
            self.state.counters.succeeded,
            self.state.counters.failed
        );
        Ok(())
    }

    fn build_report(&self) -> RunReport {
        RunReport {
            remaining: self.state.count(PostStatus::Pending),
            counters: self.state.counters,
            requests: self.fetcher.requests_sent(),
            ..self.report.clone()
        }
    }
}

fn shutdown_requested(shutdown: &Option<watch::Receiver<bool>>) -> bool {
    shutdown.as_ref().is_some_and(|rx| *rx.borrow())
}

/// Resolves once shutdown is signalled; never resolves without a receiver
async fn wait_for_shutdown(shutdown: &mut Option<watch::Receiver<bool>>) {
    let Some(rx) = shutdown else {
        return std::future::pending().await;
    };

    loop {
        let stopped = *rx.borrow();
        if stopped {
            return;
        }
        if rx.changed().await.is_err() {
            // Sender gone: no signal can arrive any more
            return std::future::pending().await;
        }
    }
}

/// Runs a complete archive with the given configuration
///
/// # Example
///
/// ```no_run
/// use blog_archiver::config::Config;
/// use blog_archiver::crawler::run_crawl;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let outcome = run_crawl(Config::default()).await?;
/// println!("{} posts archived", outcome.report().succeeded);
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(config: Config) -> Result<RunOutcome, ArchiveError> {
    let mut coordinator = Coordinator::new(config)?;
    coordinator.run().await
}
