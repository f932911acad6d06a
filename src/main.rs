//! Blog-Archiver main entry point
//!
//! This is the command-line interface for the Blog-Archiver.

use anyhow::Context;
use blog_archiver::config::{load_config_with_hash, validate, Config};
use blog_archiver::crawler::Coordinator;
use blog_archiver::output::{export_corpus, load_statistics, print_statistics};
use blog_archiver::storage::open_archive;
use blog_archiver::RunOutcome;
use clap::Parser;
use std::path::{Path, PathBuf};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

/// Blog-Archiver: a resumable, polite blog archiver
///
/// Discovers every post from a sitemap index, fetches each one at a fixed
/// pace and stores it as JSON under <output>/<year>/<month>/. Interrupt at
/// any time with Ctrl-C and run again to resume.
#[derive(Parser, Debug)]
#[command(name = "blog-archiver")]
#[command(version = "1.0.0")]
#[command(about = "A resumable sitemap-driven blog archiver", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (every key has a default)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Sitemap index URL
    #[arg(long, value_name = "URL")]
    sitemap_url: Option<String>,

    /// Archive output directory
    #[arg(short, long, value_name = "DIR")]
    output_dir: Option<String>,

    /// Seconds between requests
    #[arg(long, value_name = "SECS")]
    delay: Option<f64>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Posts between checkpoint saves
    #[arg(long, value_name = "N")]
    flush_interval: Option<u32>,

    /// Retries for transient fetch failures
    #[arg(long, value_name = "N")]
    max_retries: Option<u32>,

    /// Also crawl posts that failed in earlier runs
    #[arg(long)]
    retry_failed: bool,

    /// Reset every failed post to pending before crawling
    #[arg(long)]
    reset_failed: bool,

    /// Stop after processing N posts in this run
    #[arg(long, value_name = "N")]
    limit: Option<u32>,

    /// Start over, ignoring the existing checkpoint
    #[arg(long)]
    fresh: bool,

    /// Validate and print the effective configuration without crawling
    #[arg(long, conflicts_with_all = ["stats", "export_corpus"])]
    dry_run: bool,

    /// Show statistics from the checkpoint and exit
    #[arg(long, conflicts_with_all = ["dry_run", "export_corpus"])]
    stats: bool,

    /// Write a plain-text corpus of all archived posts to FILE and exit
    #[arg(long, value_name = "FILE", conflicts_with_all = ["dry_run", "stats"])]
    export_corpus: Option<PathBuf>,
}

impl Cli {
    /// Applies command-line overrides on top of the file configuration
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(url) = &self.sitemap_url {
            config.crawler.sitemap_index_url = url.clone();
        }
        if let Some(dir) = &self.output_dir {
            config.output.directory = dir.clone();
        }
        if let Some(delay) = self.delay {
            config.crawler.request_delay = delay;
        }
        if let Some(timeout) = self.timeout {
            config.crawler.timeout = timeout;
        }
        if let Some(n) = self.flush_interval {
            config.crawler.flush_interval = n;
        }
        if let Some(n) = self.max_retries {
            config.crawler.max_retries = n;
        }
        if self.retry_failed {
            config.crawler.retry_failed = true;
        }
        if let Some(limit) = self.limit {
            config.crawler.max_posts = Some(limit);
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("Failed to load configuration {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            config
        }
        None => Config::default(),
    };
    cli.apply_overrides(&mut config);
    validate(&config).context("Invalid configuration")?;

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config);
    } else if let Some(path) = &cli.export_corpus {
        handle_export_corpus(&config, path)?;
    } else {
        handle_crawl(config, cli.fresh, cli.reset_failed).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("blog_archiver=info,warn"),
            1 => EnvFilter::new("blog_archiver=debug,info"),
            2 => EnvFilter::new("blog_archiver=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: prints the effective configuration
fn handle_dry_run(config: &Config) {
    println!("=== Blog-Archiver Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Sitemap index: {}", config.crawler.sitemap_index_url);
    println!("  Sitemap filter: {:?}", config.crawler.sitemap_filter);
    println!("  Request delay: {}s", config.crawler.request_delay);
    println!("  Timeout: {}s", config.crawler.timeout);
    println!("  Max retries: {}", config.crawler.max_retries);
    println!("  Retry backoff: {}ms", config.crawler.retry_backoff_ms);
    println!("  Flush interval: {} posts", config.crawler.flush_interval);
    println!("  Retry failed: {}", config.crawler.retry_failed);
    match config.crawler.max_posts {
        Some(n) => println!("  Max posts per run: {}", n),
        None => println!("  Max posts per run: unlimited"),
    }

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.header_value());

    println!("\nOutput:");
    println!("  Directory: {}", config.output.directory);

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows statistics from the checkpoint
fn handle_stats(config: &Config) {
    let (store, _) = open_archive(Path::new(&config.output.directory));
    println!("Checkpoint: {}\n", store.path().display());

    let state = store.peek();
    print_statistics(&load_statistics(&state));
}

/// Handles the --export-corpus mode
fn handle_export_corpus(config: &Config, output: &Path) -> anyhow::Result<()> {
    println!("=== Exporting Corpus ===\n");
    println!("Archive: {}", config.output.directory);
    println!("Output: {}", output.display());
    println!();

    let (_, archive) = open_archive(Path::new(&config.output.directory));
    let count = export_corpus(&archive, output).context("Corpus export failed")?;

    println!("✓ Exported {} posts to: {}", count, output.display());
    Ok(())
}

/// Handles the main archive run
async fn handle_crawl(config: Config, fresh: bool, reset_failed: bool) -> anyhow::Result<()> {
    if fresh {
        tracing::info!("Starting fresh archive run (ignoring previous checkpoint)");
    } else {
        tracing::info!("Starting archive run (will resume from checkpoint)");
    }
    tracing::info!(
        "Archiving {} into {}",
        config.crawler.sitemap_index_url,
        config.output.directory
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received Ctrl-C, finishing up");
            let _ = shutdown_tx.send(true);
        }
    });

    let mut coordinator = Coordinator::new(config)?
        .with_shutdown(shutdown_rx)
        .fresh(fresh)
        .reset_failed(reset_failed);

    let outcome = match coordinator.run().await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!("Archive run failed: {}", e);
            return Err(e.into());
        }
    };

    let report = outcome.report();
    match &outcome {
        RunOutcome::Completed(_) => tracing::info!("Archive run completed"),
        RunOutcome::Interrupted(_) => tracing::info!("Archive run interrupted"),
    }
    tracing::info!(
        "Discovered {} posts ({} new), processed {}: {} succeeded, {} failed, {} remaining",
        report.discovered,
        report.added,
        report.processed,
        report.succeeded,
        report.failed,
        report.remaining
    );
    if report.skipped_sitemaps > 0 {
        tracing::warn!("{} child sitemaps were skipped", report.skipped_sitemaps);
    }

    Ok(())
}
