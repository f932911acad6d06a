//! Integration tests for the archiver
//!
//! These tests use wiremock to serve a small blog (sitemap index, one child
//! sitemap, post pages) and run the full archive cycle end-to-end against a
//! temporary output directory.

use blog_archiver::config::Config;
use blog_archiver::crawler::Coordinator;
use blog_archiver::state::PostStatus;
use blog_archiver::storage::{ArchiveWriter, CheckpointStore};
use blog_archiver::{ArchiveError, RunOutcome};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration pointing at the mock server
fn create_test_config(base_url: &str, output: &Path) -> Config {
    let mut config = Config::default();
    config.crawler.sitemap_index_url = format!("{}/sitemap_index.xml", base_url);
    config.crawler.request_delay = 0.0; // No pacing in tests
    config.crawler.timeout = 5;
    config.crawler.max_retries = 1;
    config.crawler.retry_backoff_ms = 1;
    config.crawler.flush_interval = 2;
    config.user_agent.crawler_name = "TestArchiver".to_string();
    config.output.directory = output.display().to_string();
    config
}

fn post_path(n: usize) -> String {
    format!("/2025/01/{:02}/post-{}/", n, n)
}

fn post_html(n: usize) -> String {
    format!(
        r#"<html><head><title>Post {n} | Blog</title></head><body>
        <article>
          <h1 class="entry-title">Post {n}</h1>
          <time class="entry-date" datetime="2025-01-{n:02}T09:00:00+00:00">January {n}, 2025</time>
          <span class="author">VD</span>
          <div class="entry-content"><p>Body of post {n}.</p></div>
          <span class="tags-links"><a href="/tag/t{n}">t{n}</a></span>
          <span class="cat-links"><a href="/category/blog">Blog</a></span>
        </article>
        </body></html>"#
    )
}

/// Mounts the sitemap index and a child sitemap listing posts 1..=count
async fn mount_sitemaps(server: &MockServer, count: usize) {
    let base_url = server.uri();

    let index = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
        <sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
          <sitemap><loc>{}/post-sitemap.xml</loc></sitemap>
          <sitemap><loc>{}/page-sitemap.xml</loc></sitemap>
        </sitemapindex>"#,
        base_url, base_url
    );
    let urls: String = (1..=count)
        .map(|n| {
            format!(
                "<url><loc>{}{}</loc><lastmod>2025-01-{:02}T10:00:00+00:00</lastmod></url>",
                base_url,
                post_path(n),
                n
            )
        })
        .collect();
    let child = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
        <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">{}</urlset>"#,
        urls
    );

    Mock::given(method("GET"))
        .and(path("/sitemap_index.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(index))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/post-sitemap.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(child))
        .mount(server)
        .await;
}

async fn mount_post(server: &MockServer, n: usize) {
    Mock::given(method("GET"))
        .and(path(post_path(n)))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(post_html(n))
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

/// Serves a blog with `count` well-formed posts
async fn mount_blog(server: &MockServer, count: usize) {
    mount_sitemaps(server, count).await;
    for n in 1..=count {
        mount_post(server, n).await;
    }
}

/// Number of post page requests the server has received
async fn post_fetches(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path().starts_with("/2025/"))
        .count()
}

async fn fetches_of(server: &MockServer, at: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == at)
        .count()
}

/// Contents of every post file and the index, keyed by path
fn snapshot(output: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    let archive = ArchiveWriter::new(output);
    let mut files: BTreeMap<PathBuf, Vec<u8>> = archive
        .post_files()
        .unwrap()
        .into_iter()
        .map(|p| {
            let bytes = std::fs::read(&p).unwrap();
            (p, bytes)
        })
        .collect();
    let index = archive.index_path();
    files.insert(index.clone(), std::fs::read(index).unwrap());
    files
}

async fn run(config: Config) -> RunOutcome {
    Coordinator::new(config)
        .expect("Failed to create coordinator")
        .run()
        .await
        .expect("Archive run failed")
}

#[tokio::test]
async fn test_full_run_then_rerun_is_idempotent() {
    let mock_server = MockServer::start().await;
    mount_blog(&mock_server, 4).await;
    let dir = tempfile::tempdir().unwrap();

    let outcome = run(create_test_config(&mock_server.uri(), dir.path())).await;

    assert!(matches!(outcome, RunOutcome::Completed(_)));
    let report = outcome.report();
    assert_eq!(report.discovered, 4);
    assert_eq!(report.added, 4);
    assert_eq!(report.succeeded, 4);
    assert_eq!(report.remaining, 0);
    assert_eq!(post_fetches(&mock_server).await, 4);
    // The page sitemap is filtered out
    assert_eq!(fetches_of(&mock_server, "/page-sitemap.xml").await, 0);

    let post = ArchiveWriter::new(dir.path())
        .read_post("2025/01/post-3.json")
        .unwrap();
    assert_eq!(post.title, "Post 3");
    assert_eq!(post.date_from_url, "2025-01-03");
    assert_eq!(post.date_iso.as_deref(), Some("2025-01-03T09:00:00+00:00"));
    assert_eq!(post.content_text, "Body of post 3.");
    assert_eq!(post.tags, vec!["t3"]);
    assert_eq!(post.sitemap_lastmod.as_deref(), Some("2025-01-03T10:00:00+00:00"));

    let before = snapshot(dir.path());
    assert_eq!(before.len(), 5);

    // Second run: nothing new, nothing fetched, nothing changed
    let outcome = run(create_test_config(&mock_server.uri(), dir.path())).await;

    assert!(matches!(outcome, RunOutcome::Completed(_)));
    assert_eq!(outcome.report().added, 0);
    assert_eq!(outcome.report().processed, 0);
    assert_eq!(outcome.report().counters.attempted, 4);
    assert_eq!(post_fetches(&mock_server).await, 4);
    assert_eq!(snapshot(dir.path()), before);
}

#[tokio::test]
async fn test_resume_after_post_limit() {
    let mock_server = MockServer::start().await;
    mount_blog(&mock_server, 5).await;
    let dir = tempfile::tempdir().unwrap();

    let mut config = create_test_config(&mock_server.uri(), dir.path());
    config.crawler.max_posts = Some(2);
    let outcome = run(config).await;

    assert!(outcome.is_interrupted());
    assert_eq!(outcome.report().processed, 2);
    assert_eq!(outcome.report().remaining, 3);
    assert_eq!(post_fetches(&mock_server).await, 2);

    // The interrupted run leaves a consistent index
    let index = ArchiveWriter::new(dir.path()).read_index().unwrap();
    assert_eq!(index.total_posts, 2);

    let outcome = run(create_test_config(&mock_server.uri(), dir.path())).await;

    assert!(!outcome.is_interrupted());
    assert_eq!(outcome.report().processed, 3);
    assert_eq!(outcome.report().counters.succeeded, 5);
    assert_eq!(post_fetches(&mock_server).await, 5);
    for n in 1..=5 {
        assert_eq!(fetches_of(&mock_server, &post_path(n)).await, 1);
    }

    let index = ArchiveWriter::new(dir.path()).read_index().unwrap();
    assert_eq!(index.total_posts, 5);
    // Newest first
    assert!(index.posts[0].url.ends_with(&post_path(5)));
    assert!(index.posts[4].url.ends_with(&post_path(1)));
}

#[tokio::test]
async fn test_index_consistency_with_failed_extraction() {
    let mock_server = MockServer::start().await;
    mount_sitemaps(&mock_server, 5).await;
    for n in [1, 2, 4, 5] {
        mount_post(&mock_server, n).await;
    }
    // Post 3 has no content container
    Mock::given(method("GET"))
        .and(path(post_path(3)))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<html><body><h1>Post 3</h1><p>teaser</p></body></html>"),
        )
        .mount(&mock_server)
        .await;
    let dir = tempfile::tempdir().unwrap();

    let outcome = run(create_test_config(&mock_server.uri(), dir.path())).await;

    let report = outcome.report();
    assert_eq!(report.succeeded, 4);
    assert_eq!(report.failed, 1);
    assert_eq!(report.counters.attempted, 5);

    let index = ArchiveWriter::new(dir.path()).read_index().unwrap();
    assert_eq!(index.total_posts, 4);
    assert!(index.posts.iter().all(|e| !e.url.ends_with(&post_path(3))));
    for entry in &index.posts {
        assert!(dir.path().join(&entry.path).exists());
    }

    let state = CheckpointStore::in_dir(dir.path()).load();
    let failed_url = format!("{}{}", mock_server.uri(), post_path(3));
    assert_eq!(state.status_of(&failed_url), Some(PostStatus::Failed));
    assert!(state
        .get(&failed_url)
        .unwrap()
        .last_error
        .as_deref()
        .unwrap()
        .contains("content"));

    // Failed posts are left alone unless retrying is requested
    run(create_test_config(&mock_server.uri(), dir.path())).await;
    assert_eq!(post_fetches(&mock_server).await, 5);

    let mut config = create_test_config(&mock_server.uri(), dir.path());
    config.crawler.retry_failed = true;
    let outcome = run(config).await;

    assert_eq!(outcome.report().processed, 1);
    assert_eq!(outcome.report().counters.failed, 2);
    assert_eq!(fetches_of(&mock_server, &post_path(3)).await, 2);
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let mock_server = MockServer::start().await;
    mount_sitemaps(&mock_server, 2).await;
    mount_post(&mock_server, 1).await;
    Mock::given(method("GET"))
        .and(path(post_path(2)))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;
    let dir = tempfile::tempdir().unwrap();

    let outcome = run(create_test_config(&mock_server.uri(), dir.path())).await;

    assert_eq!(outcome.report().succeeded, 1);
    assert_eq!(outcome.report().failed, 1);
    assert_eq!(fetches_of(&mock_server, &post_path(2)).await, 1);

    let state = CheckpointStore::in_dir(dir.path()).load();
    let url = format!("{}{}", mock_server.uri(), post_path(2));
    assert!(state
        .get(&url)
        .unwrap()
        .last_error
        .as_deref()
        .unwrap()
        .contains("404"));
}

#[tokio::test]
async fn test_reset_failed_recovers_post() {
    let mock_server = MockServer::start().await;
    mount_sitemaps(&mock_server, 1).await;
    // First request fails, later ones succeed
    Mock::given(method("GET"))
        .and(path(post_path(1)))
        .respond_with(ResponseTemplate::new(404))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    mount_post(&mock_server, 1).await;
    let dir = tempfile::tempdir().unwrap();

    let outcome = run(create_test_config(&mock_server.uri(), dir.path())).await;
    assert_eq!(outcome.report().failed, 1);

    let outcome = Coordinator::new(create_test_config(&mock_server.uri(), dir.path()))
        .unwrap()
        .reset_failed(true)
        .run()
        .await
        .unwrap();

    assert_eq!(outcome.report().succeeded, 1);
    assert_eq!(outcome.report().remaining, 0);
    let index = ArchiveWriter::new(dir.path()).read_index().unwrap();
    assert_eq!(index.total_posts, 1);
}

#[tokio::test]
async fn test_unreachable_index_is_fatal() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sitemap_index.xml"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;
    let dir = tempfile::tempdir().unwrap();

    let result = Coordinator::new(create_test_config(&mock_server.uri(), dir.path()))
        .unwrap()
        .run()
        .await;

    assert!(matches!(result, Err(ArchiveError::Discovery(_))));
    assert!(!dir.path().join("index.json").exists());
    assert_eq!(post_fetches(&mock_server).await, 0);
}

#[tokio::test]
async fn test_corrupt_checkpoint_starts_over() {
    let mock_server = MockServer::start().await;
    mount_blog(&mock_server, 2).await;
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("progress.json"), b"{\"version\": 1, \"urls\": [").unwrap();

    let outcome = run(create_test_config(&mock_server.uri(), dir.path())).await;

    assert_eq!(outcome.report().succeeded, 2);
    assert!(dir.path().join("progress.json.corrupt").exists());
    assert_eq!(
        CheckpointStore::in_dir(dir.path()).load().count(PostStatus::Done),
        2
    );
}

#[tokio::test]
async fn test_fresh_run_refetches_everything() {
    let mock_server = MockServer::start().await;
    mount_blog(&mock_server, 3).await;
    let dir = tempfile::tempdir().unwrap();

    run(create_test_config(&mock_server.uri(), dir.path())).await;
    let before = snapshot(dir.path());

    let outcome = Coordinator::new(create_test_config(&mock_server.uri(), dir.path()))
        .unwrap()
        .fresh(true)
        .run()
        .await
        .unwrap();

    assert_eq!(outcome.report().processed, 3);
    assert_eq!(outcome.report().counters.attempted, 3);
    assert_eq!(post_fetches(&mock_server).await, 6);
    // Same URLs land in the same files
    assert_eq!(
        snapshot(dir.path()).keys().collect::<Vec<_>>(),
        before.keys().collect::<Vec<_>>()
    );
}

/// Serves post `n` once after `delay`, then promptly
async fn mount_slow_post(server: &MockServer, n: usize, delay: Duration) {
    Mock::given(method("GET"))
        .and(path(post_path(n)))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(post_html(n))
                .set_delay(delay),
        )
        .up_to_n_times(1)
        .mount(server)
        .await;
    mount_post(server, n).await;
}

#[tokio::test]
async fn test_shutdown_abandons_in_flight_post() {
    let mock_server = MockServer::start().await;
    mount_sitemaps(&mock_server, 3).await;
    mount_post(&mock_server, 1).await;
    mount_slow_post(&mock_server, 2, Duration::from_secs(4)).await;
    mount_post(&mock_server, 3).await;
    let dir = tempfile::tempdir().unwrap();

    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(800)).await;
        let _ = tx.send(true);
    });

    let started = Instant::now();
    let outcome = Coordinator::new(create_test_config(&mock_server.uri(), dir.path()))
        .unwrap()
        .with_shutdown(rx)
        .run()
        .await
        .unwrap();

    assert!(outcome.is_interrupted());
    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(outcome.report().processed, 1);
    assert_eq!(fetches_of(&mock_server, &post_path(2)).await, 1);
    assert!(!dir.path().join("2025/01/post-2.json").exists());

    let state = CheckpointStore::in_dir(dir.path()).peek();
    let slow_url = format!("{}{}", mock_server.uri(), post_path(2));
    assert_eq!(state.status_of(&slow_url), Some(PostStatus::Pending));
    assert_eq!(state.get(&slow_url).unwrap().attempts, 0);
    assert_eq!(state.counters.attempted, 1);
    assert_eq!(state.count(PostStatus::Done), 1);

    // Resuming fetches the abandoned post once more and nothing else twice
    let outcome = run(create_test_config(&mock_server.uri(), dir.path())).await;

    assert!(!outcome.is_interrupted());
    assert_eq!(outcome.report().processed, 2);
    assert_eq!(fetches_of(&mock_server, &post_path(1)).await, 1);
    assert_eq!(fetches_of(&mock_server, &post_path(2)).await, 2);
    assert_eq!(fetches_of(&mock_server, &post_path(3)).await, 1);
    assert!(dir.path().join("2025/01/post-2.json").exists());
    assert_eq!(outcome.report().counters.attempted, 3);
}

#[tokio::test]
async fn test_checkpoint_flushed_between_posts() {
    let mock_server = MockServer::start().await;
    mount_sitemaps(&mock_server, 5).await;
    for n in [1, 2, 4, 5] {
        mount_post(&mock_server, n).await;
    }
    mount_slow_post(&mock_server, 3, Duration::from_secs(4)).await;
    let dir = tempfile::tempdir().unwrap();

    // Read the checkpoint while post 3 is still in flight
    let store = CheckpointStore::in_dir(dir.path());
    let (tx, rx) = watch::channel(false);
    let observer = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(800)).await;
        let mid_run = store.peek();
        let _ = tx.send(true);
        mid_run
    });

    let config = create_test_config(&mock_server.uri(), dir.path());
    assert_eq!(config.crawler.flush_interval, 2);
    Coordinator::new(config)
        .unwrap()
        .with_shutdown(rx)
        .run()
        .await
        .unwrap();

    let mid_run = observer.await.unwrap();
    assert_eq!(mid_run.counters.attempted, 2);
    assert_eq!(mid_run.counters.succeeded, 2);
    assert_eq!(mid_run.count(PostStatus::Done), 2);
    assert_eq!(mid_run.count(PostStatus::Pending), 3);
}

#[tokio::test]
async fn test_post_limit_saves_unflushed_attempts() {
    let mock_server = MockServer::start().await;
    mount_blog(&mock_server, 5).await;
    let dir = tempfile::tempdir().unwrap();

    // Three attempts with a flush every two: the last one is only saved on stop
    let mut config = create_test_config(&mock_server.uri(), dir.path());
    config.crawler.max_posts = Some(3);
    let outcome = run(config).await;

    assert!(outcome.is_interrupted());
    let state = CheckpointStore::in_dir(dir.path()).peek();
    assert_eq!(state.counters.attempted, 3);
    assert_eq!(state.counters.succeeded, 3);
    assert_eq!(state.count(PostStatus::Done), 3);
    assert_eq!(state.count(PostStatus::Pending), 2);
    assert_eq!(
        ArchiveWriter::new(dir.path()).read_index().unwrap().total_posts,
        3
    );
}
