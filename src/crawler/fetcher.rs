//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests of the archiver, including:
//! - Building the HTTP client with the archiver's user agent and headers
//! - Pacing requests through the global rate limiter
//! - Retrying transient failures with exponential backoff
//! - Error classification

use crate::config::{Config, MAX_REQUEST_DELAY_SECS};
use crate::crawler::rate_limit::RateLimiter;
use crate::FetchError;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use reqwest::Client;
use std::time::Duration;

/// Upper bound of a single backoff delay
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Connect timeout, capped by the request timeout
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Deterministic exponential backoff: `base * 2^attempt`, capped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    max: Duration,
}

impl Backoff {
    pub const fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    /// Delay before retry number `attempt` (0-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(16));
        self.base.saturating_mul(factor).min(self.max)
    }
}

/// Settings of the fetcher, derived from the configuration
#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub user_agent: String,
    pub request_delay: Duration,
    pub timeout: Duration,
    pub max_retries: u32,
    pub backoff: Backoff,
}

impl FetchSettings {
    pub fn from_config(config: &Config) -> Self {
        let crawler = &config.crawler;
        Self {
            user_agent: config.user_agent.header_value(),
            request_delay: Duration::try_from_secs_f64(
                crawler.request_delay.min(MAX_REQUEST_DELAY_SECS),
            )
            .unwrap_or_default(),
            timeout: Duration::from_secs(crawler.timeout),
            max_retries: crawler.max_retries,
            backoff: Backoff::new(Duration::from_millis(crawler.retry_backoff_ms), MAX_BACKOFF),
        }
    }
}

/// A successful (2xx) response
#[derive(Debug, Clone)]
pub struct Fetched {
    /// HTTP status code
    pub status_code: u16,
    /// Final URL after redirects
    pub final_url: String,
    /// Raw response body
    pub body: Vec<u8>,
}

impl Fetched {
    /// Body decoded as UTF-8, replacing invalid sequences
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Rate-limited HTTP client with retries
///
/// One instance is shared by sitemap discovery and post fetching so every
/// request draws from the same rate budget.
pub struct Fetcher {
    client: Client,
    limiter: RateLimiter,
    max_retries: u32,
    backoff: Backoff,
    requests_sent: u64,
}

impl Fetcher {
    /// Builds a fetcher
    ///
    /// # Returns
    ///
    /// * `Ok(Fetcher)` - Successfully built HTTP client
    /// * `Err(reqwest::Error)` - Failed to build client
    pub fn new(settings: &FetchSettings) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(settings)?,
            limiter: RateLimiter::new(settings.request_delay),
            max_retries: settings.max_retries,
            backoff: settings.backoff,
            requests_sent: 0,
        })
    }

    /// Fetches a URL, retrying transient failures
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | 2xx | Return the body |
    /// | Timeout | Retry up to `max_retries` times with backoff |
    /// | Connection error | Retry up to `max_retries` times with backoff |
    /// | HTTP 5xx | Retry up to `max_retries` times with backoff |
    /// | HTTP 4xx | Fail immediately |
    /// | Invalid URL, redirect loop | Fail immediately |
    ///
    /// Every attempt waits for the rate limiter first.
    pub async fn fetch(&mut self, url: &str) -> Result<Fetched, FetchError> {
        let mut attempt = 0;

        loop {
            match self.fetch_once(url).await {
                Ok(fetched) => return Ok(fetched),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    let delay = self.backoff.delay(attempt);
                    attempt += 1;
                    tracing::debug!(
                        "Transient failure ({}), retry {}/{} in {:?}",
                        e,
                        attempt,
                        self.max_retries,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Number of HTTP requests sent, retries included
    pub fn requests_sent(&self) -> u64 {
        self.requests_sent
    }

    async fn fetch_once(&mut self, url: &str) -> Result<Fetched, FetchError> {
        self.limiter.wait().await;
        let result = send(&self.client, url).await;
        self.limiter.mark_finished();
        self.requests_sent += 1;
        result
    }
}

/// Builds an HTTP client with the archiver's identity and headers
pub fn build_http_client(settings: &FetchSettings) -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));

    Client::builder()
        .user_agent(settings.user_agent.as_str())
        .default_headers(headers)
        .timeout(settings.timeout)
        .connect_timeout(CONNECT_TIMEOUT.min(settings.timeout))
        .gzip(true)
        .brotli(true)
        .build()
}

async fn send(client: &Client, url: &str) -> Result<Fetched, FetchError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| classify_error(url, e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let final_url = response.url().to_string();
    let body = response.bytes().await.map_err(|e| {
        if e.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
            }
        } else {
            FetchError::Body {
                url: url.to_string(),
                message: e.to_string(),
            }
        }
    })?;

    Ok(Fetched {
        status_code: status.as_u16(),
        final_url,
        body: body.to_vec(),
    })
}

/// Maps a reqwest error onto the fetch error taxonomy
fn classify_error(url: &str, e: reqwest::Error) -> FetchError {
    let url = url.to_string();
    if e.is_timeout() {
        FetchError::Timeout { url }
    } else if e.is_builder() || e.is_redirect() {
        FetchError::Request {
            url,
            message: e.to_string(),
        }
    } else if e.is_body() || e.is_decode() {
        FetchError::Body {
            url,
            message: e.to_string(),
        }
    } else {
        // Connection refused, reset, DNS and TLS failures
        FetchError::Connect {
            url,
            message: e.to_string(),
        }
    }
}
