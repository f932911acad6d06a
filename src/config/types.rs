use serde::Deserialize;

/// Main configuration structure for Blog-Archiver
///
/// Every section and key is optional in the TOML file; missing values fall
/// back to the defaults below, so `Config::default()` is a runnable setup.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// URL of the sitemap index listing the child sitemaps
    #[serde(rename = "sitemap-index-url")]
    pub sitemap_index_url: String,

    /// Substring a child sitemap URL must contain to be crawled (empty keeps all)
    #[serde(rename = "sitemap-filter")]
    pub sitemap_filter: String,

    /// Minimum time between the end of one request and the start of the next (seconds)
    #[serde(rename = "request-delay")]
    pub request_delay: f64,

    /// Per-request timeout (seconds)
    pub timeout: u64,

    /// Number of retries for transient fetch failures
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    /// Base delay of the exponential retry backoff (milliseconds)
    #[serde(rename = "retry-backoff-ms")]
    pub retry_backoff_ms: u64,

    /// Number of processed posts between checkpoint flushes
    #[serde(rename = "flush-interval")]
    pub flush_interval: u32,

    /// Whether previously failed posts are retried automatically
    #[serde(rename = "retry-failed")]
    pub retry_failed: bool,

    /// Maximum number of posts to process in a single run
    #[serde(rename = "max-posts")]
    pub max_posts: Option<u32>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            sitemap_index_url: "https://voxday.net/sitemap_index.xml".to_string(),
            sitemap_filter: "post-sitemap".to_string(),
            request_delay: 1.0,
            timeout: 30,
            max_retries: 3,
            retry_backoff_ms: 2000,
            flush_interval: 10,
            retry_failed: false,
            max_posts: None,
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// Free-form comment appended in parentheses
    pub comment: String,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "VoxDayArchiver".to_string(),
            crawler_version: "1.0".to_string(),
            comment: "Personal Archive Project".to_string(),
        }
    }
}

impl UserAgentConfig {
    /// Formats the User-Agent header value
    pub fn header_value(&self) -> String {
        if self.comment.is_empty() {
            format!("{}/{}", self.crawler_name, self.crawler_version)
        } else {
            format!(
                "{}/{} ({})",
                self.crawler_name, self.crawler_version, self.comment
            )
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Root directory of the archive
    pub directory: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: "./voxday_archive".to_string(),
        }
    }
}
