use serde::Deserialize;
use std::time::Duration;
use url::form_urlencoded;

/// Main configuration structure for Tagpulse
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub proxy: Option<ProxyConfig>,
    pub output: OutputConfig,
    #[serde(default)]
    pub signals: SignalConfig,
    #[serde(default)]
    pub fallback: FallbackConfig,
}

/// Crawl scope and walk limits
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Tags to crawl, in order
    pub tags: Vec<String>,

    /// Maximum number of records collected per tag
    #[serde(rename = "max-per-tag")]
    pub max_per_tag: usize,

    /// How far back a post may be and still count as fresh
    #[serde(rename = "lookback-hours")]
    pub lookback_hours: u32,

    /// Run the browser without a visible window
    pub headless: bool,

    /// Hard cap on scroll-to-bottom actions per tag
    #[serde(rename = "max-scroll-attempts")]
    pub max_scroll_attempts: u32,

    /// Consecutive passes without new records before a walk gives up
    #[serde(rename = "stall-limit")]
    pub stall_limit: u32,

    /// Number of leading body characters used as the in-walk fingerprint
    #[serde(rename = "fingerprint-length")]
    pub fingerprint_length: usize,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            tags: vec![
                "nifty50".to_string(),
                "sensex".to_string(),
                "intraday".to_string(),
                "banknifty".to_string(),
            ],
            max_per_tag: 500,
            lookback_hours: 24,
            headless: true,
            max_scroll_attempts: 50,
            stall_limit: 3,
            fingerprint_length: 100,
        }
    }
}

/// Timeouts and randomized delays (all milliseconds)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    #[serde(rename = "navigation-timeout-ms")]
    pub navigation_timeout_ms: u64,

    #[serde(rename = "load-wait-timeout-ms")]
    pub load_wait_timeout_ms: u64,

    /// Fixed pause after the initial load before the first pass
    #[serde(rename = "settle-delay-ms")]
    pub settle_delay_ms: u64,

    #[serde(rename = "scroll-jitter-min-ms")]
    pub scroll_jitter_min_ms: u64,

    #[serde(rename = "scroll-jitter-max-ms")]
    pub scroll_jitter_max_ms: u64,

    #[serde(rename = "tag-pacing-min-ms")]
    pub tag_pacing_min_ms: u64,

    #[serde(rename = "tag-pacing-max-ms")]
    pub tag_pacing_max_ms: u64,
}

impl TimingConfig {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    pub fn load_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.load_wait_timeout_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn scroll_jitter(&self) -> (Duration, Duration) {
        (
            Duration::from_millis(self.scroll_jitter_min_ms),
            Duration::from_millis(self.scroll_jitter_max_ms),
        )
    }

    pub fn tag_pacing(&self) -> (Duration, Duration) {
        (
            Duration::from_millis(self.tag_pacing_min_ms),
            Duration::from_millis(self.tag_pacing_max_ms),
        )
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            navigation_timeout_ms: 30_000,
            load_wait_timeout_ms: 15_000,
            settle_delay_ms: 2_000,
            scroll_jitter_min_ms: 200,
            scroll_jitter_max_ms: 500,
            tag_pacing_min_ms: 1_000,
            tag_pacing_max_ms: 2_500,
        }
    }
}

/// Which browsing backend drives the crawl
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Real headless Chromium over CDP
    Chromium,
    /// Plain HTTP GET, no JavaScript, no scrolling
    Static,
}

/// Where the feed lives and how to reach it
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub backend: Backend,

    /// Origin used for the search endpoint and for absolutizing permalinks
    pub origin: String,

    /// Search path template; `{tag}` is replaced by the tag
    #[serde(rename = "search-path")]
    pub search_path: String,

    #[serde(rename = "user-agent")]
    pub user_agent: Option<String>,
}

impl SourceConfig {
    /// Builds the feed URL for one tag, percent-encoding the tag
    pub fn feed_url(&self, tag: &str) -> String {
        let encoded: String = form_urlencoded::byte_serialize(tag.as_bytes()).collect();
        format!(
            "{}{}",
            self.origin.trim_end_matches('/'),
            self.search_path.replace("{tag}", &encoded)
        )
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Chromium,
            origin: "https://twitter.com".to_string(),
            search_path: "/search?q=%23{tag}%20lang%3Aen%20OR%20lang%3Ahi&f=live".to_string(),
            user_agent: None,
        }
    }
}

/// Network proxy for the browsing session
#[derive(Debug, Clone, Deserialize)]
pub struct ProxyConfig {
    pub server: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Path to the markdown summary file
    #[serde(rename = "summary-path")]
    pub summary_path: String,
}

/// TF-IDF scoring parameters
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    #[serde(rename = "max-features")]
    pub max_features: usize,

    #[serde(rename = "ngram-max")]
    pub ngram_max: usize,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            max_features: 5000,
            ngram_max: 2,
        }
    }
}

/// What to do when the crawl yields nothing or fails
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    pub enabled: bool,

    #[serde(rename = "mock-count")]
    pub mock_count: usize,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            mock_count: 100,
        }
    }
}
