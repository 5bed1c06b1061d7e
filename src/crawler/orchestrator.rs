//! Tag crawler - runs one feed walk per tag over a single browsing session
//!
//! The crawler launches one session, walks each configured tag in order,
//! and always releases the session afterwards, whether the walks succeeded
//! or not. The recency cutoff is computed once, before the first tag.

use crate::browser::{BrowsingSession, LaunchOptions, SessionLauncher};
use crate::clock::Clock;
use crate::config::{Config, ProxyConfig};
use crate::crawler::walker::{FeedWalker, WalkStats};
use crate::crawler::RawRecord;
use crate::state::StopReason;
use crate::PulseError;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::time::Duration;

/// What to crawl and how
#[derive(Debug, Clone)]
pub struct CrawlRequest {
    /// Tags to walk, in order
    pub tags: Vec<String>,
    pub max_per_tag: usize,
    pub headless: bool,
    pub proxy: Option<ProxyConfig>,
    pub lookback_hours: u32,
}

impl CrawlRequest {
    pub fn from_config(config: &Config) -> Self {
        Self {
            tags: config.crawler.tags.clone(),
            max_per_tag: config.crawler.max_per_tag,
            headless: config.crawler.headless,
            proxy: config.proxy.clone(),
            lookback_hours: config.crawler.lookback_hours,
        }
    }

    pub fn lookback(&self) -> ChronoDuration {
        ChronoDuration::hours(i64::from(self.lookback_hours))
    }
}

/// Per-tag result kept alongside the records
#[derive(Debug, Clone)]
pub struct WalkSummary {
    pub tag: String,
    pub records: usize,
    pub stop_reason: StopReason,
    pub stats: WalkStats,
}

/// Everything a crawl collected
#[derive(Debug, Clone)]
pub struct CrawlReport {
    /// Records from all tags, grouped by tag in request order
    pub records: Vec<RawRecord>,
    pub walks: Vec<WalkSummary>,
    /// Posts before this instant were not collected
    pub cutoff: DateTime<Utc>,
}

impl CrawlReport {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}

/// Crawls a list of tags with one shared browsing session
pub struct TagCrawler<L, C> {
    launcher: L,
    clock: C,
    walker: FeedWalker,
    request: CrawlRequest,
    user_agent: Option<String>,
    request_timeout: Duration,
}

impl<L, C> TagCrawler<L, C>
where
    L: SessionLauncher,
    C: Clock,
{
    /// Creates a crawler for the tags and limits in `config`
    ///
    /// # Arguments
    ///
    /// * `config` - Validated configuration
    /// * `launcher` - Creates the browsing session
    /// * `clock` - Time source and pacing
    pub fn new(config: &Config, launcher: L, clock: C) -> Self {
        Self {
            launcher,
            clock,
            walker: FeedWalker::from_config(config),
            request: CrawlRequest::from_config(config),
            user_agent: config.source.user_agent.clone(),
            request_timeout: config.timing.navigation_timeout(),
        }
    }

    /// Replaces the walker, e.g. to use custom selectors
    pub fn with_walker(mut self, walker: FeedWalker) -> Self {
        self.walker = walker;
        self
    }

    pub fn request(&self) -> &CrawlRequest {
        &self.request
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Crawls the configured tags
    pub async fn collect(&self) -> Result<CrawlReport, PulseError> {
        self.collect_with(&self.request).await
    }

    /// Crawls the tags in `request`
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlReport)` - All tags were walked; the report may be empty
    /// * `Err(PulseError)` - The session could not be launched or died mid-crawl
    pub async fn collect_with(&self, request: &CrawlRequest) -> Result<CrawlReport, PulseError> {
        let cutoff = self.clock.now() - request.lookback();
        let limits = self.walker.limits();
        tracing::info!(
            "Collecting {} tag(s), up to {} records each, cutoff {}",
            request.tags.len(),
            request.max_per_tag,
            cutoff
        );
        tracing::debug!(
            "Walk limits: {} scrolls, stall after {} passes, fingerprint {} chars",
            limits.max_scroll_attempts,
            limits.stall_limit,
            limits.fingerprint_length
        );

        let options = LaunchOptions {
            headless: request.headless,
            proxy: request.proxy.clone(),
            user_agent: self.user_agent.clone(),
            request_timeout: self.request_timeout,
        };
        let mut session = self.launcher.launch(&options).await?;

        let result = self.walk_tags(&mut session, request, cutoff).await;

        if let Err(e) = session.close().await {
            tracing::warn!("Failed to close browsing session: {}", e);
        }

        match &result {
            Ok(report) => tracing::info!(
                "Collected {} records across {} tag(s)",
                report.len(),
                report.walks.len()
            ),
            Err(e) => tracing::error!("Crawl aborted: {}", e),
        }
        result
    }

    async fn walk_tags(
        &self,
        session: &mut L::Session,
        request: &CrawlRequest,
        cutoff: DateTime<Utc>,
    ) -> Result<CrawlReport, PulseError> {
        let mut report = CrawlReport {
            records: Vec::new(),
            walks: Vec::with_capacity(request.tags.len()),
            cutoff,
        };
        let (pace_min, pace_max) = self.walker.timing().tag_pacing();

        for (index, tag) in request.tags.iter().enumerate() {
            if index > 0 {
                self.clock.sleep_between(pace_min, pace_max).await;
            }

            let outcome = self
                .walker
                .walk(session, &self.clock, tag, request.max_per_tag, Some(cutoff))
                .await?;

            report.walks.push(WalkSummary {
                tag: outcome.tag,
                records: outcome.records.len(),
                stop_reason: outcome.stop_reason,
                stats: outcome.stats,
            });
            report.records.extend(outcome.records);
        }

        Ok(report)
    }
}
