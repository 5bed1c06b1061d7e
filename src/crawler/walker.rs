//! Feed walker - reads one tag's feed by repeated read-and-scroll passes
//!
//! A walk navigates to the tag's search feed, then alternates between reading
//! every visible item and scrolling to the bottom. It ends when a post older
//! than the cutoff shows up, when enough records are collected, when several
//! passes in a row add nothing, or when the scroll budget is spent.

use crate::browser::{BrowseError, BrowsingSession, LoadState};
use crate::clock::Clock;
use crate::config::{Config, SourceConfig, TimingConfig};
use crate::crawler::extractor::{Extraction, RecordExtractor};
use crate::crawler::RawRecord;
use crate::state::{StopReason, WalkPhase};
use crate::PulseError;
use chrono::{DateTime, Utc};
use std::collections::HashSet;

/// Termination limits for a single walk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkLimits {
    pub max_scroll_attempts: u32,
    pub stall_limit: u32,
    pub fingerprint_length: usize,
}

impl WalkLimits {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_scroll_attempts: config.crawler.max_scroll_attempts,
            stall_limit: config.crawler.stall_limit,
            fingerprint_length: config.crawler.fingerprint_length,
        }
    }
}

impl Default for WalkLimits {
    fn default() -> Self {
        Self {
            max_scroll_attempts: 50,
            stall_limit: 3,
            fingerprint_length: 100,
        }
    }
}

/// Counters collected during a walk
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalkStats {
    /// Read passes over the visible items
    pub passes: u32,
    pub scroll_attempts: u32,
    /// Items whose fingerprint was already collected in this walk
    pub duplicates: usize,
    /// Items without body text
    pub empty_items: usize,
    pub extraction_failures: usize,
}

/// Result of walking one tag
#[derive(Debug, Clone)]
pub struct WalkOutcome {
    pub tag: String,
    /// Records in collection order
    pub records: Vec<RawRecord>,
    pub stop_reason: StopReason,
    pub stats: WalkStats,
}

enum PassEnd {
    /// Every visible item was read
    Exhausted,
    Cutoff,
    MaxReached,
}

/// Mutable state of one walk in progress
struct WalkRun {
    tag: String,
    phase: WalkPhase,
    records: Vec<RawRecord>,
    seen: HashSet<String>,
    stall_count: u32,
    stats: WalkStats,
}

impl WalkRun {
    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            phase: WalkPhase::Loading,
            records: Vec::new(),
            seen: HashSet::new(),
            stall_count: 0,
            stats: WalkStats::default(),
        }
    }

    fn advance(&mut self, next: WalkPhase) {
        debug_assert!(
            self.phase.can_transition_to(next),
            "illegal walk transition {} -> {}",
            self.phase,
            next
        );
        tracing::trace!("Walk '{}': {} -> {}", self.tag, self.phase, next);
        self.phase = next;
    }

    fn finish(mut self, reason: StopReason) -> WalkOutcome {
        self.advance(WalkPhase::Done);
        tracing::info!(
            "Walk '{}' done: {} records, stop={}, passes={}, scrolls={}, duplicates={}, failures={}",
            self.tag,
            self.records.len(),
            reason,
            self.stats.passes,
            self.stats.scroll_attempts,
            self.stats.duplicates,
            self.stats.extraction_failures
        );
        WalkOutcome {
            tag: self.tag,
            records: self.records,
            stop_reason: reason,
            stats: self.stats,
        }
    }
}

/// Walks a single tag's feed within an already open session
#[derive(Debug, Clone)]
pub struct FeedWalker {
    extractor: RecordExtractor,
    source: SourceConfig,
    timing: TimingConfig,
    limits: WalkLimits,
}

impl FeedWalker {
    pub fn new(
        extractor: RecordExtractor,
        source: SourceConfig,
        timing: TimingConfig,
        limits: WalkLimits,
    ) -> Self {
        Self {
            extractor,
            source,
            timing,
            limits,
        }
    }

    /// Creates a walker with the default selectors and the configured limits
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            RecordExtractor::new(config.source.origin.clone()),
            config.source.clone(),
            config.timing.clone(),
            WalkLimits::from_config(config),
        )
    }

    pub fn limits(&self) -> WalkLimits {
        self.limits
    }

    pub fn timing(&self) -> &TimingConfig {
        &self.timing
    }

    /// Walks the feed for `tag`
    ///
    /// # Arguments
    ///
    /// * `session` - Open browsing session, reused across tags
    /// * `clock` - Source of pauses between scrolls
    /// * `tag` - Tag to search for, without the leading `#`
    /// * `max_records` - Stop once this many records are collected
    /// * `cutoff` - Stop at the first record posted before this instant
    ///
    /// # Returns
    ///
    /// * `Ok(WalkOutcome)` - The walk ended for one of the [`StopReason`]s
    /// * `Err(PulseError)` - The session failed and cannot be used further
    pub async fn walk<S, C>(
        &self,
        session: &mut S,
        clock: &C,
        tag: &str,
        max_records: usize,
        cutoff: Option<DateTime<Utc>>,
    ) -> Result<WalkOutcome, PulseError>
    where
        S: BrowsingSession,
        C: Clock + ?Sized,
    {
        let mut run = WalkRun::new(tag);
        if max_records == 0 {
            return Ok(WalkOutcome {
                tag: run.tag,
                records: Vec::new(),
                stop_reason: StopReason::MaxReached,
                stats: run.stats,
            });
        }

        self.load(session, clock, tag).await?;
        run.advance(WalkPhase::Scrolling);

        loop {
            let before = run.records.len();
            match self.read_pass(session, &mut run, max_records, cutoff).await? {
                PassEnd::Cutoff => return Ok(run.finish(StopReason::Cutoff)),
                PassEnd::MaxReached => return Ok(run.finish(StopReason::MaxReached)),
                PassEnd::Exhausted => {}
            }

            if run.records.len() > before {
                run.stall_count = 0;
                run.advance(WalkPhase::Scrolling);
            } else {
                run.stall_count += 1;
                tracing::debug!(
                    "Walk '{}': no new records ({}/{})",
                    tag,
                    run.stall_count,
                    self.limits.stall_limit
                );
                if run.stall_count >= self.limits.stall_limit {
                    return Ok(run.finish(StopReason::Stalled));
                }
                run.advance(WalkPhase::Stalled);
            }

            self.scroll(session, tag).await?;
            run.stats.scroll_attempts += 1;
            let (min, max) = self.timing.scroll_jitter();
            clock.sleep_between(min, max).await;

            if run.stats.scroll_attempts >= self.limits.max_scroll_attempts {
                return Ok(run.finish(StopReason::AttemptCap));
            }
        }
    }

    /// Opens the feed and waits for the first rendering
    ///
    /// Timeouts and navigation failures are tolerated: the walk goes on with
    /// whatever partial view loaded.
    async fn load<S, C>(&self, session: &mut S, clock: &C, tag: &str) -> Result<(), PulseError>
    where
        S: BrowsingSession,
        C: Clock + ?Sized,
    {
        let url = self.source.feed_url(tag);
        tracing::info!("Loading feed for '{}': {}", tag, url);

        if let Err(e) = session
            .navigate(&url, self.timing.navigation_timeout())
            .await
        {
            tolerate(e, tag, "navigation")?;
        }

        if let Err(e) = session
            .wait_for_state(LoadState::DomContentLoaded, self.timing.load_wait_timeout())
            .await
        {
            tolerate(e, tag, "load wait")?;
        }

        let settle = self.timing.settle_delay();
        clock.sleep_between(settle, settle).await;
        Ok(())
    }

    async fn read_pass<S: BrowsingSession>(
        &self,
        session: &mut S,
        run: &mut WalkRun,
        max_records: usize,
        cutoff: Option<DateTime<Utc>>,
    ) -> Result<PassEnd, PulseError> {
        run.stats.passes += 1;

        let items = match session.query_all(&self.extractor.selectors().item).await {
            Ok(items) => items,
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => {
                tracing::warn!("Walk '{}': could not list items: {}", run.tag, e);
                Vec::new()
            }
        };
        tracing::debug!(
            "Walk '{}' pass {}: {} visible items",
            run.tag,
            run.stats.passes,
            items.len()
        );

        for item in &items {
            let record = match self.extractor.extract(item) {
                Extraction::Record(record) => record,
                Extraction::Empty => {
                    run.stats.empty_items += 1;
                    continue;
                }
                Extraction::Failed(e) => {
                    tracing::debug!("Walk '{}': skipping unreadable item: {}", run.tag, e);
                    run.stats.extraction_failures += 1;
                    continue;
                }
            };

            let fingerprint = record.fingerprint(self.limits.fingerprint_length);
            if run.seen.contains(&fingerprint) {
                run.stats.duplicates += 1;
                continue;
            }

            if let (Some(cutoff), Some(posted_at)) = (cutoff, record.posted_at_utc()) {
                if posted_at < cutoff {
                    tracing::debug!(
                        "Walk '{}': reached post from {} older than cutoff {}",
                        run.tag,
                        posted_at,
                        cutoff
                    );
                    return Ok(PassEnd::Cutoff);
                }
            }

            run.seen.insert(fingerprint);
            run.records.push(record);
            if run.records.len() >= max_records {
                return Ok(PassEnd::MaxReached);
            }
        }

        Ok(PassEnd::Exhausted)
    }

    async fn scroll<S: BrowsingSession>(&self, session: &mut S, tag: &str) -> Result<(), PulseError> {
        match session.scroll_to_bottom().await {
            Ok(()) => Ok(()),
            Err(e) => tolerate(e, tag, "scroll"),
        }
    }
}

/// Swallows recoverable browse errors with a warning; fatal ones propagate
fn tolerate(err: BrowseError, tag: &str, step: &str) -> Result<(), PulseError> {
    if err.is_fatal() {
        return Err(err.into());
    }
    tracing::warn!("Walk '{}': {} failed, continuing: {}", tag, step, err);
    Ok(())
}
