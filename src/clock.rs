//! Time and pacing
//!
//! Every pause the crawler takes goes through a [`Clock`], so walks can run
//! against a [`FrozenClock`] in tests without sleeping.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use std::sync::Mutex;
use std::time::Duration;

/// Source of the current time and of randomized pauses
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Suspends for a random duration in `[min, max]`
    async fn sleep_between(&self, min: Duration, max: Duration);
}

/// Picks a random duration in `[min, max]` with millisecond resolution
pub fn jitter(min: Duration, max: Duration) -> Duration {
    let lo = min.as_millis() as u64;
    let hi = max.as_millis() as u64;
    if hi <= lo {
        return min;
    }
    Duration::from_millis(rand::rng().random_range(lo..=hi))
}

/// Wall clock backed by tokio timers
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep_between(&self, min: Duration, max: Duration) {
        let pause = jitter(min, max);
        tracing::trace!("Sleeping {:?}", pause);
        tokio::time::sleep(pause).await;
    }
}

/// A clock that never advances and never sleeps
///
/// Requested pauses are recorded as `(min, max)` pairs so callers can check
/// pacing without waiting for it.
#[derive(Debug)]
pub struct FrozenClock {
    now: DateTime<Utc>,
    sleeps: Mutex<Vec<(Duration, Duration)>>,
}

impl FrozenClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now,
            sleeps: Mutex::new(Vec::new()),
        }
    }

    /// All pauses requested so far, in order
    pub fn sleeps(&self) -> Vec<(Duration, Duration)> {
        self.sleeps
            .lock()
            .map(|sleeps| sleeps.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Clock for FrozenClock {
    fn now(&self) -> DateTime<Utc> {
        self.now
    }

    async fn sleep_between(&self, min: Duration, max: Duration) {
        if let Ok(mut sleeps) = self.sleeps.lock() {
            sleeps.push((min, max));
        }
    }
}
