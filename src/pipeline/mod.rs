//! Post-crawl processing
//!
//! # Components
//!
//! - `cleaner`: whitespace normalization, timestamp parsing, content hashing
//! - `signals`: TF-IDF based per-post scoring
//! - `mock`: synthetic records for when the crawl has nothing to offer
//!
//! [`resolve_records`] decides which records the rest of the run works on.

pub mod cleaner;
pub mod mock;
pub mod signals;

pub use cleaner::{clean_records, content_hash, normalize_whitespace, CleanPost};
pub use mock::generate_mock_records;
pub use signals::{compute_signals, Signal};

use crate::clock::Clock;
use crate::config::FallbackConfig;
use crate::crawler::{CrawlReport, RawRecord};
use crate::PulseError;
use std::fmt;

/// Where a run's records came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordSource {
    /// The crawl produced records
    Crawled,

    /// The crawl finished but found nothing; synthetic records were used
    FallbackAfterEmpty,

    /// The crawl failed; synthetic records were used
    FallbackAfterError,

    /// The crawl found nothing and fallback is disabled
    Empty,
}

impl RecordSource {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Crawled => "crawled",
            Self::FallbackAfterEmpty => "fallback_after_empty",
            Self::FallbackAfterError => "fallback_after_error",
            Self::Empty => "empty",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "crawled" => Some(Self::Crawled),
            "fallback_after_empty" => Some(Self::FallbackAfterEmpty),
            "fallback_after_error" => Some(Self::FallbackAfterError),
            "empty" => Some(Self::Empty),
            _ => None,
        }
    }

    pub fn is_synthetic(&self) -> bool {
        matches!(self, Self::FallbackAfterEmpty | Self::FallbackAfterError)
    }
}

impl fmt::Display for RecordSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// Records chosen for a run
#[derive(Debug, Clone)]
pub struct ResolvedRecords {
    pub records: Vec<RawRecord>,
    pub source: RecordSource,
    /// The crawl report, when the crawl itself succeeded
    pub report: Option<CrawlReport>,
}

/// Applies the fallback policy to a crawl outcome
///
/// An empty crawl and a failed crawl are told apart: the first is a normal
/// outcome, the second is logged as an error before falling back.
///
/// # Arguments
///
/// * `result` - What the tag crawler returned
/// * `fallback` - Whether and how much synthetic data to use
/// * `clock` - Anchors synthetic timestamps
///
/// # Returns
///
/// * `Ok(ResolvedRecords)` - Records to process, with their source
/// * `Err(PulseError)` - The crawl failed and fallback is disabled
pub fn resolve_records<C: Clock + ?Sized>(
    result: Result<CrawlReport, PulseError>,
    fallback: &FallbackConfig,
    clock: &C,
) -> Result<ResolvedRecords, PulseError> {
    match result {
        Ok(report) if !report.is_empty() => Ok(ResolvedRecords {
            records: report.records.clone(),
            source: RecordSource::Crawled,
            report: Some(report),
        }),
        Ok(report) if fallback.enabled => {
            tracing::warn!(
                "Crawl returned no records; using {} synthetic records",
                fallback.mock_count
            );
            Ok(ResolvedRecords {
                records: generate_mock_records(fallback.mock_count, clock.now()),
                source: RecordSource::FallbackAfterEmpty,
                report: Some(report),
            })
        }
        Ok(report) => {
            tracing::warn!("Crawl returned no records and fallback is disabled");
            Ok(ResolvedRecords {
                records: Vec::new(),
                source: RecordSource::Empty,
                report: Some(report),
            })
        }
        Err(e) if fallback.enabled => {
            tracing::error!(
                "Crawl failed: {}; using {} synthetic records",
                e,
                fallback.mock_count
            );
            Ok(ResolvedRecords {
                records: generate_mock_records(fallback.mock_count, clock.now()),
                source: RecordSource::FallbackAfterError,
                report: None,
            })
        }
        Err(e) => Err(e),
    }
}
