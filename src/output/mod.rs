//! Output module for generating run summaries and reports
//!
//! This module handles:
//! - Collecting a summary of the latest run from storage
//! - Writing that summary as markdown
//! - Printing database-wide statistics

mod markdown;
pub mod stats;

pub use markdown::{format_markdown_summary, generate_markdown_summary};
pub use stats::{load_statistics, print_statistics, PulseStatistics};

use crate::storage::{PostRecord, SignalSummary, Storage, WalkRecord};
use crate::PulseError;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Number of entries shown in ranked lists
pub const TOP_N: usize = 10;

/// Summary of one run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    // Run metadata
    pub run_id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub duration_seconds: Option<u64>,
    pub status: String,
    pub config_hash: String,
    pub record_source: Option<String>,

    // Counts
    pub posts_in_run: u64,
    pub total_posts: u64,
    pub unique_authors: u64,
    pub posted_range: Option<(String, String)>,

    // Per-tag walk outcomes
    pub walks: Vec<WalkRecord>,

    pub top_hashtags: Vec<(String, u64)>,
    pub top_authors: Vec<(String, u64)>,
    pub signals: SignalSummary,
    pub recent_posts: Vec<PostRecord>,
}

impl RunSummary {
    /// Total records collected across all walks
    pub fn records_collected(&self) -> u64 {
        self.walks.iter().map(|w| w.records).sum()
    }
}

/// Generates a summary of the latest run from storage
///
/// # Arguments
///
/// * `storage` - The storage backend containing run data
///
/// # Returns
///
/// * `Ok(RunSummary)` - Successfully generated summary
/// * `Err(PulseError)` - No run recorded yet, or a query failed
pub fn generate_summary(storage: &dyn Storage) -> Result<RunSummary, PulseError> {
    let run = storage
        .get_latest_run()?
        .ok_or_else(|| OutputError::Storage("No runs found in database".to_string()))?;

    let duration_seconds = if let (Ok(started), Some(finished_str)) = (
        run.started_at.parse::<chrono::DateTime<chrono::Utc>>(),
        &run.finished_at,
    ) {
        finished_str
            .parse::<chrono::DateTime<chrono::Utc>>()
            .ok()
            .map(|finished| (finished - started).num_seconds().max(0) as u64)
    } else {
        None
    };

    Ok(RunSummary {
        run_id: run.id,
        started_at: run.started_at,
        finished_at: run.finished_at,
        duration_seconds,
        status: run.status.to_db_string().to_string(),
        config_hash: run.config_hash,
        record_source: run.record_source.map(|s| s.to_db_string().to_string()),
        posts_in_run: storage.count_posts_for_run(run.id)?,
        total_posts: storage.count_posts()?,
        unique_authors: storage.count_unique_authors()?,
        posted_range: storage.posted_range()?,
        walks: storage.get_walks(run.id)?,
        top_hashtags: storage.top_hashtags(TOP_N)?,
        top_authors: storage.top_authors(TOP_N)?,
        signals: storage.signal_summary(run.id)?,
        recent_posts: storage.recent_posts(5)?,
    })
}
