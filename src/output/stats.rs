//! Statistics generation from the pipeline database
//!
//! This module provides functionality for extracting and displaying
//! database-wide statistics from the storage layer.

use crate::output::TOP_N;
use crate::storage::{RunRecord, Storage, WalkRecord};
use crate::PulseError;

/// Database-wide statistics
#[derive(Debug, Clone)]
pub struct PulseStatistics {
    /// Total number of stored posts
    pub total_posts: u64,

    /// Number of distinct authors
    pub unique_authors: u64,

    /// Earliest and latest posting time
    pub posted_range: Option<(String, String)>,

    pub top_hashtags: Vec<(String, u64)>,
    pub top_authors: Vec<(String, u64)>,

    /// The most recent run and its walks
    pub latest_run: Option<RunRecord>,
    pub latest_walks: Vec<WalkRecord>,
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(PulseStatistics)` - Successfully loaded statistics
/// * `Err(PulseError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn Storage) -> Result<PulseStatistics, PulseError> {
    let latest_run = storage.get_latest_run()?;
    let latest_walks = match &latest_run {
        Some(run) => storage.get_walks(run.id)?,
        None => Vec::new(),
    };

    Ok(PulseStatistics {
        total_posts: storage.count_posts()?,
        unique_authors: storage.count_unique_authors()?,
        posted_range: storage.posted_range()?,
        top_hashtags: storage.top_hashtags(TOP_N)?,
        top_authors: storage.top_authors(TOP_N)?,
        latest_run,
        latest_walks,
    })
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &PulseStatistics) {
    println!("=== Tagpulse Statistics ===\n");

    println!("Overview:");
    println!("  Total posts stored: {}", stats.total_posts);
    println!("  Unique authors: {}", stats.unique_authors);
    if let Some((earliest, latest)) = &stats.posted_range {
        println!("  Posted between: {} and {}", earliest, latest);
    }
    println!();

    if let Some(run) = &stats.latest_run {
        println!("Latest Run (#{}):", run.id);
        println!("  Started: {}", run.started_at);
        println!("  Status: {}", run.status.to_db_string());
        if let Some(source) = run.record_source {
            println!("  Record source: {}", source);
        }
        for walk in &stats.latest_walks {
            let reason = walk
                .stop_reason
                .map(|r| r.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            println!(
                "  #{}: {} records, stopped on {} after {} scrolls",
                walk.tag, walk.records, reason, walk.scroll_attempts
            );
        }
        println!();
    }

    if !stats.top_hashtags.is_empty() {
        println!("Top Hashtags:");
        for (tag, count) in &stats.top_hashtags {
            let percentage = if stats.total_posts > 0 {
                (*count as f64 / stats.total_posts as f64) * 100.0
            } else {
                0.0
            };
            println!("  {}: {} ({:.1}% of posts)", tag, count, percentage);
        }
        println!();
    }

    if !stats.top_authors.is_empty() {
        println!("Most Active Authors:");
        for (author, count) in &stats.top_authors {
            println!("  @{}: {}", author, count);
        }
        println!();
    }
}
