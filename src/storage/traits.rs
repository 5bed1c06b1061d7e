//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::crawler::WalkSummary;
use crate::pipeline::{CleanPost, RecordSource, Signal};
use crate::storage::{PostRecord, RunRecord, RunStatus, SignalSummary, WalkRecord};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// This trait defines all database operations needed by the pipeline.
pub trait Storage {
    // ===== Run Management =====

    /// Creates a new run
    ///
    /// # Arguments
    ///
    /// * `config_hash` - Hash of the configuration file
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Records where the run's records came from
    fn set_record_source(&mut self, run_id: i64, source: RecordSource) -> StorageResult<()>;

    /// Sets the final status of a run with a finish timestamp
    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()>;

    // ===== Walks =====

    /// Stores the per-tag outcomes of a crawl
    fn record_walks(&mut self, run_id: i64, walks: &[WalkSummary]) -> StorageResult<()>;

    /// Gets the walks of a run in the order they were recorded
    fn get_walks(&self, run_id: i64) -> StorageResult<Vec<WalkRecord>>;

    // ===== Posts =====

    /// Appends posts, skipping any whose content hash is already stored
    ///
    /// # Arguments
    ///
    /// * `run_id` - The run that collected the posts
    /// * `posts` - Cleaned posts
    ///
    /// # Returns
    ///
    /// The number of posts actually inserted
    fn append_posts(&mut self, run_id: i64, posts: &[CleanPost]) -> StorageResult<usize>;

    /// Gets the most recently posted posts, newest first
    fn recent_posts(&self, limit: usize) -> StorageResult<Vec<PostRecord>>;

    // ===== Signals =====

    /// Stores one run's signal scores
    fn append_signals(&mut self, run_id: i64, signals: &[Signal]) -> StorageResult<usize>;

    /// Summarizes the signals of one run
    fn signal_summary(&self, run_id: i64) -> StorageResult<SignalSummary>;

    // ===== Statistics =====

    /// Gets total post count
    fn count_posts(&self) -> StorageResult<u64>;

    /// Gets the number of posts first collected by a run
    fn count_posts_for_run(&self, run_id: i64) -> StorageResult<u64>;

    /// Gets count of distinct non-empty author handles
    fn count_unique_authors(&self) -> StorageResult<u64>;

    /// Gets the most used hashtags (lowercased) with their counts
    fn top_hashtags(&self, limit: usize) -> StorageResult<Vec<(String, u64)>>;

    /// Gets the most active authors with their post counts
    fn top_authors(&self, limit: usize) -> StorageResult<Vec<(String, u64)>>;

    /// Gets the earliest and latest posting times
    fn posted_range(&self) -> StorageResult<Option<(String, String)>>;
}
