//! Storage module for persisting pipeline results
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - Run tracking with the source of each run's records
//! - Per-tag walk outcomes
//! - Cross-run deduplicated posts and per-run signal scores
//! - Aggregate queries for statistics and summaries

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::pipeline::RecordSource;
use crate::state::StopReason;
use std::collections::BTreeMap;
use std::path::Path;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(PulseError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> crate::Result<SqliteStorage> {
    SqliteStorage::new(path)
}

/// Represents a pipeline run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
    /// Unset until the crawl outcome is known
    pub record_source: Option<RecordSource>,
}

/// Status of a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// A stored tag walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkRecord {
    pub run_id: i64,
    pub tag: String,
    pub records: u64,
    pub stop_reason: Option<StopReason>,
    pub passes: u32,
    pub scroll_attempts: u32,
    pub duplicates: u64,
    pub empty_items: u64,
    pub extraction_failures: u64,
}

/// A stored post
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostRecord {
    pub id: i64,
    pub content_hash: String,
    pub run_id: i64,
    pub author_handle: String,
    pub posted_at: Option<String>,
    pub body: String,
    pub engagement: BTreeMap<String, u64>,
    pub mentions: Vec<String>,
    pub tags: Vec<String>,
    pub permalink: Option<String>,
    pub collected_at: String,
}

/// A signal joined with the post it scores
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPost {
    pub content_hash: String,
    pub author_handle: String,
    pub body: String,
    pub permalink: Option<String>,
    pub score: f64,
}

/// Aggregate view of a run's signals
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignalSummary {
    pub count: u64,
    pub mean_score: f64,
    pub mean_confidence: f64,
    pub strongest_positive: Option<ScoredPost>,
    pub strongest_negative: Option<ScoredPost>,
}
