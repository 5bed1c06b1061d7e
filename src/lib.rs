//! Tagpulse: a tag-scoped social feed collector
//!
//! This crate walks infinite-scroll search feeds for a list of topic tags in a
//! headless browser, extracts structured post records, and turns them into a
//! cleaned, deduplicated data set with a lightweight per-post signal score.

pub mod browser;
pub mod clock;
pub mod config;
pub mod crawler;
pub mod output;
pub mod pipeline;
pub mod runner;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for Tagpulse operations
#[derive(Debug, Error)]
pub enum PulseError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Browser session failure: {0}")]
    Session(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    StorageError(#[from] storage::StorageError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<browser::BrowseError> for PulseError {
    fn from(err: browser::BrowseError) -> Self {
        PulseError::Session(err.to_string())
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Tagpulse operations
pub type Result<T> = std::result::Result<T, PulseError>;

// Re-export commonly used types
pub use browser::{BrowseError, BrowsingSession, ElementHandle, SessionLauncher};
pub use clock::{Clock, FrozenClock, SystemClock};
pub use config::Config;
pub use crawler::{CrawlReport, CrawlRequest, RawRecord, TagCrawler};
pub use pipeline::RecordSource;
pub use runner::{run_pipeline, RunOutcome};
pub use state::{StopReason, WalkPhase};
