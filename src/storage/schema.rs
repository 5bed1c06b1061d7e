//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Tagpulse database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track pipeline runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL,
    record_source TEXT
);

-- One row per tag walked in a run
CREATE TABLE IF NOT EXISTS walks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    tag TEXT NOT NULL,
    records INTEGER NOT NULL,
    stop_reason TEXT NOT NULL,
    passes INTEGER NOT NULL,
    scroll_attempts INTEGER NOT NULL,
    duplicates INTEGER NOT NULL,
    empty_items INTEGER NOT NULL,
    extraction_failures INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_walks_run ON walks(run_id);

-- Cleaned posts, unique across runs by content hash
CREATE TABLE IF NOT EXISTS posts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    content_hash TEXT NOT NULL UNIQUE,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    author_handle TEXT NOT NULL,
    posted_at TEXT,
    body TEXT NOT NULL,
    engagement TEXT NOT NULL,
    mentions TEXT NOT NULL,
    tags TEXT NOT NULL,
    permalink TEXT,
    collected_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_posts_run ON posts(run_id);
CREATE INDEX IF NOT EXISTS idx_posts_author ON posts(author_handle);
CREATE INDEX IF NOT EXISTS idx_posts_posted_at ON posts(posted_at);

-- Per-post scores, one set per run
CREATE TABLE IF NOT EXISTS signals (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    content_hash TEXT NOT NULL,
    permalink TEXT,
    posted_at TEXT,
    score REAL NOT NULL,
    confidence REAL NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_signals_run ON signals(run_id);
CREATE INDEX IF NOT EXISTS idx_signals_hash ON signals(content_hash);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
