//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::crawler::WalkSummary;
use crate::pipeline::{CleanPost, RecordSource, Signal};
use crate::state::StopReason;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{PostRecord, RunRecord, RunStatus, ScoredPost, SignalSummary, WalkRecord};
use crate::PulseError;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::Path;

const RUN_COLUMNS: &str = "id, started_at, finished_at, config_hash, status, record_source";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(PulseError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, PulseError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, PulseError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    let source: Option<String> = row.get(5)?;
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
            .unwrap_or(RunStatus::Running),
        record_source: source.as_deref().and_then(RecordSource::from_db_string),
    })
}

fn scored_from_row(row: &Row<'_>) -> rusqlite::Result<ScoredPost> {
    Ok(ScoredPost {
        content_hash: row.get(0)?,
        author_handle: row.get(1)?,
        body: row.get(2)?,
        permalink: row.get(3)?,
        score: row.get(4)?,
    })
}

impl SqliteStorage {
    fn strongest_signal(&self, run_id: i64, positive: bool) -> StorageResult<Option<ScoredPost>> {
        let sql = if positive {
            "SELECT s.content_hash, COALESCE(p.author_handle, ''), COALESCE(p.body, ''), s.permalink, s.score
             FROM signals s LEFT JOIN posts p ON p.content_hash = s.content_hash
             WHERE s.run_id = ?1 AND s.score > 0
             ORDER BY s.score DESC, s.id ASC LIMIT 1"
        } else {
            "SELECT s.content_hash, COALESCE(p.author_handle, ''), COALESCE(p.body, ''), s.permalink, s.score
             FROM signals s LEFT JOIN posts p ON p.content_hash = s.content_hash
             WHERE s.run_id = ?1 AND s.score < 0
             ORDER BY s.score ASC, s.id ASC LIMIT 1"
        };
        let post = self
            .conn
            .query_row(sql, params![run_id], scored_from_row)
            .optional()?;
        Ok(post)
    }
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        let now = timestamp(&Utc::now());
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        let sql = format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS);
        self.conn
            .query_row(&sql, params![run_id], run_from_row)
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let sql = format!("SELECT {} FROM runs ORDER BY id DESC LIMIT 1", RUN_COLUMNS);
        let run = self.conn.query_row(&sql, [], run_from_row).optional()?;
        Ok(run)
    }

    fn set_record_source(&mut self, run_id: i64, source: RecordSource) -> StorageResult<()> {
        let updated = self.conn.execute(
            "UPDATE runs SET record_source = ?1 WHERE id = ?2",
            params![source.to_db_string(), run_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        let now = timestamp(&Utc::now());
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![status.to_db_string(), now, run_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    // ===== Walks =====

    fn record_walks(&mut self, run_id: i64, walks: &[WalkSummary]) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO walks (run_id, tag, records, stop_reason, passes, scroll_attempts,
                                    duplicates, empty_items, extraction_failures)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            for walk in walks {
                stmt.execute(params![
                    run_id,
                    walk.tag,
                    walk.records as i64,
                    walk.stop_reason.to_db_string(),
                    walk.stats.passes,
                    walk.stats.scroll_attempts,
                    walk.stats.duplicates as i64,
                    walk.stats.empty_items as i64,
                    walk.stats.extraction_failures as i64,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn get_walks(&self, run_id: i64) -> StorageResult<Vec<WalkRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT run_id, tag, records, stop_reason, passes, scroll_attempts,
                    duplicates, empty_items, extraction_failures
             FROM walks WHERE run_id = ?1 ORDER BY id",
        )?;

        let walks = stmt
            .query_map(params![run_id], |row| {
                Ok(WalkRecord {
                    run_id: row.get(0)?,
                    tag: row.get(1)?,
                    records: row.get::<_, i64>(2)? as u64,
                    stop_reason: StopReason::from_db_string(&row.get::<_, String>(3)?),
                    passes: row.get(4)?,
                    scroll_attempts: row.get(5)?,
                    duplicates: row.get::<_, i64>(6)? as u64,
                    empty_items: row.get::<_, i64>(7)? as u64,
                    extraction_failures: row.get::<_, i64>(8)? as u64,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(walks)
    }

    // ===== Posts =====

    fn append_posts(&mut self, run_id: i64, posts: &[CleanPost]) -> StorageResult<usize> {
        let collected_at = timestamp(&Utc::now());
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO posts (content_hash, run_id, author_handle, posted_at, body,
                                              engagement, mentions, tags, permalink, collected_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            )?;
            for post in posts {
                inserted += stmt.execute(params![
                    post.content_hash,
                    run_id,
                    post.author_handle,
                    post.posted_at.as_ref().map(timestamp),
                    post.body,
                    serde_json::to_string(&post.engagement)?,
                    serde_json::to_string(&post.mentions)?,
                    serde_json::to_string(&post.tags)?,
                    post.permalink,
                    collected_at,
                ])?;
            }
        }
        tx.commit()?;

        tracing::debug!(
            "Stored {} of {} posts for run {}",
            inserted,
            posts.len(),
            run_id
        );
        Ok(inserted)
    }

    fn recent_posts(&self, limit: usize) -> StorageResult<Vec<PostRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, content_hash, run_id, author_handle, posted_at, body,
                    engagement, mentions, tags, permalink, collected_at
             FROM posts
             ORDER BY posted_at IS NULL, posted_at DESC, id DESC
             LIMIT ?1",
        )?;

        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                    row.get::<_, String>(7)?,
                    row.get::<_, String>(8)?,
                    row.get::<_, Option<String>>(9)?,
                    row.get::<_, String>(10)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut posts = Vec::with_capacity(rows.len());
        for (
            id,
            content_hash,
            run_id,
            author_handle,
            posted_at,
            body,
            engagement,
            mentions,
            tags,
            permalink,
            collected_at,
        ) in rows
        {
            posts.push(PostRecord {
                id,
                content_hash,
                run_id,
                author_handle,
                posted_at,
                body,
                engagement: serde_json::from_str(&engagement)?,
                mentions: serde_json::from_str(&mentions)?,
                tags: serde_json::from_str(&tags)?,
                permalink,
                collected_at,
            });
        }
        Ok(posts)
    }

    // ===== Signals =====

    fn append_signals(&mut self, run_id: i64, signals: &[Signal]) -> StorageResult<usize> {
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO signals (run_id, content_hash, permalink, posted_at, score, confidence)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for signal in signals {
                inserted += stmt.execute(params![
                    run_id,
                    signal.content_hash,
                    signal.permalink,
                    signal.posted_at.as_ref().map(timestamp),
                    signal.score,
                    signal.confidence,
                ])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    fn signal_summary(&self, run_id: i64) -> StorageResult<SignalSummary> {
        let (count, mean_score, mean_confidence): (i64, Option<f64>, Option<f64>) =
            self.conn.query_row(
                "SELECT COUNT(*), AVG(score), AVG(confidence) FROM signals WHERE run_id = ?1",
                params![run_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )?;

        Ok(SignalSummary {
            count: count as u64,
            mean_score: mean_score.unwrap_or(0.0),
            mean_confidence: mean_confidence.unwrap_or(0.0),
            strongest_positive: self.strongest_signal(run_id, true)?,
            strongest_negative: self.strongest_signal(run_id, false)?,
        })
    }

    // ===== Statistics =====

    fn count_posts(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM posts", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_posts_for_run(&self, run_id: i64) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM posts WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_unique_authors(&self) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(DISTINCT author_handle) FROM posts WHERE author_handle != ''",
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn top_hashtags(&self, limit: usize) -> StorageResult<Vec<(String, u64)>> {
        let mut stmt = self.conn.prepare("SELECT tags FROM posts")?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut counts: HashMap<String, u64> = HashMap::new();
        for raw in rows {
            let tags: Vec<String> = serde_json::from_str(&raw)?;
            for tag in tags {
                *counts.entry(tag.to_lowercase()).or_insert(0) += 1;
            }
        }

        let mut ranked: Vec<(String, u64)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(limit);
        Ok(ranked)
    }

    fn top_authors(&self, limit: usize) -> StorageResult<Vec<(String, u64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT author_handle, COUNT(*) AS posts FROM posts
             WHERE author_handle != ''
             GROUP BY author_handle
             ORDER BY posts DESC, author_handle ASC
             LIMIT ?1",
        )?;

        let authors = stmt
            .query_map(params![limit as i64], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(authors)
    }

    fn posted_range(&self) -> StorageResult<Option<(String, String)>> {
        let (earliest, latest): (Option<String>, Option<String>) = self.conn.query_row(
            "SELECT MIN(posted_at), MAX(posted_at) FROM posts WHERE posted_at IS NOT NULL",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(earliest.zip(latest))
    }
}
