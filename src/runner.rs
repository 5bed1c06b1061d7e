//! End-to-end pipeline runs
//!
//! A run collects records for every configured tag, falls back to synthetic
//! records when the crawl has nothing to offer, cleans and stores the posts,
//! scores them and stores the scores. Every run is tracked in storage and
//! finishes as either completed or failed.

use crate::browser::{ChromiumLauncher, SessionLauncher, StaticLauncher};
use crate::clock::{Clock, SystemClock};
use crate::config::{Backend, Config};
use crate::crawler::TagCrawler;
use crate::output::{generate_markdown_summary, generate_summary};
use crate::pipeline::{clean_records, compute_signals, resolve_records, RecordSource};
use crate::storage::{open_storage, RunStatus, Storage};
use crate::PulseError;
use std::path::Path;

/// What a finished run produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub run_id: i64,
    pub source: RecordSource,
    /// Records handed to the cleaner
    pub records: usize,
    /// Clean posts after in-batch deduplication
    pub posts: usize,
    /// Posts not already stored by an earlier run
    pub stored: usize,
    pub signals: usize,
}

/// Runs the pipeline with an explicit launcher, clock and storage
///
/// # Arguments
///
/// * `config` - Validated configuration
/// * `config_hash` - Hash recorded with the run
/// * `launcher` - Browsing backend
/// * `clock` - Time source and pacing
/// * `storage` - Where the run is recorded
///
/// # Returns
///
/// * `Ok(RunOutcome)` - The run completed
/// * `Err(PulseError)` - The run failed and was marked as failed
pub async fn run_pipeline<L, C>(
    config: &Config,
    config_hash: &str,
    launcher: L,
    clock: C,
    storage: &mut dyn Storage,
) -> Result<RunOutcome, PulseError>
where
    L: SessionLauncher,
    C: Clock,
{
    let run_id = storage.create_run(config_hash)?;
    tracing::info!("Starting run {}", run_id);

    match execute(config, run_id, launcher, clock, storage).await {
        Ok(outcome) => {
            storage.finish_run(run_id, RunStatus::Completed)?;
            tracing::info!(
                "Run {} completed: {} records ({}), {} new posts, {} signals",
                run_id,
                outcome.records,
                outcome.source,
                outcome.stored,
                outcome.signals
            );
            Ok(outcome)
        }
        Err(e) => {
            tracing::error!("Run {} failed: {}", run_id, e);
            if let Err(mark) = storage.finish_run(run_id, RunStatus::Failed) {
                tracing::warn!("Could not mark run {} as failed: {}", run_id, mark);
            }
            Err(e)
        }
    }
}

async fn execute<L, C>(
    config: &Config,
    run_id: i64,
    launcher: L,
    clock: C,
    storage: &mut dyn Storage,
) -> Result<RunOutcome, PulseError>
where
    L: SessionLauncher,
    C: Clock,
{
    let crawler = TagCrawler::new(config, launcher, clock);
    let result = crawler.collect().await;
    let resolved = resolve_records(result, &config.fallback, crawler.clock())?;

    storage.set_record_source(run_id, resolved.source)?;
    if let Some(report) = &resolved.report {
        storage.record_walks(run_id, &report.walks)?;
    }
    if resolved.source == RecordSource::Empty {
        tracing::warn!("Run {} has no records to process", run_id);
    }

    let posts = clean_records(&resolved.records);
    let stored = storage.append_posts(run_id, &posts)?;

    let signals = compute_signals(&posts, &config.signals);
    let scored = storage.append_signals(run_id, &signals)?;

    Ok(RunOutcome {
        run_id,
        source: resolved.source,
        records: resolved.records.len(),
        posts: posts.len(),
        stored,
        signals: scored,
    })
}

/// Runs the pipeline with the configured backend and database, then writes
/// the markdown summary
pub async fn run(config: &Config, config_hash: &str) -> Result<RunOutcome, PulseError> {
    let mut storage = open_storage(Path::new(&config.output.database_path))?;

    let outcome = match config.source.backend {
        Backend::Chromium => {
            run_pipeline(config, config_hash, ChromiumLauncher, SystemClock, &mut storage).await?
        }
        Backend::Static => {
            run_pipeline(config, config_hash, StaticLauncher, SystemClock, &mut storage).await?
        }
    };

    let summary = generate_summary(&storage)?;
    generate_markdown_summary(&summary, Path::new(&config.output.summary_path))?;
    tracing::info!("Summary written to {}", config.output.summary_path);

    Ok(outcome)
}
