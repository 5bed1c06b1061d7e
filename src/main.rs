//! Tagpulse main entry point
//!
//! This is the command-line interface for the Tagpulse feed collector.

use anyhow::Context;
use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};
use tagpulse::config::{load_config_with_hash, validate, Backend, Config};
use tracing_subscriber::EnvFilter;

/// Tagpulse: a tag-scoped social feed collector
///
/// Tagpulse walks the live search feed of each configured tag, keeps the posts
/// from the lookback window, stores them without duplicates across runs and
/// scores each one against the batch's dominant theme.
#[derive(Parser, Debug)]
#[command(name = "tagpulse")]
#[command(version = "1.0.0")]
#[command(about = "A tag-scoped social feed collector", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Tags to crawl instead of the configured ones (comma separated)
    #[arg(long, value_delimiter = ',')]
    tags: Option<Vec<String>>,

    /// Maximum records per tag
    #[arg(long)]
    max_per_tag: Option<usize>,

    /// Only keep posts from the last N hours
    #[arg(long)]
    lookback_hours: Option<u32>,

    /// Show the browser window
    #[arg(long)]
    headed: bool,

    /// Browsing backend to use
    #[arg(long, value_enum)]
    backend: Option<BackendArg>,

    /// Never substitute synthetic records for an empty or failed crawl
    #[arg(long)]
    no_fallback: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with_all = ["stats", "export_summary"])]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "export_summary"])]
    stats: bool,

    /// Generate markdown summary from existing data and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats"])]
    export_summary: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum BackendArg {
    Chromium,
    Static,
}

impl From<BackendArg> for Backend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Chromium => Backend::Chromium,
            BackendArg::Static => Backend::Static,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if apply_overrides(&mut config, &cli) {
        tracing::info!("Applied command-line overrides");
        validate(&config)?;
    }

    if cli.dry_run {
        handle_dry_run(&config)?;
    } else if cli.stats {
        handle_stats(&config)?;
    } else if cli.export_summary {
        handle_export_summary(&config)?;
    } else {
        handle_crawl(&config, &config_hash).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("tagpulse=info,warn"),
            1 => EnvFilter::new("tagpulse=debug,info"),
            2 => EnvFilter::new("tagpulse=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Applies command-line overrides; returns true if anything changed
fn apply_overrides(config: &mut Config, cli: &Cli) -> bool {
    let mut changed = false;

    if let Some(tags) = &cli.tags {
        config.crawler.tags = tags
            .iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        changed = true;
    }
    if let Some(max) = cli.max_per_tag {
        config.crawler.max_per_tag = max;
        changed = true;
    }
    if let Some(hours) = cli.lookback_hours {
        config.crawler.lookback_hours = hours;
        changed = true;
    }
    if cli.headed {
        config.crawler.headless = false;
        changed = true;
    }
    if let Some(backend) = cli.backend {
        config.source.backend = backend.into();
        changed = true;
    }
    if cli.no_fallback {
        config.fallback.enabled = false;
        changed = true;
    }

    changed
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Tagpulse Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Max records per tag: {}", config.crawler.max_per_tag);
    println!("  Lookback: {} hours", config.crawler.lookback_hours);
    println!("  Headless: {}", config.crawler.headless);
    println!(
        "  Max scroll attempts: {}",
        config.crawler.max_scroll_attempts
    );
    println!("  Stall limit: {} passes", config.crawler.stall_limit);

    println!("\nSource:");
    println!("  Backend: {:?}", config.source.backend);
    println!("  Origin: {}", config.source.origin);
    if let Some(proxy) = &config.proxy {
        println!("  Proxy: {}", proxy.server);
    }

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  Summary: {}", config.output.summary_path);

    println!("\nFallback:");
    if config.fallback.enabled {
        println!("  {} synthetic records", config.fallback.mock_count);
    } else {
        println!("  disabled");
    }

    println!("\nTags ({}):", config.crawler.tags.len());
    for tag in &config.crawler.tags {
        println!("  - #{}", tag);
        println!("    * {}", config.source.feed_url(tag));
    }

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would collect up to {} records",
        config.crawler.tags.len() * config.crawler.max_per_tag
    );

    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    use tagpulse::output::{load_statistics, print_statistics};
    use tagpulse::storage::open_storage;

    println!("Database: {}\n", config.output.database_path);

    let storage = open_storage(Path::new(&config.output.database_path))?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --export-summary mode: generates markdown summary
fn handle_export_summary(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    use tagpulse::output::{generate_markdown_summary, generate_summary};
    use tagpulse::storage::open_storage;

    println!("=== Exporting Run Summary ===\n");
    println!("Database: {}", config.output.database_path);
    println!("Output: {}", config.output.summary_path);
    println!();

    let storage = open_storage(Path::new(&config.output.database_path))?;

    tracing::info!("Loading run data from database...");
    let summary = generate_summary(&storage)?;

    tracing::info!("Generating markdown summary...");
    generate_markdown_summary(&summary, Path::new(&config.output.summary_path))?;

    println!("✓ Summary exported to: {}", config.output.summary_path);

    Ok(())
}

/// Creates the parent directory of an output file if needed
fn ensure_parent_dir(path: &str) -> anyhow::Result<()> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating output directory {}", parent.display()))?;
        }
    }
    Ok(())
}

/// Handles the main pipeline run
async fn handle_crawl(config: &Config, config_hash: &str) -> Result<(), Box<dyn std::error::Error>> {
    ensure_parent_dir(&config.output.database_path)?;
    ensure_parent_dir(&config.output.summary_path)?;

    tracing::info!(
        "Tags: {}, backend: {:?}, headless: {}",
        config.crawler.tags.join(", "),
        config.source.backend,
        config.crawler.headless
    );

    match tagpulse::runner::run(config, config_hash).await {
        Ok(outcome) => {
            println!(
                "✓ Run {} finished: {} records ({}), {} new posts, {} signals",
                outcome.run_id, outcome.records, outcome.source, outcome.stored, outcome.signals
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!("Run failed: {}", e);
            Err(e.into())
        }
    }
}
