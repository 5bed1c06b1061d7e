//! Configuration module for Tagpulse
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use tagpulse::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("tagpulse.toml")).unwrap();
//! println!("Crawling {} tags", config.crawler.tags.len());
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Backend, Config, CrawlerConfig, FallbackConfig, OutputConfig, ProxyConfig, SignalConfig,
    SourceConfig, TimingConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
pub use validation::validate;
