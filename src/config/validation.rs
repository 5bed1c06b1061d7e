use crate::config::types::{
    Config, CrawlerConfig, OutputConfig, ProxyConfig, SignalConfig, SourceConfig, TimingConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_timing_config(&config.timing)?;
    validate_source_config(&config.source)?;
    if let Some(proxy) = &config.proxy {
        validate_proxy_config(proxy)?;
    }
    validate_output_config(&config.output)?;
    validate_signal_config(&config.signals)?;
    Ok(())
}

/// Validates crawl scope and walk limits
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.tags.is_empty() {
        return Err(ConfigError::Validation(
            "at least one tag is required".to_string(),
        ));
    }

    for tag in &config.tags {
        validate_tag(tag)?;
    }

    if config.max_per_tag < 1 {
        return Err(ConfigError::Validation(format!(
            "max_per_tag must be >= 1, got {}",
            config.max_per_tag
        )));
    }

    if config.lookback_hours < 1 {
        return Err(ConfigError::Validation(format!(
            "lookback_hours must be >= 1, got {}",
            config.lookback_hours
        )));
    }

    if config.max_scroll_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "max_scroll_attempts must be >= 1, got {}",
            config.max_scroll_attempts
        )));
    }

    if config.stall_limit < 1 {
        return Err(ConfigError::Validation(format!(
            "stall_limit must be >= 1, got {}",
            config.stall_limit
        )));
    }

    if config.fingerprint_length < 1 {
        return Err(ConfigError::Validation(format!(
            "fingerprint_length must be >= 1, got {}",
            config.fingerprint_length
        )));
    }

    Ok(())
}

/// A tag is a bare keyword: non-empty, no whitespace, no leading '#'
fn validate_tag(tag: &str) -> Result<(), ConfigError> {
    if tag.is_empty() {
        return Err(ConfigError::Validation("tag cannot be empty".to_string()));
    }

    if tag.chars().any(char::is_whitespace) {
        return Err(ConfigError::Validation(format!(
            "tag '{}' cannot contain whitespace",
            tag
        )));
    }

    if tag.starts_with('#') {
        return Err(ConfigError::Validation(format!(
            "tag '{}' must be given without the leading '#'",
            tag
        )));
    }

    Ok(())
}

/// Validates timeouts and jitter bounds
fn validate_timing_config(config: &TimingConfig) -> Result<(), ConfigError> {
    for (name, value) in [
        ("navigation_timeout_ms", config.navigation_timeout_ms),
        ("load_wait_timeout_ms", config.load_wait_timeout_ms),
    ] {
        if value < 100 {
            return Err(ConfigError::Validation(format!(
                "{} must be >= 100ms, got {}ms",
                name, value
            )));
        }
    }

    if config.scroll_jitter_min_ms > config.scroll_jitter_max_ms {
        return Err(ConfigError::Validation(format!(
            "scroll jitter min ({}ms) exceeds max ({}ms)",
            config.scroll_jitter_min_ms, config.scroll_jitter_max_ms
        )));
    }

    if config.tag_pacing_min_ms > config.tag_pacing_max_ms {
        return Err(ConfigError::Validation(format!(
            "tag pacing min ({}ms) exceeds max ({}ms)",
            config.tag_pacing_min_ms, config.tag_pacing_max_ms
        )));
    }

    Ok(())
}

/// Validates the feed origin and search path template
fn validate_source_config(config: &SourceConfig) -> Result<(), ConfigError> {
    let origin = Url::parse(&config.origin)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid origin: {}", e)))?;

    if origin.scheme() != "https" && origin.scheme() != "http" {
        return Err(ConfigError::InvalidUrl(format!(
            "origin '{}' must use http or https",
            config.origin
        )));
    }

    if !config.search_path.contains("{tag}") {
        return Err(ConfigError::Validation(format!(
            "search_path '{}' must contain the {{tag}} placeholder",
            config.search_path
        )));
    }

    if let Some(agent) = &config.user_agent {
        if agent.trim().is_empty() {
            return Err(ConfigError::Validation(
                "user_agent cannot be blank when set".to_string(),
            ));
        }
    }

    Ok(())
}

/// Validates the proxy descriptor
fn validate_proxy_config(config: &ProxyConfig) -> Result<(), ConfigError> {
    Url::parse(&config.server)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid proxy server: {}", e)))?;

    if config.password.is_some() && config.username.is_none() {
        return Err(ConfigError::Validation(
            "proxy password requires a username".to_string(),
        ));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    if config.summary_path.is_empty() {
        return Err(ConfigError::Validation(
            "summary_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates TF-IDF parameters
fn validate_signal_config(config: &SignalConfig) -> Result<(), ConfigError> {
    if config.max_features < 1 {
        return Err(ConfigError::Validation(
            "max_features must be >= 1".to_string(),
        ));
    }

    if !(1..=3).contains(&config.ngram_max) {
        return Err(ConfigError::Validation(format!(
            "ngram_max must be between 1 and 3, got {}",
            config.ngram_max
        )));
    }

    Ok(())
}
