//! Records produced by the extractor

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One post as read from a rendered feed item
///
/// Fields that could not be read hold their zero value. A record is only ever
/// produced with a non-empty `body`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RawRecord {
    /// Author handle, empty if not resolvable
    pub author_handle: String,

    /// ISO-8601 timestamp exactly as rendered, if present
    pub posted_at: Option<String>,

    /// Post text
    pub body: String,

    /// Metric name to count, only for metrics that parsed
    pub engagement: BTreeMap<String, u64>,

    /// `@handle` tokens from the body, in order, duplicates kept
    pub mentions: Vec<String>,

    /// `#tag` tokens from the body, in order, duplicates kept
    pub tags: Vec<String>,

    /// Absolute link to the post
    pub permalink: Option<String>,
}

impl RawRecord {
    /// In-walk identity: the first `len` characters of the body
    pub fn fingerprint(&self, len: usize) -> String {
        self.body.chars().take(len).collect()
    }

    /// The posting time as UTC, if present and parseable
    pub fn posted_at_utc(&self) -> Option<DateTime<Utc>> {
        self.posted_at.as_deref().and_then(parse_timestamp)
    }
}

/// Parses an ISO-8601 timestamp
///
/// Timestamps with an offset are converted to UTC; timestamps without one are
/// read as UTC. Anything else gives `None`.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
