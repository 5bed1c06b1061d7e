//! Record cleaning and in-batch deduplication

use crate::crawler::RawRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};

/// A normalized post ready for storage and scoring
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanPost {
    /// Hex SHA-256 of permalink and body; stable across runs
    pub content_hash: String,
    pub author_handle: String,
    pub posted_at: Option<DateTime<Utc>>,
    pub body: String,
    pub engagement: BTreeMap<String, u64>,
    pub mentions: Vec<String>,
    pub tags: Vec<String>,
    pub permalink: Option<String>,
}

/// Trims and collapses every whitespace run to a single space
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Identity of a post across runs
///
/// A missing permalink hashes as the empty string.
pub fn content_hash(permalink: Option<&str>, body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(permalink.unwrap_or("").as_bytes());
    hasher.update(b"||");
    hasher.update(body.as_bytes());
    hex::encode(hasher.finalize())
}

/// Normalizes one record, or `None` if nothing is left of its body
pub fn clean_record(record: &RawRecord) -> Option<CleanPost> {
    let body = normalize_whitespace(&record.body);
    if body.is_empty() {
        return None;
    }

    Some(CleanPost {
        content_hash: content_hash(record.permalink.as_deref(), &body),
        author_handle: record.author_handle.trim().to_string(),
        posted_at: record.posted_at_utc(),
        body,
        engagement: record.engagement.clone(),
        mentions: record.mentions.clone(),
        tags: record.tags.clone(),
        permalink: record.permalink.clone(),
    })
}

/// Cleans a batch, keeping the first of any posts that share a content hash
///
/// # Arguments
///
/// * `records` - Raw records in collection order
///
/// # Returns
///
/// Clean posts in the same relative order
pub fn clean_records(records: &[RawRecord]) -> Vec<CleanPost> {
    let mut seen = HashSet::new();
    let mut posts = Vec::with_capacity(records.len());
    let mut dropped = 0usize;

    for record in records {
        match clean_record(record) {
            Some(post) if seen.insert(post.content_hash.clone()) => posts.push(post),
            _ => dropped += 1,
        }
    }

    tracing::debug!(
        "Cleaned {} records: kept {}, dropped {}",
        records.len(),
        posts.len(),
        dropped
    );
    posts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(body: &str, permalink: Option<&str>) -> RawRecord {
        RawRecord {
            author_handle: "  trader  ".to_string(),
            posted_at: Some("2024-05-01T10:00:00".to_string()),
            body: body.to_string(),
            permalink: permalink.map(str::to_string),
            ..RawRecord::default()
        }
    }

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(normalize_whitespace("  a \n\t b   c "), "a b c");
        assert_eq!(normalize_whitespace(" \n "), "");
    }

    #[test]
    fn test_clean_record_fields() {
        let post = clean_record(&record(" Nifty   up\n#nifty50 ", Some("https://t/x/status/1")))
            .unwrap();

        assert_eq!(post.body, "Nifty up #nifty50");
        assert_eq!(post.author_handle, "trader");
        assert_eq!(
            post.posted_at,
            Some(
                DateTime::parse_from_rfc3339("2024-05-01T10:00:00Z")
                    .unwrap()
                    .with_timezone(&Utc)
            )
        );
        assert_eq!(
            post.content_hash,
            content_hash(Some("https://t/x/status/1"), "Nifty up #nifty50")
        );
        assert_eq!(post.content_hash.len(), 64);
    }

    #[test]
    fn test_whitespace_only_body_dropped() {
        assert!(clean_record(&record("   \n", None)).is_none());
    }

    #[test]
    fn test_hash_depends_on_permalink_and_body() {
        let a = content_hash(Some("https://t/1"), "hello");
        assert_eq!(a, content_hash(Some("https://t/1"), "hello"));
        assert_ne!(a, content_hash(Some("https://t/2"), "hello"));
        assert_ne!(a, content_hash(Some("https://t/1"), "hello!"));
        assert_eq!(content_hash(None, "hello"), content_hash(Some(""), "hello"));
    }

    #[test]
    fn test_batch_dedup_keeps_first() {
        let mut first = record("same  text", Some("https://t/1"));
        first.author_handle = "first".to_string();
        let mut second = record("same text", Some("https://t/1"));
        second.author_handle = "second".to_string();
        let other = record("same text", Some("https://t/2"));

        let posts = clean_records(&[first, second, other, record("", None)]);

        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].author_handle, "first");
        assert_eq!(posts[1].permalink.as_deref(), Some("https://t/2"));
    }

    #[test]
    fn test_unparseable_timestamp_becomes_none() {
        let mut raw = record("x", None);
        raw.posted_at = Some("3h".to_string());
        assert_eq!(clean_record(&raw).unwrap().posted_at, None);
    }
}
