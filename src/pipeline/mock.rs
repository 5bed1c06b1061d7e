//! Synthetic market-chatter records
//!
//! Used in place of a crawl when the feed yields nothing or the session
//! fails, so the rest of the pipeline always has data to work on.

use crate::crawler::{mentions_in, tags_in, RawRecord};
use chrono::{DateTime, Duration as ChronoDuration, SecondsFormat, Utc};
use rand::seq::IndexedRandom;
use rand::Rng;
use std::collections::BTreeMap;

const MOCK_POSTS: &[&str] = &[
    "Nifty50 showing strong bullish momentum! Target 25000 #nifty50 #stockmarket",
    "Bank Nifty breaking resistance at 52000. Good time to enter long positions #banknifty",
    "Sensex rallying hard today! Blue chip stocks on fire #sensex #investing",
    "Intraday traders making good profits on IT stocks today #intraday #daytrading",
    "TCS and Infosys leading the charge in tech sector #nifty50 #techstocks",
    "Market sentiment very positive. FIIs buying heavily #stockmarket #investing",
    "Reliance showing weakness below 2800. Watch for breakdown #ril #sensex",
    "Banking stocks outperforming today. HDFC Bank up 3% #banknifty #banking",
    "Volatile session ahead. Trade with proper risk management #intraday #trading",
    "Auto sector stocks gaining momentum. Tata Motors up 5% #sensex #auto",
    "Small cap stocks rallying. Good time for stock picking #investing #smallcaps",
    "Pharma stocks under pressure. Dr Reddy down 2% #pharma #nifty50",
    "Energy stocks surging on crude oil rally #energy #sensex",
    "FMCG stocks defensive play in uncertain times #fmcg #investing",
    "Metal stocks volatile on global cues #metals #intraday",
];

const MOCK_AUTHORS: &[&str] = &[
    "trader_pro",
    "stock_guru",
    "market_wizard",
    "invest_smart",
    "day_trader",
    "equity_expert",
    "nifty_tracker",
    "sensex_watch",
    "option_master",
    "swing_trader",
];

const MOCK_ORIGIN: &str = "https://twitter.com";

/// Generates `count` synthetic records posted within 24 hours before `now`
pub fn generate_mock_records(count: usize, now: DateTime<Utc>) -> Vec<RawRecord> {
    generate_mock_records_with(&mut rand::rng(), count, now)
}

/// Same as [`generate_mock_records`] with a caller-supplied generator
pub fn generate_mock_records_with<R: Rng + ?Sized>(
    rng: &mut R,
    count: usize,
    now: DateTime<Utc>,
) -> Vec<RawRecord> {
    let records: Vec<RawRecord> = (0..count).map(|_| mock_record(rng, now)).collect();
    tracing::debug!("Generated {} synthetic records", records.len());
    records
}

fn pick<R: Rng + ?Sized>(rng: &mut R, choices: &[&'static str]) -> &'static str {
    choices.choose(rng).copied().unwrap_or_default()
}

fn mock_record<R: Rng + ?Sized>(rng: &mut R, now: DateTime<Utc>) -> RawRecord {
    let author = pick(rng, MOCK_AUTHORS);

    let mut body = pick(rng, MOCK_POSTS).to_string();
    if rng.random_bool(0.3) {
        body.push_str(&format!(" Target: {}", rng.random_range(24_000..=26_000)));
    }
    if rng.random_bool(0.2) {
        body.push_str(&format!(" @{}", pick(rng, MOCK_AUTHORS)));
    }

    let posted_at = now - ChronoDuration::hours(rng.random_range(0..=24));

    let mut engagement = BTreeMap::new();
    engagement.insert("likes".to_string(), rng.random_range(0..=500));
    engagement.insert("reposts".to_string(), rng.random_range(0..=100));
    engagement.insert("replies".to_string(), rng.random_range(0..=50));

    let status: u64 = rng.random_range(1_000_000_000_000_000_000..=9_999_999_999_999_999_999);

    RawRecord {
        author_handle: author.to_string(),
        posted_at: Some(posted_at.to_rfc3339_opts(SecondsFormat::Secs, true)),
        mentions: mentions_in(&body),
        tags: tags_in(&body),
        body,
        engagement,
        permalink: Some(format!("{}/{}/status/{}", MOCK_ORIGIN, author, status)),
    }
}
