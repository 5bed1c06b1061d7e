//! Crawler module for walking tag feeds
//!
//! This module contains the collection logic, including:
//! - Reading structured records out of rendered feed items
//! - Walking one tag's infinite-scroll feed until a stop condition
//! - Running the walks for every tag over one browsing session

mod extractor;
mod orchestrator;
mod record;
mod walker;

#[cfg(test)]
pub(crate) mod testing;

pub use extractor::{
    absolutize, mentions_in, parse_metric_label, tags_in, Extraction, ItemSelectors,
    RecordExtractor,
};
pub use orchestrator::{CrawlReport, CrawlRequest, TagCrawler, WalkSummary};
pub use record::{parse_timestamp, RawRecord};
pub use walker::{FeedWalker, WalkLimits, WalkOutcome, WalkStats};
