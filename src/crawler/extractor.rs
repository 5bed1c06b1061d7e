//! Record extraction from rendered feed items
//!
//! Each field is read independently. A missing sub-element gives the field its
//! zero value; an element that cannot be read fails the whole item, which the
//! caller counts and skips. Nothing here ever aborts a walk.

use crate::browser::{BrowseError, ElementHandle};
use crate::crawler::RawRecord;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use url::Url;

/// Engagement labels look like "1,234 Likes" or "12 replies"
#[allow(clippy::expect_used)]
static METRIC_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9,.]+)\s+([A-Za-z]+)").expect("valid regex"));

#[allow(clippy::expect_used)]
static MENTION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@\w+").expect("valid regex"));

#[allow(clippy::expect_used)]
static TAG_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"#\w+").expect("valid regex"));

/// CSS selectors describing where each field lives inside a feed item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemSelectors {
    /// One feed item on the page
    pub item: String,
    pub author: String,
    pub body: String,
    pub posted_at: String,
    pub posted_at_attribute: String,
    /// Every engagement metric region
    pub metrics: String,
    pub metric_label_attribute: String,
    pub permalink: String,
}

impl Default for ItemSelectors {
    fn default() -> Self {
        Self {
            item: "article".to_string(),
            author: r#"div[dir="ltr"] span"#.to_string(),
            body: "div[lang]".to_string(),
            posted_at: "time".to_string(),
            posted_at_attribute: "datetime".to_string(),
            metrics: r#"div[data-testid="like"], div[data-testid="retweet"], div[data-testid="reply"]"#
                .to_string(),
            metric_label_attribute: "aria-label".to_string(),
            permalink: r#"a[href*="/status/"]"#.to_string(),
        }
    }
}

/// Outcome of reading one item
#[derive(Debug, Clone)]
pub enum Extraction {
    /// A record with a non-empty body
    Record(RawRecord),
    /// The item had no body text
    Empty,
    /// The item could not be read
    Failed(BrowseError),
}

#[cfg(test)]
impl Extraction {
    fn into_record(self) -> Option<RawRecord> {
        match self {
            Self::Record(record) => Some(record),
            Self::Empty | Self::Failed(_) => None,
        }
    }
}

/// Reads [`RawRecord`]s out of feed item handles
#[derive(Debug, Clone)]
pub struct RecordExtractor {
    selectors: ItemSelectors,
    origin: String,
}

impl RecordExtractor {
    /// Creates an extractor with the default selectors
    ///
    /// `origin` is prepended to root-relative permalinks.
    pub fn new(origin: impl Into<String>) -> Self {
        Self::with_selectors(origin, ItemSelectors::default())
    }

    pub fn with_selectors(origin: impl Into<String>, selectors: ItemSelectors) -> Self {
        Self {
            selectors,
            origin: origin.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn selectors(&self) -> &ItemSelectors {
        &self.selectors
    }

    /// Extracts one item; never fails
    pub fn extract<E: ElementHandle>(&self, item: &E) -> Extraction {
        match self.read_item(item) {
            Ok(record) if record.body.is_empty() => Extraction::Empty,
            Ok(record) => Extraction::Record(record),
            Err(e) => Extraction::Failed(e),
        }
    }

    fn read_item<E: ElementHandle>(&self, item: &E) -> Result<RawRecord, BrowseError> {
        let s = &self.selectors;

        let author_handle = first_text(item, &s.author)?;
        let body = first_text(item, &s.body)?;

        let posted_at = match item.query(&s.posted_at)? {
            Some(time) => time.attribute(&s.posted_at_attribute)?,
            None => None,
        };

        let engagement = self.read_engagement(item)?;

        let permalink = match item.query(&s.permalink)? {
            Some(link) => link
                .attribute("href")?
                .filter(|href| !href.is_empty())
                .map(|href| absolutize(&self.origin, &href)),
            None => None,
        };

        Ok(RawRecord {
            author_handle,
            posted_at,
            mentions: mentions_in(&body),
            tags: tags_in(&body),
            body,
            engagement,
            permalink,
        })
    }

    fn read_engagement<E: ElementHandle>(
        &self,
        item: &E,
    ) -> Result<BTreeMap<String, u64>, BrowseError> {
        let mut engagement = BTreeMap::new();
        for metric in item.query_all(&self.selectors.metrics)? {
            // One unreadable metric only costs that metric
            let label = match metric.attribute(&self.selectors.metric_label_attribute) {
                Ok(Some(label)) => label,
                Ok(None) => continue,
                Err(e) => {
                    tracing::trace!("Skipping unreadable metric: {}", e);
                    continue;
                }
            };
            if let Some((name, count)) = parse_metric_label(&label) {
                engagement.insert(name, count);
            }
        }
        Ok(engagement)
    }
}

fn first_text<E: ElementHandle>(item: &E, selector: &str) -> Result<String, BrowseError> {
    match item.query(selector)? {
        Some(element) => element.text(),
        None => Ok(String::new()),
    }
}

/// `@handle` tokens in order of appearance
pub fn mentions_in(text: &str) -> Vec<String> {
    scan_tokens(&MENTION_PATTERN, text)
}

/// `#tag` tokens in order of appearance
pub fn tags_in(text: &str) -> Vec<String> {
    scan_tokens(&TAG_PATTERN, text)
}

fn scan_tokens(pattern: &Regex, text: &str) -> Vec<String> {
    pattern
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Parses an engagement label such as `"1,234 Likes"` into `("likes", 1234)`
///
/// Thousands separators are dropped and anything after a `.` is truncated.
/// Labels that do not start with a number followed by a word give `None`.
pub fn parse_metric_label(label: &str) -> Option<(String, u64)> {
    let captures = METRIC_LABEL.captures(label)?;
    let digits = captures.get(1)?.as_str().replace(',', "");
    let whole = digits.split('.').next()?;
    let count = whole.parse::<u64>().ok()?;
    let name = captures.get(2)?.as_str().to_lowercase();
    Some((name, count))
}

/// Resolves a link against the feed origin
///
/// Links that cannot be resolved are returned as found.
pub fn absolutize(origin: &str, href: &str) -> String {
    Url::parse(origin)
        .and_then(|base| base.join(href))
        .map(String::from)
        .unwrap_or_else(|_| href.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::HtmlElement;
    use crate::crawler::testing::{tweet_html, ScriptedItem};

    fn extractor() -> RecordExtractor {
        RecordExtractor::new("https://twitter.com")
    }

    fn item(html: &str) -> HtmlElement {
        HtmlElement::parse(html).unwrap()
    }

    #[test]
    fn test_full_item() {
        let html = r#"
            <article>
                <div dir="ltr"><span>trader_pro</span></div>
                <div lang="en">Nifty breaking out @stock_guru @alice #nifty50 #sensex #nifty50</div>
                <time datetime="2024-05-01T10:00:00.000Z">2h</time>
                <div data-testid="reply" aria-label="12 Replies. Reply"></div>
                <div data-testid="retweet" aria-label="1,234 Reposts. Repost"></div>
                <div data-testid="like" aria-label="5.6 Likes"></div>
                <a href="/trader_pro/status/1790000000000000000">2h</a>
            </article>
        "#;

        let record = extractor().extract(&item(html)).into_record().unwrap();

        assert_eq!(record.author_handle, "trader_pro");
        assert_eq!(
            record.body,
            "Nifty breaking out @stock_guru @alice #nifty50 #sensex #nifty50"
        );
        assert_eq!(record.posted_at.as_deref(), Some("2024-05-01T10:00:00.000Z"));
        assert_eq!(record.engagement.get("replies"), Some(&12));
        assert_eq!(record.engagement.get("reposts"), Some(&1234));
        assert_eq!(record.engagement.get("likes"), Some(&5));
        assert_eq!(record.mentions, vec!["@stock_guru", "@alice"]);
        assert_eq!(record.tags, vec!["#nifty50", "#sensex", "#nifty50"]);
        assert_eq!(
            record.permalink.as_deref(),
            Some("https://twitter.com/trader_pro/status/1790000000000000000")
        );
    }

    #[test]
    fn test_empty_body_is_null() {
        let html = r#"<article><div dir="ltr"><span>bob</span></div><div lang="en"></div></article>"#;
        assert!(matches!(extractor().extract(&item(html)), Extraction::Empty));

        let html = r#"<article><div dir="ltr"><span>bob</span></div></article>"#;
        assert!(extractor().extract(&item(html)).into_record().is_none());
    }

    #[test]
    fn test_missing_fields_get_zero_values() {
        let record = extractor()
            .extract(&item(r#"<article><div lang="en">just text</div></article>"#))
            .into_record()
            .unwrap();

        assert_eq!(record.author_handle, "");
        assert_eq!(record.posted_at, None);
        assert!(record.engagement.is_empty());
        assert!(record.mentions.is_empty());
        assert!(record.tags.is_empty());
        assert_eq!(record.permalink, None);
    }

    #[test]
    fn test_unmatched_metrics_are_omitted() {
        let html = r#"
            <article>
                <div lang="en">post</div>
                <div data-testid="like" aria-label="Like"></div>
                <div data-testid="reply"></div>
                <div data-testid="retweet" aria-label="7 Reposts"></div>
            </article>
        "#;
        let record = extractor().extract(&item(html)).into_record().unwrap();
        assert_eq!(record.engagement.len(), 1);
        assert_eq!(record.engagement.get("reposts"), Some(&7));
    }

    #[test]
    fn test_absolute_permalink_kept() {
        let html = r#"<article><div lang="en">x</div><a href="https://x.com/a/status/1">t</a></article>"#;
        let record = extractor().extract(&item(html)).into_record().unwrap();
        assert_eq!(record.permalink.as_deref(), Some("https://x.com/a/status/1"));
    }

    #[test]
    fn test_unreadable_item_is_failure() {
        let outcome = extractor().extract(&ScriptedItem::Broken);
        assert!(matches!(outcome, Extraction::Failed(BrowseError::Element(_))));
        assert!(outcome.into_record().is_none());
    }

    #[test]
    fn test_generated_item_roundtrip() {
        let html = tweet_html("hello #rust", Some("2024-01-01T00:00:00Z"));
        let record = extractor().extract(&item(&html)).into_record().unwrap();
        assert_eq!(record.body, "hello #rust");
        assert_eq!(record.tags, vec!["#rust"]);
    }

    #[test]
    fn test_parse_metric_label() {
        assert_eq!(parse_metric_label("42 Likes"), Some(("likes".to_string(), 42)));
        assert_eq!(
            parse_metric_label("1,234,567 Reposts"),
            Some(("reposts".to_string(), 1_234_567))
        );
        assert_eq!(parse_metric_label("3.9 Replies"), Some(("replies".to_string(), 3)));
        assert_eq!(parse_metric_label("1.5K Likes"), None);
        assert_eq!(parse_metric_label("Like"), None);
        assert_eq!(parse_metric_label(". Likes"), None);
        assert_eq!(parse_metric_label(""), None);
    }

    #[test]
    fn test_absolutize() {
        assert_eq!(
            absolutize("https://twitter.com", "/a/status/1"),
            "https://twitter.com/a/status/1"
        );
        assert_eq!(
            absolutize("https://twitter.com", "//cdn.example.com/a/status/1"),
            "https://cdn.example.com/a/status/1"
        );
        assert_eq!(
            absolutize("https://twitter.com", "https://x.com/a/status/1"),
            "https://x.com/a/status/1"
        );
        assert_eq!(
            absolutize("https://twitter.com", "a/status/1"),
            "https://twitter.com/a/status/1"
        );
    }

    #[test]
    fn test_absolutize_keeps_link_when_origin_is_unusable() {
        assert_eq!(absolutize("not a url", "/a/status/1"), "/a/status/1");
    }
}
