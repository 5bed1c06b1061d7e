//! Integration tests for the crawler
//!
//! These tests serve feed pages from a wiremock server and walk them with the
//! static backend, from a single tag up to a full pipeline run.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tagpulse::browser::StaticLauncher;
use tagpulse::config::{Backend, Config};
use tagpulse::storage::{RunStatus, SqliteStorage, Storage};
use tagpulse::{run_pipeline, FrozenClock, RecordSource, StopReason, TagCrawler};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn now() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-05-02T00:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

/// One feed item in the markup the default selectors read
fn post(author: &str, body: &str, posted_at: Option<&str>) -> String {
    let time = posted_at
        .map(|ts| format!(r#"<time datetime="{}">t</time>"#, ts))
        .unwrap_or_default();
    format!(
        r#"<article><div dir="ltr"><span>{}</span></div><div lang="en">{}</div>{}<div data-testid="like" aria-label="7 Likes"></div></article>"#,
        author, body, time
    )
}

fn feed_page(items: &[String]) -> String {
    format!(
        "<html><body><main>{}</main></body></html>",
        items.join("\n")
    )
}

async fn mount_feed(server: &MockServer, tag: &str, items: &[String]) {
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", tag))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(feed_page(items))
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

/// Creates a config pointing the static backend at the mock server, with no pauses
fn create_test_config(origin: &str, tags: &[&str], db_path: &str, summary_path: &str) -> Config {
    let mut config: Config = toml::from_str(&format!(
        r#"
        [crawler]
        tags = []
        max-per-tag = 50
        lookback-hours = 24

        [timing]
        navigation-timeout-ms = 5000
        load-wait-timeout-ms = 5000
        settle-delay-ms = 0
        scroll-jitter-min-ms = 0
        scroll-jitter-max-ms = 0
        tag-pacing-min-ms = 0
        tag-pacing-max-ms = 0

        [source]
        backend = "static"
        origin = "{}"
        search-path = "/search?q={{tag}}"

        [output]
        database-path = "{}"
        summary-path = "{}"

        [fallback]
        enabled = false
        "#,
        origin, db_path, summary_path
    ))
    .expect("test config parses");
    config.crawler.tags = tags.iter().map(|t| t.to_string()).collect();
    config
}

#[tokio::test]
async fn test_static_feed_walk_stalls_with_all_items() {
    let server = MockServer::start().await;
    mount_feed(
        &server,
        "nifty50",
        &[
            post("alice", "nifty breakout above 22500 #nifty50", Some("2024-05-01T10:00:00Z")),
            post("bob", "watching @carol on #banknifty", Some("2024-05-01T11:00:00Z")),
            post("dave", "no timestamp on this one", None),
        ],
    )
    .await;

    let config = create_test_config(&server.uri(), &["nifty50"], "unused.db", "unused.md");
    assert_eq!(config.source.backend, Backend::Static);
    let crawler = TagCrawler::new(&config, StaticLauncher, FrozenClock::new(now()));

    let report = crawler.collect().await.expect("crawl succeeds");

    assert_eq!(report.len(), 3);
    assert_eq!(report.walks.len(), 1);
    let walk = &report.walks[0];
    assert_eq!(walk.stop_reason, StopReason::Stalled);
    // the static page never grows, so the first pass is the only productive one
    assert_eq!(walk.stats.passes, 4);
    assert_eq!(walk.stats.duplicates, 9);

    let first = &report.records[0];
    assert_eq!(first.author_handle, "alice");
    assert_eq!(first.tags, vec!["#nifty50".to_string()]);
    assert_eq!(first.engagement.get("likes"), Some(&7));
    assert_eq!(report.records[1].mentions, vec!["@carol".to_string()]);
    assert!(report.records[2].posted_at.is_none());
}

#[tokio::test]
async fn test_static_feed_walk_stops_at_cutoff() {
    let server = MockServer::start().await;
    mount_feed(
        &server,
        "sensex",
        &[
            post("alice", "fresh", Some("2024-05-01T18:00:00Z")),
            post("bob", "stale", Some("2024-04-29T09:00:00Z")),
            post("carol", "never read", Some("2024-05-01T19:00:00Z")),
        ],
    )
    .await;

    let config = create_test_config(&server.uri(), &["sensex"], "unused.db", "unused.md");
    let crawler = TagCrawler::new(&config, StaticLauncher, FrozenClock::new(now()));

    let report = crawler.collect().await.expect("crawl succeeds");

    assert_eq!(report.cutoff, now() - ChronoDuration::hours(24));
    assert_eq!(report.len(), 1);
    assert_eq!(report.records[0].body, "fresh");
    assert_eq!(report.walks[0].stop_reason, StopReason::Cutoff);
}

#[tokio::test]
async fn test_rate_limited_feed_yields_empty_walk() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let config = create_test_config(&server.uri(), &["intraday"], "unused.db", "unused.md");
    let crawler = TagCrawler::new(&config, StaticLauncher, FrozenClock::new(now()));

    let report = crawler.collect().await.expect("rate limiting is not fatal");

    assert!(report.is_empty());
    assert_eq!(report.walks[0].stop_reason, StopReason::Stalled);
}

#[tokio::test]
async fn test_multiple_tags_collected_in_order() {
    let server = MockServer::start().await;
    mount_feed(
        &server,
        "sensex",
        &[post("s", "sensex up", Some("2024-05-01T12:00:00Z"))],
    )
    .await;
    mount_feed(
        &server,
        "nifty50",
        &[
            post("n", "nifty one", Some("2024-05-01T12:00:00Z")),
            post("n", "nifty two", Some("2024-05-01T12:00:00Z")),
        ],
    )
    .await;

    let config = create_test_config(
        &server.uri(),
        &["nifty50", "sensex"],
        "unused.db",
        "unused.md",
    );
    let crawler = TagCrawler::new(&config, StaticLauncher, FrozenClock::new(now()));

    let report = crawler.collect().await.expect("crawl succeeds");

    let bodies: Vec<_> = report.records.iter().map(|r| r.body.as_str()).collect();
    assert_eq!(bodies, vec!["nifty one", "nifty two", "sensex up"]);
    let walked: Vec<_> = report.walks.iter().map(|w| w.tag.as_str()).collect();
    assert_eq!(walked, vec!["nifty50", "sensex"]);
}

#[tokio::test]
async fn test_tag_with_query_characters_is_sent_intact() {
    let server = MockServer::start().await;
    mount_feed(
        &server,
        "s&p500",
        &[post("alice", "index at highs", Some("2024-05-01T12:00:00Z"))],
    )
    .await;

    let config = create_test_config(&server.uri(), &["s&p500"], "unused.db", "unused.md");
    let crawler = TagCrawler::new(&config, StaticLauncher, FrozenClock::new(now()));

    let report = crawler.collect().await.expect("crawl succeeds");

    assert_eq!(report.len(), 1);
    assert_eq!(report.records[0].body, "index at highs");
}

#[tokio::test]
async fn test_pipeline_run_stores_posts_once() {
    let server = MockServer::start().await;
    mount_feed(
        &server,
        "nifty50",
        &[
            post("alice", "nifty breakout above 22500 #nifty50", Some("2024-05-01T10:00:00Z")),
            post("bob", "banknifty weak into expiry #banknifty", Some("2024-05-01T11:00:00Z")),
            post("carol", "sensex and nifty both green #sensex", Some("2024-05-01T12:00:00Z")),
        ],
    )
    .await;

    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("pulse.db");
    let config = create_test_config(
        &server.uri(),
        &["nifty50"],
        &db_path.to_string_lossy(),
        &dir.path().join("summary.md").to_string_lossy(),
    );
    let mut storage = SqliteStorage::new(&db_path).expect("open database");

    let first = run_pipeline(
        &config,
        "hash",
        StaticLauncher,
        FrozenClock::new(now()),
        &mut storage,
    )
    .await
    .expect("first run");
    let second = run_pipeline(
        &config,
        "hash",
        StaticLauncher,
        FrozenClock::new(now()),
        &mut storage,
    )
    .await
    .expect("second run");

    assert_eq!(first.source, RecordSource::Crawled);
    assert_eq!(first.stored, 3);
    assert_eq!(first.signals, 3);
    assert_eq!(second.stored, 0);
    assert_eq!(storage.count_posts().unwrap(), 3);

    let run = storage.get_run(second.run_id).unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.record_source, Some(RecordSource::Crawled));
}

#[tokio::test]
async fn test_full_run_writes_summary() {
    let server = MockServer::start().await;
    let recent = (Utc::now() - ChronoDuration::hours(1)).to_rfc3339();
    mount_feed(
        &server,
        "intraday",
        &[
            post("alice", "intraday scalp on #nifty50", Some(&recent)),
            post("bob", "closing strong #intraday", Some(&recent)),
        ],
    )
    .await;

    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("pulse.db");
    let summary_path = dir.path().join("summary.md");
    let config = create_test_config(
        &server.uri(),
        &["intraday"],
        &db_path.to_string_lossy(),
        &summary_path.to_string_lossy(),
    );

    let outcome = tagpulse::runner::run(&config, "hash")
        .await
        .expect("run succeeds");

    assert_eq!(outcome.records, 2);
    let summary = std::fs::read_to_string(&summary_path).expect("summary written");
    assert!(summary.contains("intraday"));
    assert!(summary.contains("alice"));
}
