//! Markdown summary generation
//!
//! This module generates human-readable markdown summaries of a run,
//! including per-tag walk outcomes, audience statistics and signal highlights.

use crate::output::{OutputResult, RunSummary};
use crate::storage::ScoredPost;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Longest body excerpt shown in a table cell
const EXCERPT_CHARS: usize = 80;

/// Generates a markdown summary of a run
///
/// # Arguments
///
/// * `summary` - The run summary data
/// * `output_path` - Path where the markdown file should be written
///
/// # Returns
///
/// * `Ok(())` - Successfully wrote markdown summary
/// * `Err(OutputError)` - Failed to write summary
pub fn generate_markdown_summary(summary: &RunSummary, output_path: &Path) -> OutputResult<()> {
    let markdown = format_markdown_summary(summary);

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Single-line, pipe-safe excerpt of a post body
fn excerpt(body: &str) -> String {
    let flat = body.replace('|', "\\|").replace('\n', " ");
    if flat.chars().count() <= EXCERPT_CHARS {
        flat
    } else {
        let cut: String = flat.chars().take(EXCERPT_CHARS).collect();
        format!("{}...", cut)
    }
}

fn push_scored(md: &mut String, label: &str, post: &ScoredPost) {
    let author = if post.author_handle.is_empty() {
        "unknown"
    } else {
        post.author_handle.as_str()
    };
    md.push_str(&format!(
        "- **{}** ({:+.3}) by {}: {}\n",
        label,
        post.score,
        author,
        excerpt(&post.body)
    ));
    if let Some(link) = &post.permalink {
        md.push_str(&format!("  - {}\n", link));
    }
}

/// Formats a run summary as markdown
///
/// # Arguments
///
/// * `summary` - The run summary data
///
/// # Returns
///
/// A formatted markdown string
pub fn format_markdown_summary(summary: &RunSummary) -> String {
    let mut md = String::new();

    md.push_str("# Tagpulse Run Summary\n\n");

    // Run metadata
    md.push_str("## Run Information\n\n");
    md.push_str(&format!("- **Run ID**: {}\n", summary.run_id));
    md.push_str(&format!("- **Started**: {}\n", summary.started_at));
    if let Some(finished) = &summary.finished_at {
        md.push_str(&format!("- **Finished**: {}\n", finished));
    }
    if let Some(duration) = summary.duration_seconds {
        md.push_str(&format!(
            "- **Duration**: {} seconds ({:.2} minutes)\n",
            duration,
            duration as f64 / 60.0
        ));
    }
    md.push_str(&format!("- **Status**: {}\n", summary.status));
    if let Some(source) = &summary.record_source {
        md.push_str(&format!("- **Record Source**: {}\n", source));
    }
    md.push_str(&format!("- **Config Hash**: {}\n\n", summary.config_hash));

    // Overall statistics
    md.push_str("## Overall Statistics\n\n");
    md.push_str(&format!(
        "- **Records Collected**: {}\n",
        summary.records_collected()
    ));
    md.push_str(&format!("- **New Posts Stored**: {}\n", summary.posts_in_run));
    md.push_str(&format!("- **Total Posts**: {}\n", summary.total_posts));
    md.push_str(&format!("- **Unique Authors**: {}\n", summary.unique_authors));
    if let Some((earliest, latest)) = &summary.posted_range {
        md.push_str(&format!("- **Posted Between**: {} and {}\n", earliest, latest));
    }
    md.push('\n');

    // Walks
    if !summary.walks.is_empty() {
        md.push_str("## Tag Walks\n\n");
        md.push_str("| Tag | Records | Stop Reason | Passes | Scrolls | Duplicates | Failures |\n");
        md.push_str("|-----|---------|-------------|--------|---------|------------|----------|\n");
        for walk in &summary.walks {
            let reason = walk
                .stop_reason
                .map(|r| r.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            md.push_str(&format!(
                "| #{} | {} | {} | {} | {} | {} | {} |\n",
                walk.tag,
                walk.records,
                reason,
                walk.passes,
                walk.scroll_attempts,
                walk.duplicates,
                walk.extraction_failures
            ));
        }
        md.push('\n');
    }

    if !summary.top_hashtags.is_empty() {
        md.push_str("## Top Hashtags\n\n");
        md.push_str("| Hashtag | Posts |\n");
        md.push_str("|---------|-------|\n");
        for (tag, count) in &summary.top_hashtags {
            md.push_str(&format!("| {} | {} |\n", tag, count));
        }
        md.push('\n');
    }

    if !summary.top_authors.is_empty() {
        md.push_str("## Most Active Authors\n\n");
        md.push_str("| Author | Posts |\n");
        md.push_str("|--------|-------|\n");
        for (author, count) in &summary.top_authors {
            md.push_str(&format!("| @{} | {} |\n", author, count));
        }
        md.push('\n');
    }

    // Signals
    let signals = &summary.signals;
    if signals.count > 0 {
        md.push_str("## Signals\n\n");
        md.push_str(&format!("- **Scored Posts**: {}\n", signals.count));
        md.push_str(&format!("- **Mean Score**: {:.3}\n", signals.mean_score));
        md.push_str(&format!(
            "- **Mean Confidence**: {:.3}\n",
            signals.mean_confidence
        ));
        if let Some(post) = &signals.strongest_positive {
            push_scored(&mut md, "Strongest positive", post);
        }
        if let Some(post) = &signals.strongest_negative {
            push_scored(&mut md, "Strongest negative", post);
        }
        md.push('\n');
    }

    if !summary.recent_posts.is_empty() {
        md.push_str("## Latest Posts\n\n");
        md.push_str("| Posted | Author | Post |\n");
        md.push_str("|--------|--------|------|\n");
        for post in &summary.recent_posts {
            md.push_str(&format!(
                "| {} | @{} | {} |\n",
                post.posted_at.as_deref().unwrap_or("-"),
                post.author_handle,
                excerpt(&post.body)
            ));
        }
        md.push('\n');
    }

    md
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::StopReason;
    use crate::storage::{SignalSummary, WalkRecord};

    fn create_test_summary() -> RunSummary {
        RunSummary {
            run_id: 1,
            started_at: "2024-01-01T00:00:00Z".to_string(),
            finished_at: Some("2024-01-01T00:10:00Z".to_string()),
            duration_seconds: Some(600),
            status: "completed".to_string(),
            config_hash: "abc123".to_string(),
            record_source: Some("crawled".to_string()),
            posts_in_run: 42,
            total_posts: 1000,
            unique_authors: 57,
            ..RunSummary::default()
        }
    }

    #[test]
    fn test_format_markdown_summary() {
        let markdown = format_markdown_summary(&create_test_summary());

        assert!(markdown.contains("# Tagpulse Run Summary"));
        assert!(markdown.contains("Run ID"));
        assert!(markdown.contains("- **Record Source**: crawled"));
        assert!(markdown.contains("- **Total Posts**: 1000"));
        assert!(markdown.contains("- **Unique Authors**: 57"));
        assert!(!markdown.contains("## Signals"));
    }

    #[test]
    fn test_markdown_with_walks() {
        let mut summary = create_test_summary();
        summary.walks = vec![WalkRecord {
            run_id: 1,
            tag: "nifty50".to_string(),
            records: 37,
            stop_reason: Some(StopReason::Cutoff),
            passes: 6,
            scroll_attempts: 5,
            duplicates: 12,
            empty_items: 0,
            extraction_failures: 1,
        }];

        let markdown = format_markdown_summary(&summary);

        assert!(markdown.contains("## Tag Walks"));
        assert!(markdown.contains("| #nifty50 | 37 | cutoff | 6 | 5 | 12 | 1 |"));
        assert!(markdown.contains("- **Records Collected**: 37"));
    }

    #[test]
    fn test_markdown_with_signals() {
        let mut summary = create_test_summary();
        summary.signals = SignalSummary {
            count: 2,
            mean_score: 0.0,
            mean_confidence: 1.0,
            strongest_positive: Some(ScoredPost {
                content_hash: "h".to_string(),
                author_handle: "trader_pro".to_string(),
                body: "Nifty | breakout".to_string(),
                permalink: Some("https://twitter.com/trader_pro/status/1".to_string()),
                score: 1.0,
            }),
            strongest_negative: None,
        };

        let markdown = format_markdown_summary(&summary);

        assert!(markdown.contains("## Signals"));
        assert!(markdown.contains("(+1.000) by trader_pro: Nifty \\| breakout"));
        assert!(markdown.contains("https://twitter.com/trader_pro/status/1"));
    }

    #[test]
    fn test_excerpt_truncates() {
        let long = "x".repeat(200);
        let cut = excerpt(&long);
        assert_eq!(cut.chars().count(), EXCERPT_CHARS + 3);
        assert!(cut.ends_with("..."));
        assert_eq!(excerpt("short"), "short");
    }

    #[test]
    fn test_generate_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.md");

        generate_markdown_summary(&create_test_summary(), &path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("# Tagpulse Run Summary"));
    }
}
