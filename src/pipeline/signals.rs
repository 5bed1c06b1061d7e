//! Per-post signal scoring
//!
//! Posts are embedded with TF-IDF and projected onto the dominant direction of
//! the corpus (the first right singular vector of the TF-IDF matrix). The
//! projections are z-scored, so a score says how strongly a post leans along
//! the main theme of this batch relative to the others.

use crate::config::SignalConfig;
use crate::pipeline::CleanPost;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

#[allow(clippy::expect_used)]
static TOKEN_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\w\w+\b").expect("valid regex"));

const POWER_ITERATIONS: usize = 200;
const CONVERGENCE: f64 = 1e-12;
const STD_EPSILON: f64 = 1e-9;

/// Score for one post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub content_hash: String,
    pub permalink: Option<String>,
    pub posted_at: Option<DateTime<Utc>>,
    /// Z-scored projection on the dominant component
    pub score: f64,
    /// Magnitude of `score`
    pub confidence: f64,
}

/// Sparse TF-IDF row: (term index, weight)
type Row = Vec<(usize, f64)>;

/// Lowercased word tokens of at least two characters
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    TOKEN_PATTERN
        .find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// All contiguous n-grams for n in `1..=max_n`, joined by single spaces
pub fn ngrams(tokens: &[String], max_n: usize) -> Vec<String> {
    let mut grams = Vec::new();
    for n in 1..=max_n.max(1) {
        if n > tokens.len() {
            break;
        }
        grams.extend(tokens.windows(n).map(|window| window.join(" ")));
    }
    grams
}

/// Picks up to `max_features` terms by total corpus frequency
///
/// Ties are broken alphabetically. Returns term to column index.
fn build_vocabulary(docs: &[Vec<String>], max_features: usize) -> HashMap<String, usize> {
    let mut frequency: BTreeMap<&str, usize> = BTreeMap::new();
    for doc in docs {
        for term in doc {
            *frequency.entry(term.as_str()).or_insert(0) += 1;
        }
    }

    let mut ranked: Vec<(&str, usize)> = frequency.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked.truncate(max_features);

    let mut terms: Vec<&str> = ranked.into_iter().map(|(term, _)| term).collect();
    terms.sort_unstable();
    terms
        .into_iter()
        .enumerate()
        .map(|(index, term)| (term.to_string(), index))
        .collect()
}

/// L2-normalized TF-IDF rows with smooth idf
fn tfidf_rows(docs: &[Vec<String>], vocabulary: &HashMap<String, usize>) -> Vec<Row> {
    let n = docs.len() as f64;

    let counts: Vec<BTreeMap<usize, f64>> = docs
        .iter()
        .map(|doc| {
            let mut tf = BTreeMap::new();
            for term in doc {
                if let Some(&index) = vocabulary.get(term) {
                    *tf.entry(index).or_insert(0.0) += 1.0;
                }
            }
            tf
        })
        .collect();

    let mut document_frequency = vec![0usize; vocabulary.len()];
    for tf in &counts {
        for &index in tf.keys() {
            document_frequency[index] += 1;
        }
    }
    let idf: Vec<f64> = document_frequency
        .iter()
        .map(|&df| ((1.0 + n) / (1.0 + df as f64)).ln() + 1.0)
        .collect();

    counts
        .into_iter()
        .map(|tf| {
            let mut row: Row = tf
                .into_iter()
                .map(|(index, count)| (index, count * idf[index]))
                .collect();
            let norm = row.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
            if norm > 0.0 {
                for (_, w) in &mut row {
                    *w /= norm;
                }
            }
            row
        })
        .collect()
}

fn dot(row: &Row, vector: &[f64]) -> f64 {
    row.iter().map(|&(index, w)| w * vector[index]).sum()
}

/// First right singular vector of the row matrix by power iteration on XᵀX
///
/// Starts from the uniform vector; the result's largest-magnitude entry is
/// non-negative.
fn dominant_direction(rows: &[Row], columns: usize) -> Vec<f64> {
    if columns == 0 {
        return Vec::new();
    }

    let mut v = vec![1.0 / (columns as f64).sqrt(); columns];
    for _ in 0..POWER_ITERATIONS {
        let mut next = vec![0.0; columns];
        for row in rows {
            let projection = dot(row, &v);
            for &(index, w) in row {
                next[index] += w * projection;
            }
        }

        let norm = next.iter().map(|x| x * x).sum::<f64>().sqrt();
        if norm == 0.0 {
            return vec![0.0; columns];
        }
        for x in &mut next {
            *x /= norm;
        }

        let delta: f64 = next.iter().zip(&v).map(|(a, b)| (a - b).powi(2)).sum();
        v = next;
        if delta < CONVERGENCE {
            break;
        }
    }

    let pivot = v
        .iter()
        .copied()
        .fold(0.0_f64, |best, x| if x.abs() > best.abs() { x } else { best });
    if pivot < 0.0 {
        for x in &mut v {
            *x = -*x;
        }
    }
    v
}

/// `(x - mean) / (std + 1e-9)` with the population standard deviation
fn z_scores(values: &[f64]) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    let std = variance.sqrt();
    values
        .iter()
        .map(|x| (x - mean) / (std + STD_EPSILON))
        .collect()
}

/// Scores every post against the batch's dominant theme
///
/// # Arguments
///
/// * `posts` - Cleaned posts
/// * `config` - Vocabulary size and n-gram range
///
/// # Returns
///
/// One signal per post, in input order. Empty input gives empty output.
pub fn compute_signals(posts: &[CleanPost], config: &SignalConfig) -> Vec<Signal> {
    if posts.is_empty() {
        return Vec::new();
    }

    let docs: Vec<Vec<String>> = posts
        .iter()
        .map(|post| ngrams(&tokenize(&post.body), config.ngram_max))
        .collect();
    let vocabulary = build_vocabulary(&docs, config.max_features);
    let rows = tfidf_rows(&docs, &vocabulary);
    let direction = dominant_direction(&rows, vocabulary.len());

    let projections: Vec<f64> = if direction.is_empty() {
        vec![0.0; rows.len()]
    } else {
        rows.iter().map(|row| dot(row, &direction)).collect()
    };
    let scores = z_scores(&projections);

    tracing::debug!(
        "Scored {} posts over {} terms",
        posts.len(),
        vocabulary.len()
    );

    posts
        .iter()
        .zip(scores)
        .map(|(post, score)| Signal {
            content_hash: post.content_hash.clone(),
            permalink: post.permalink.clone(),
            posted_at: post.posted_at,
            score,
            confidence: score.abs(),
        })
        .collect()
}
