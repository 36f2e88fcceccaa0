// src/ingest/mod.rs
pub mod queries;
pub mod sources;
pub mod types;

use crate::classify::CategoryClassifier;
use crate::ingest::types::{ArticleSource, RawArticle};
use crate::model::Category;
use chrono::{DateTime, Duration, Utc};
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use std::collections::HashSet;

/// Titles at least this similar (normalized Levenshtein) count as duplicates.
const NEAR_DUPLICATE_SIMILARITY: f64 = 0.9;
const MAX_TEXT_CHARS: usize = 4000;

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "source_fetched_total",
            "Articles returned by the news provider."
        );
        describe_counter!(
            "source_errors_total",
            "Soft failures of the news provider (timeout, rate limit, bad payload)."
        );
        describe_counter!(
            "source_dropped_total",
            "Candidates dropped as stale, untagged for this category, or duplicate."
        );
    });
}

/// Normalize provider text: decode entities, strip tags and truncation markers,
/// straighten quotes, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, "").to_string();

    // 3) NewsAPI body truncation marker: "… [+1234 chars]"
    static RE_TRUNC: OnceCell<regex::Regex> = OnceCell::new();
    let re_trunc = RE_TRUNC.get_or_init(|| regex::Regex::new(r"\s*\[\+\d+ chars\]\s*$").unwrap());
    out = re_trunc.replace(&out, "").to_string();

    // 4) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 5) Collapse whitespace
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").trim().to_string();

    if out.chars().count() > MAX_TEXT_CHARS {
        out = out.chars().take(MAX_TEXT_CHARS).collect();
    }
    out
}

fn title_key(title: &str) -> String {
    title.trim().to_lowercase()
}

/// Turn a provider batch into the candidate list for one category:
/// drop stale and foreign-category articles, collapse duplicates,
/// order by recency (newest first) and cap at `max`.
pub fn prepare_candidates(
    now: DateTime<Utc>,
    raw: Vec<RawArticle>,
    category: Category,
    window: Duration,
    classifier: &CategoryClassifier,
    max: usize,
) -> Vec<RawArticle> {
    ensure_metrics_described();
    let cutoff = now - window;
    let total = raw.len();

    let mut fresh: Vec<RawArticle> = raw
        .into_iter()
        .filter(|a| a.published_at >= cutoff)
        .filter_map(|mut a| {
            if a.category.is_none() {
                a.category = classifier.classify(&a);
            }
            match a.category {
                Some(c) if c != category => None,
                _ => Some(a),
            }
        })
        .collect();
    fresh.sort_by(|a, b| b.published_at.cmp(&a.published_at));

    let mut seen: HashSet<String> = HashSet::new();
    let mut kept: Vec<RawArticle> = Vec::with_capacity(fresh.len().min(max));
    for a in fresh {
        let key = title_key(&a.title);
        if !seen.insert(key.clone()) {
            continue;
        }
        let near_dup = kept.iter().any(|k| {
            strsim::normalized_levenshtein(&title_key(&k.title), &key) >= NEAR_DUPLICATE_SIMILARITY
        });
        if near_dup {
            continue;
        }
        kept.push(a);
        if kept.len() >= max {
            break;
        }
    }

    let dropped = total.saturating_sub(kept.len());
    if dropped > 0 {
        counter!("source_dropped_total", "category" => category.as_str()).increment(dropped as u64);
    }
    kept
}

/// Fetch from `source`, converting any error into an empty batch (soft failure).
pub async fn fetch_candidates(
    source: &dyn ArticleSource,
    category: Category,
    window: Duration,
) -> Vec<RawArticle> {
    ensure_metrics_described();
    match source.fetch(category, window).await {
        Ok(v) => {
            counter!("source_fetched_total", "category" => category.as_str())
                .increment(v.len() as u64);
            tracing::debug!(
                target: "ingest",
                category = %category,
                provider = source.name(),
                count = v.len(),
                "fetched candidates"
            );
            v
        }
        Err(e) => {
            tracing::warn!(
                target: "ingest",
                error = %e,
                category = %category,
                provider = source.name(),
                "provider error, treating category as empty"
            );
            counter!("source_errors_total", "category" => category.as_str()).increment(1);
            Vec::new()
        }
    }
}
