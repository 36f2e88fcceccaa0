// src/editorial/mod.rs
//! Editorial stage: pick the most noteworthy candidate of a category and
//! rewrite it into the house short form.
//!
//! Both model calls are soft: a failed selection falls back to the most
//! recent candidate, a failed rewrite falls back to the source's own title and
//! description. Only an empty candidate list yields no story.

pub mod ai_adapter;
pub mod prompts;

use std::time::Duration;

use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tokio::time::Instant;

use crate::editorial::ai_adapter::{parse_json_reply, CompletionRequest, DynGenerator};
use crate::ingest::types::RawArticle;
use crate::model::{Category, Story, PARAGRAPH_BREAK};

/// Decoding parameters are fixed so output length and variability stay predictable.
pub const TEMPERATURE: f32 = 0.7;
pub const SELECTION_MAX_TOKENS: u32 = 150;
/// Roughly 250 words of output.
pub const REWRITE_MAX_TOKENS: u32 = 350;
pub const DEFAULT_MAX_CANDIDATES: usize = 10;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EditorialError {
    #[error("model call timed out after {0:?}")]
    Timeout(Duration),
    #[error("model endpoint returned HTTP {0}")]
    Status(u16),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("model returned an empty reply")]
    EmptyReply,
    #[error("invalid model reply: {0}")]
    Invalid(String),
    #[error("text generation disabled")]
    Disabled,
    #[error("no candidates")]
    NoCandidates,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub index: usize,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewrite {
    pub headline: String,
    pub content: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SelectionReply {
    selected_index: i64,
    reason: String,
}

#[derive(Deserialize)]
struct RewriteReply {
    headline: String,
    content: String,
}

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "editorial_fallback_total",
            "Editorial calls that failed and used the fallback (stage=select|rewrite)."
        );
        describe_counter!("editorial_stories_total", "Stories produced by the editorial stage.");
    });
}

/// Short, stable hex id derived from `text` (first 6 bytes of SHA-256).
pub fn short_hash(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    digest.iter().take(6).map(|b| format!("{b:02x}")).collect()
}

pub fn placeholder_image(category: Category) -> String {
    format!("https://placehold.co/600x400?text={category}+News")
}

pub struct EditorialProcessor {
    generator: DynGenerator,
    call_timeout: Duration,
    max_candidates: usize,
}

impl EditorialProcessor {
    pub fn new(generator: DynGenerator, call_timeout: Duration) -> Self {
        Self {
            generator,
            call_timeout,
            max_candidates: DEFAULT_MAX_CANDIDATES,
        }
    }

    pub fn with_max_candidates(mut self, n: usize) -> Self {
        self.max_candidates = n.max(1);
        self
    }

    async fn call(&self, req: CompletionRequest<'_>, budget: Duration) -> Result<String, EditorialError> {
        tokio::time::timeout(budget, self.generator.complete(req))
            .await
            .map_err(|_| EditorialError::Timeout(budget))?
    }

    /// Per-call timeout: the configured one, capped at `1/share` of what is
    /// left before `deadline`.
    fn budget(&self, deadline: Option<Instant>, share: u32) -> Duration {
        match deadline {
            Some(d) => self
                .call_timeout
                .min(d.saturating_duration_since(Instant::now()) / share.max(1)),
            None => self.call_timeout,
        }
    }

    /// Ask the model for the most intriguing candidate. The reply must be
    /// `{selectedIndex, reason}` with an in-range index and a non-empty reason.
    pub async fn select(&self, candidates: &[RawArticle]) -> Result<Selection, EditorialError> {
        self.select_within(candidates, self.call_timeout).await
    }

    async fn select_within(
        &self,
        candidates: &[RawArticle],
        budget: Duration,
    ) -> Result<Selection, EditorialError> {
        let n = candidates.len().min(self.max_candidates);
        if n == 0 {
            return Err(EditorialError::NoCandidates);
        }
        let user = prompts::selection_context(&candidates[..n]);
        let req = CompletionRequest {
            system: prompts::SELECTION_SYSTEM,
            user: &user,
            temperature: TEMPERATURE,
            max_tokens: SELECTION_MAX_TOKENS,
        };
        let raw = self.call(req, budget).await?;

        let reply: SelectionReply = parse_json_reply(&raw)?;
        let reason = reply.reason.trim().to_string();
        if reason.is_empty() {
            return Err(EditorialError::Invalid("empty reason".into()));
        }
        let index = usize::try_from(reply.selected_index)
            .ok()
            .filter(|i| *i < n)
            .ok_or_else(|| {
                EditorialError::Invalid(format!(
                    "selectedIndex {} out of range 0..{n}",
                    reply.selected_index
                ))
            })?;
        Ok(Selection { index, reason })
    }

    /// Ask the model for `{headline, content}`; content paragraphs come back
    /// joined by [`PARAGRAPH_BREAK`].
    pub async fn rewrite(
        &self,
        article: &RawArticle,
        category: Category,
    ) -> Result<Rewrite, EditorialError> {
        self.rewrite_within(article, category, self.call_timeout).await
    }

    async fn rewrite_within(
        &self,
        article: &RawArticle,
        category: Category,
        budget: Duration,
    ) -> Result<Rewrite, EditorialError> {
        let user = prompts::rewrite_context(article, category);
        let req = CompletionRequest {
            system: prompts::REWRITE_SYSTEM,
            user: &user,
            temperature: TEMPERATURE,
            max_tokens: REWRITE_MAX_TOKENS,
        };
        let raw = self.call(req, budget).await?;

        let reply: RewriteReply = parse_json_reply(&raw)?;
        let headline = reply.headline.trim().to_string();
        if headline.is_empty() {
            return Err(EditorialError::Invalid("empty headline".into()));
        }
        let content = normalize_paragraphs(&reply.content);
        if content.is_empty() {
            return Err(EditorialError::Invalid("empty content".into()));
        }
        Ok(Rewrite { headline, content })
    }

    /// Produce the category's story, or `None` when there is nothing to pick from.
    pub async fn process(&self, category: Category, candidates: &[RawArticle]) -> Option<Story> {
        self.process_until(category, candidates, None).await
    }

    /// Like [`process`](Self::process), but both model calls finish by
    /// `deadline` so the fallbacks still have time to run. Selection gets at
    /// most half of the remaining time, the rewrite whatever is left.
    pub async fn process_until(
        &self,
        category: Category,
        candidates: &[RawArticle],
        deadline: Option<Instant>,
    ) -> Option<Story> {
        ensure_metrics_described();
        let pool = &candidates[..candidates.len().min(self.max_candidates)];
        if pool.is_empty() {
            return None;
        }

        let index = match self.select_within(pool, self.budget(deadline, 2)).await {
            Ok(sel) => {
                tracing::info!(
                    target: "editorial",
                    category = %category,
                    index = sel.index,
                    reason = %sel.reason,
                    "candidate selected"
                );
                sel.index
            }
            Err(e) => {
                tracing::warn!(
                    target: "editorial",
                    category = %category,
                    error = %e,
                    "selection failed, using most recent candidate"
                );
                counter!("editorial_fallback_total", "stage" => "select").increment(1);
                most_recent(pool)
            }
        };
        let article = &pool[index];

        let (headline, content) = match self
            .rewrite_within(article, category, self.budget(deadline, 1))
            .await
        {
            Ok(r) => (r.headline, r.content),
            Err(e) => {
                tracing::warn!(
                    target: "editorial",
                    category = %category,
                    error = %e,
                    "rewrite failed, using source text"
                );
                counter!("editorial_fallback_total", "stage" => "rewrite").increment(1);
                (article.title.clone(), article.summary_text().to_string())
            }
        };

        counter!("editorial_stories_total", "category" => category.as_str()).increment(1);
        Some(Story {
            id: format!("{category}-{}", short_hash(&article.url)),
            timestamp: article.published_at,
            category,
            headline,
            content,
            source: article.source_name.clone(),
            image: article
                .image_url
                .clone()
                .unwrap_or_else(|| placeholder_image(category)),
            original_url: article.url.clone(),
        })
    }
}

/// Index of the newest candidate; ties keep the earlier position.
fn most_recent(pool: &[RawArticle]) -> usize {
    pool.iter()
        .enumerate()
        .fold(0, |best, (i, a)| {
            if a.published_at > pool[best].published_at {
                i
            } else {
                best
            }
        })
}

/// Turn escaped `\n` sequences into newlines and re-join non-empty paragraphs
/// with [`PARAGRAPH_BREAK`].
pub fn normalize_paragraphs(raw: &str) -> String {
    let unescaped = raw.replace("\\n", "\n");
    unescaped
        .split("\n\n")
        .map(|p| p.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(PARAGRAPH_BREAK)
}
