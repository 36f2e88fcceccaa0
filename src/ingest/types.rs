// src/ingest/types.rs
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::model::Category;

/// Candidate article as delivered by a news provider, after text normalization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawArticle {
    pub title: String,
    pub description: Option<String>,
    pub content: Option<String>,
    pub published_at: DateTime<Utc>,
    pub source_name: String,
    pub image_url: Option<String>,
    pub url: String,
    /// Tag supplied by the provider (e.g. the category the query was issued for).
    pub category: Option<Category>,
}

impl RawArticle {
    /// Description, or body when the provider sent no description.
    pub fn summary_text(&self) -> &str {
        self.description
            .as_deref()
            .filter(|d| !d.is_empty())
            .or(self.content.as_deref())
            .unwrap_or_default()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("rate limited by provider")]
    RateLimited,
    #[error("provider returned HTTP {0}")]
    Status(u16),
    #[error("provider reported error: {0}")]
    Provider(String),
    #[error("malformed payload: {0}")]
    Malformed(String),
    #[error("missing api key")]
    MissingKey,
    #[error("transport error: {0}")]
    Transport(String),
}

#[async_trait::async_trait]
pub trait ArticleSource: Send + Sync {
    /// Fetch recent candidates for `category`, no older than `window`.
    async fn fetch(
        &self,
        category: Category,
        window: Duration,
    ) -> Result<Vec<RawArticle>, SourceError>;
    fn name(&self) -> &'static str;
}
