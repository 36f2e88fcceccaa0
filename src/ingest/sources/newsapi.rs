// src/ingest/sources/newsapi.rs
use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::Deserialize;

use crate::config::SourceConfig;
use crate::ingest::normalize_text;
use crate::ingest::queries::{pick_query, queries_for};
use crate::ingest::types::{ArticleSource, RawArticle, SourceError};
use crate::model::Category;

#[derive(Debug, Deserialize)]
struct NewsApiResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    articles: Vec<NewsApiArticle>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewsApiArticle {
    title: Option<String>,
    description: Option<String>,
    content: Option<String>,
    published_at: Option<String>,
    source: Option<NewsApiSourceRef>,
    url_to_image: Option<String>,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NewsApiSourceRef {
    name: Option<String>,
}

/// NewsAPI-compatible `/everything` search client.
pub struct NewsApiSource {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    page_size: u32,
    timeout: std::time::Duration,
    rotate_queries: bool,
}

impl NewsApiSource {
    pub fn new(cfg: &SourceConfig) -> Result<Self, SourceError> {
        let http = reqwest::Client::builder()
            .user_agent("newsroom-slots/0.1")
            .connect_timeout(std::time::Duration::from_secs(4))
            .build()
            .map_err(|e| SourceError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key: cfg.api_key.clone(),
            page_size: cfg.page_size,
            timeout: std::time::Duration::from_secs(cfg.timeout_secs),
            rotate_queries: true,
        })
    }

    /// Always use the first query of each category (deterministic requests).
    pub fn with_fixed_queries(mut self) -> Self {
        self.rotate_queries = false;
        self
    }

    fn query_for(&self, category: Category) -> &'static str {
        if self.rotate_queries {
            pick_query(category, &mut rand::rng())
        } else {
            queries_for(category).first().copied().unwrap_or("news")
        }
    }

    async fn request(&self, category: Category, from: DateTime<Utc>) -> Result<String, SourceError> {
        let url = format!("{}/everything", self.base_url);
        let page_size = self.page_size.to_string();
        let from = from.to_rfc3339_opts(SecondsFormat::Secs, true);
        let resp = self
            .http
            .get(&url)
            .header("X-Api-Key", &self.api_key)
            .query(&[
                ("q", self.query_for(category)),
                ("language", "en"),
                ("sortBy", "publishedAt"),
                ("pageSize", page_size.as_str()),
                ("from", from.as_str()),
            ])
            .send()
            .await
            .map_err(|e| SourceError::Transport(e.to_string()))?;

        let status = resp.status();
        if status.as_u16() == 429 {
            return Err(SourceError::RateLimited);
        }
        let body = resp
            .text()
            .await
            .map_err(|e| SourceError::Transport(e.to_string()))?;
        if !status.is_success() {
            // NewsAPI puts a useful message into error bodies
            if let Ok(parsed) = serde_json::from_str::<NewsApiResponse>(&body) {
                if let Some(msg) = parsed.message {
                    return Err(SourceError::Provider(format!("{}: {msg}", status.as_u16())));
                }
            }
            return Err(SourceError::Status(status.as_u16()));
        }
        Ok(body)
    }
}

/// Parse a NewsAPI payload into tagged, normalized candidates.
/// Unusable entries (no title/url, `[Removed]`, bad timestamp) are skipped.
pub fn parse_articles(body: &str, category: Category) -> Result<Vec<RawArticle>, SourceError> {
    let parsed: NewsApiResponse =
        serde_json::from_str(body).map_err(|e| SourceError::Malformed(e.to_string()))?;
    if parsed.status != "ok" {
        return Err(SourceError::Provider(
            parsed.message.unwrap_or_else(|| parsed.status.clone()),
        ));
    }

    let mut out = Vec::with_capacity(parsed.articles.len());
    for a in parsed.articles {
        let title = normalize_text(a.title.as_deref().unwrap_or_default());
        if title.is_empty() || title == "[Removed]" {
            continue;
        }
        let Some(url) = a.url.filter(|u| !u.trim().is_empty()) else {
            continue;
        };
        let Some(published_at) = a
            .published_at
            .as_deref()
            .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
            .map(|dt| dt.with_timezone(&Utc))
        else {
            continue;
        };
        let description = a.description.map(|d| normalize_text(&d)).filter(|d| !d.is_empty());
        let content = a.content.map(|c| normalize_text(&c)).filter(|c| !c.is_empty());
        out.push(RawArticle {
            title,
            description,
            content,
            published_at,
            source_name: a
                .source
                .and_then(|s| s.name)
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| "Unknown source".to_string()),
            image_url: a.url_to_image.filter(|u| !u.trim().is_empty()),
            url,
            category: Some(category),
        });
    }
    Ok(out)
}

#[async_trait]
impl ArticleSource for NewsApiSource {
    async fn fetch(
        &self,
        category: Category,
        window: Duration,
    ) -> Result<Vec<RawArticle>, SourceError> {
        if self.api_key.trim().is_empty() {
            return Err(SourceError::MissingKey);
        }
        let from = Utc::now() - window;
        let body = tokio::time::timeout(self.timeout, self.request(category, from))
            .await
            .map_err(|_| SourceError::Timeout(self.timeout))??;
        parse_articles(&body, category)
    }

    fn name(&self) -> &'static str {
        "newsapi"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_skips_removed_and_incomplete_entries() {
        let body = r#"{
            "status": "ok",
            "articles": [
                {"title": "[Removed]", "url": "https://removed.example", "publishedAt": "2024-01-01T08:00:00Z"},
                {"title": "No url", "publishedAt": "2024-01-01T08:00:00Z"},
                {"title": "Bad time", "url": "https://x.example", "publishedAt": "yesterday"},
                {"title": "Good &amp; fine", "description": "Desc", "content": "Body [+99 chars]",
                 "url": "https://good.example", "publishedAt": "2024-01-01T08:00:00Z",
                 "source": {"name": "Wire"}, "urlToImage": ""}
            ]
        }"#;
        let out = parse_articles(body, Category::Science).unwrap();
        assert_eq!(out.len(), 1);
        let a = &out[0];
        assert_eq!(a.title, "Good & fine");
        assert_eq!(a.content.as_deref(), Some("Body"));
        assert_eq!(a.image_url, None);
        assert_eq!(a.category, Some(Category::Science));
    }

    #[test]
    fn provider_error_status_is_reported() {
        let body = r#"{"status":"error","code":"rateLimited","message":"slow down"}"#;
        let err = parse_articles(body, Category::Tech).unwrap_err();
        assert!(matches!(err, SourceError::Provider(m) if m == "slow down"));
    }
}
