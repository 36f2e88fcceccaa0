//! AI adapter: text-generation provider abstraction + strict JSON reply parsing.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::editorial::EditorialError;

// ------------------------------------------------------------
// Public surface
// ------------------------------------------------------------

/// One chat-completion call: system + user prompt and decoding limits.
#[derive(Debug, Clone, Copy)]
pub struct CompletionRequest<'a> {
    pub system: &'a str,
    pub user: &'a str,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Generative text service used by the editorial stage.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Return the raw assistant text for `req`.
    async fn complete(&self, req: CompletionRequest<'_>) -> Result<String, EditorialError>;
    /// Provider name for diagnostics.
    fn provider_name(&self) -> &'static str;
}

pub type DynGenerator = Arc<dyn TextGenerator>;

/// Factory: real OpenAI-compatible client when a key is configured, otherwise
/// a disabled client (every rewrite then falls back to the source text).
pub fn build_generator(cfg: &LlmConfig) -> DynGenerator {
    if cfg.api_key.trim().is_empty() {
        tracing::warn!("no LLM api key configured; editorial rewrite disabled");
        return Arc::new(DisabledGenerator);
    }
    match OpenAiGenerator::new(cfg) {
        Ok(g) => Arc::new(g),
        Err(e) => {
            tracing::warn!(error = %e, "LLM client init failed; editorial rewrite disabled");
            Arc::new(DisabledGenerator)
        }
    }
}

// ------------------------------------------------------------
// Concrete providers
// ------------------------------------------------------------

/// OpenAI-compatible Chat Completions client.
pub struct OpenAiGenerator {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl OpenAiGenerator {
    pub fn new(cfg: &LlmConfig) -> Result<Self, EditorialError> {
        let http = reqwest::Client::builder()
            .user_agent("newsroom-slots/0.1")
            .connect_timeout(Duration::from_secs(4))
            .build()
            .map_err(|e| EditorialError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            endpoint: cfg.base_url.clone(),
            api_key: cfg.api_key.clone(),
            model: cfg.model.clone(),
            timeout: Duration::from_secs(cfg.timeout_secs),
        })
    }
}

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatReq<'a> {
    model: &'a str,
    messages: Vec<Msg<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResp {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMsg,
}

#[derive(Deserialize)]
struct ChoiceMsg {
    content: Option<String>,
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    async fn complete(&self, req: CompletionRequest<'_>) -> Result<String, EditorialError> {
        let body = ChatReq {
            model: &self.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: req.system,
                },
                Msg {
                    role: "user",
                    content: req.user,
                },
            ],
            temperature: req.temperature,
            max_tokens: req.max_tokens,
        };

        let call = async {
            let resp = self
                .http
                .post(&self.endpoint)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await
                .map_err(|e| EditorialError::Transport(e.to_string()))?;
            let status = resp.status();
            if !status.is_success() {
                return Err(EditorialError::Status(status.as_u16()));
            }
            resp.json::<ChatResp>()
                .await
                .map_err(|e| EditorialError::Invalid(format!("chat response: {e}")))
        };

        let parsed = tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| EditorialError::Timeout(self.timeout))??;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|s| !s.trim().is_empty())
            .ok_or(EditorialError::EmptyReply)
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}

/// Always fails; used when no provider is configured.
pub struct DisabledGenerator;

#[async_trait]
impl TextGenerator for DisabledGenerator {
    async fn complete(&self, _req: CompletionRequest<'_>) -> Result<String, EditorialError> {
        Err(EditorialError::Disabled)
    }

    fn provider_name(&self) -> &'static str {
        "disabled"
    }
}

// ------------------------------------------------------------
// Reply parsing
// ------------------------------------------------------------

/// Strip an optional ```` ```json ```` fence, trim, and collapse literal
/// newlines so the reply parses as a single JSON document.
pub fn clean_json_reply(raw: &str) -> String {
    static RE_OPEN: OnceCell<regex::Regex> = OnceCell::new();
    static RE_CLOSE: OnceCell<regex::Regex> = OnceCell::new();
    let re_open = RE_OPEN.get_or_init(|| regex::Regex::new(r"^\s*```(?:json|JSON)?\s*").unwrap());
    let re_close = RE_CLOSE.get_or_init(|| regex::Regex::new(r"\s*```\s*$").unwrap());

    let s = re_open.replace(raw, "");
    let s = re_close.replace(&s, "");
    s.trim().replace(['\r', '\n'], " ")
}

/// Parse a model reply into `T` after [`clean_json_reply`].
pub fn parse_json_reply<T: serde::de::DeserializeOwned>(raw: &str) -> Result<T, EditorialError> {
    let cleaned = clean_json_reply(raw);
    serde_json::from_str(&cleaned).map_err(|e| EditorialError::Invalid(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Pair {
        a: i64,
        b: String,
    }

    #[test]
    fn fenced_multiline_reply_parses() {
        let raw = "```json\n{\n  \"a\": 2,\n  \"b\": \"x\"\n}\n```";
        let p: Pair = parse_json_reply(raw).unwrap();
        assert_eq!(p, Pair { a: 2, b: "x".into() });
    }

    #[test]
    fn prose_reply_is_invalid() {
        let err = parse_json_reply::<Pair>("Sure! Here is the JSON you asked for").unwrap_err();
        assert!(matches!(err, EditorialError::Invalid(_)));
    }

    #[tokio::test]
    async fn disabled_generator_always_fails() {
        let g = DisabledGenerator;
        let req = CompletionRequest {
            system: "s",
            user: "u",
            temperature: 0.7,
            max_tokens: 10,
        };
        assert!(matches!(g.complete(req).await, Err(EditorialError::Disabled)));
    }
}
