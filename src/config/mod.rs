// src/config/mod.rs
//! Application configuration: `config/newsroom.toml` + environment overrides.
//!
//! Every field has a default, so a missing file still yields a runnable
//! configuration. Secrets are never read from the file directly: the value
//! `"ENV"` resolves to `NEWS_API_KEY` / `OPENAI_API_KEY`.

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::{env, fs};

use crate::model::Category;

pub const DEFAULT_CONFIG_PATH: &str = "config/newsroom.toml";
pub const ENV_CONFIG_PATH: &str = "NEWSROOM_CONFIG_PATH";
pub const ENV_ALWAYS_OPEN: &str = "NEWSROOM_ALWAYS_OPEN";
pub const ENV_REDIS_URL: &str = "NEWSROOM_REDIS_URL";
pub const ENV_CACHE_DIR: &str = "NEWSROOM_CACHE_DIR";
pub const ENV_NEWS_API_KEY: &str = "NEWS_API_KEY";
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub categories: Vec<Category>,
    pub schedule: ScheduleConfig,
    pub cache: CacheConfig,
    pub source: SourceConfig,
    pub llm: LlmConfig,
    pub pipeline: PipelineConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            categories: Category::ALL.to_vec(),
            schedule: ScheduleConfig::default(),
            cache: CacheConfig::default(),
            source: SourceConfig::default(),
            llm: LlmConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Offset of the newsroom's local time from UTC.
    pub utc_offset_minutes: i32,
    /// Development override: every slot counts as open.
    pub always_open: bool,
    pub refresh_window_minutes: u32,
    /// Opening hour per slot, in `TimeSlot::ALL` order.
    pub slot_hours: [u32; 3],
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            utc_offset_minutes: 0,
            always_open: false,
            refresh_window_minutes: 5,
            slot_hours: [10, 15, 20],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_secs: u64,
    /// Directory of the JSON file durable tier.
    pub dir: PathBuf,
    /// Max entries in the in-process tier.
    pub fast_capacity: u64,
    /// When set (and built with `redis-tier`), Redis replaces the file tier.
    pub redis_url: Option<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 24 * 3600,
            dir: PathBuf::from("cache/slots"),
            fast_capacity: 64,
            redis_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub base_url: String,
    pub api_key: String,
    pub page_size: u32,
    pub window_hours: u32,
    pub timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://newsapi.org/v2".to_string(),
            api_key: "ENV".to_string(),
            page_size: 10,
            window_hours: 48,
            timeout_secs: 8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Full chat-completions endpoint URL.
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1/chat/completions".to_string(),
            api_key: "ENV".to_string(),
            model: "gpt-4o-mini".to_string(),
            timeout_secs: 8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub overall_timeout_secs: u64,
    /// Tick period of the background cache warmer; 0 disables it.
    pub warm_interval_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            overall_timeout_secs: 9,
            warm_interval_secs: 60,
        }
    }
}

impl AppConfig {
    /// Parse a TOML file, then apply env overrides and validation.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let cfg: AppConfig = toml::from_str(&data)
            .with_context(|| format!("parsing config {}", path.display()))?;
        cfg.finish()
    }

    /// Load using env var + fallbacks:
    /// 1) $NEWSROOM_CONFIG_PATH
    /// 2) config/newsroom.toml
    /// 3) built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            return Self::load_from_file(&pb);
        }
        let default = PathBuf::from(DEFAULT_CONFIG_PATH);
        if default.exists() {
            return Self::load_from_file(&default);
        }
        AppConfig::default().finish()
    }

    fn finish(mut self) -> Result<Self> {
        self.apply_env_overrides();
        self.validate()?;
        Ok(self)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = env::var(ENV_ALWAYS_OPEN) {
            self.schedule.always_open = matches!(v.trim(), "1" | "true" | "TRUE" | "yes");
        }
        if let Ok(v) = env::var(ENV_REDIS_URL) {
            if !v.trim().is_empty() {
                self.cache.redis_url = Some(v.trim().to_string());
            }
        }
        if let Ok(v) = env::var(ENV_CACHE_DIR) {
            if !v.trim().is_empty() {
                self.cache.dir = PathBuf::from(v.trim());
            }
        }
        self.source.api_key = resolve_secret(&self.source.api_key, ENV_NEWS_API_KEY);
        self.llm.api_key = resolve_secret(&self.llm.api_key, ENV_OPENAI_API_KEY);
    }

    fn validate(&mut self) -> Result<()> {
        // dedup, keep declared order
        let mut seen = Vec::with_capacity(self.categories.len());
        for c in self.categories.drain(..) {
            if !seen.contains(&c) {
                seen.push(c);
            }
        }
        self.categories = seen;
        if self.categories.is_empty() {
            bail!("config: at least one category is required");
        }

        let hours = self.schedule.slot_hours;
        if hours.iter().any(|h| *h >= 24) {
            bail!("config: slot hours must be < 24, got {hours:?}");
        }
        if !hours.windows(2).all(|w| w[0] < w[1]) {
            bail!("config: slot hours must be strictly increasing, got {hours:?}");
        }
        if self.schedule.refresh_window_minutes >= 60 {
            bail!("config: refresh_window_minutes must be < 60");
        }

        self.source.page_size = self.source.page_size.clamp(1, 10);
        if self.source.timeout_secs == 0 {
            self.source.timeout_secs = SourceConfig::default().timeout_secs;
        }
        if self.llm.timeout_secs == 0 {
            self.llm.timeout_secs = LlmConfig::default().timeout_secs;
        }
        if self.pipeline.overall_timeout_secs == 0 {
            self.pipeline.overall_timeout_secs = PipelineConfig::default().overall_timeout_secs;
        }
        if self.cache.ttl_secs == 0 {
            self.cache.ttl_secs = CacheConfig::default().ttl_secs;
        }
        Ok(())
    }
}

/// `"ENV"` (any case) reads the named variable; a missing variable yields "".
fn resolve_secret(raw: &str, var: &str) -> String {
    if raw.trim().eq_ignore_ascii_case("env") {
        env::var(var).unwrap_or_default()
    } else {
        raw.to_string()
    }
}
