// src/app.rs
//! Wiring: build the cache, source, generator and pipeline from `AppConfig`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cache::{file::FileTier, memory::MemoryTier, CacheTier, SlotCache};
use crate::config::{AppConfig, CacheConfig};
use crate::editorial::{ai_adapter::build_generator, EditorialProcessor};
use crate::ingest::{sources::newsapi::NewsApiSource, types::ArticleSource};
use crate::pipeline::IngestionPipeline;
use crate::scheduler::SlotScheduler;

/// Durable tier: Redis when configured and compiled in, JSON files otherwise.
fn durable_tier(cfg: &CacheConfig) -> Result<Arc<dyn CacheTier>> {
    match cfg.redis_url.as_deref() {
        Some(url) => redis_tier(url, cfg),
        None => Ok(file_tier(cfg)),
    }
}

fn file_tier(cfg: &CacheConfig) -> Arc<dyn CacheTier> {
    info!(target: "cache", dir = %cfg.dir.display(), "durable tier: file");
    Arc::new(FileTier::new(cfg.dir.clone()))
}

#[cfg(feature = "redis-tier")]
fn redis_tier(url: &str, _cfg: &CacheConfig) -> Result<Arc<dyn CacheTier>> {
    let tier = crate::cache::redis::RedisTier::new(url).context("opening redis client")?;
    info!(target: "cache", "durable tier: redis");
    Ok(Arc::new(tier))
}

#[cfg(not(feature = "redis-tier"))]
fn redis_tier(_url: &str, cfg: &CacheConfig) -> Result<Arc<dyn CacheTier>> {
    warn!(target: "cache", "redis_url set but built without `redis-tier`");
    Ok(file_tier(cfg))
}

pub fn build_cache(cfg: &CacheConfig) -> Result<SlotCache> {
    let fast: Arc<dyn CacheTier> = Arc::new(MemoryTier::new(cfg.fast_capacity, cfg.ttl_secs));
    let durable = durable_tier(cfg)?;
    Ok(SlotCache::new(fast, durable, cfg.ttl_secs))
}

/// Assemble the pipeline around an explicit source (tests and tools swap it).
pub fn build_pipeline_with_source(
    cfg: &AppConfig,
    source: Arc<dyn ArticleSource>,
) -> Result<IngestionPipeline> {
    let cache = Arc::new(build_cache(&cfg.cache)?);
    let generator = build_generator(&cfg.llm);
    info!(
        provider = generator.provider_name(),
        model = %cfg.llm.model,
        key_len = cfg.llm.api_key.len(),
        "editorial generator ready"
    );
    let editorial = EditorialProcessor::new(generator, Duration::from_secs(cfg.llm.timeout_secs));

    Ok(IngestionPipeline::builder(cache, source, editorial, SlotScheduler::new(&cfg.schedule))
        .categories(cfg.categories.clone())
        .window(chrono::Duration::hours(i64::from(cfg.source.window_hours)))
        .overall_timeout(Duration::from_secs(cfg.pipeline.overall_timeout_secs))
        .max_candidates(cfg.source.page_size as usize)
        .build())
}

pub fn build_pipeline(cfg: &AppConfig) -> Result<IngestionPipeline> {
    if cfg.source.api_key.is_empty() {
        warn!("no news api key configured; every fetch will come back empty");
    }
    let source = NewsApiSource::new(&cfg.source).context("building news source client")?;
    build_pipeline_with_source(cfg, Arc::new(source))
}
