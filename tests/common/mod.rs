// tests/common/mod.rs
//
// Shared fakes for integration tests: a scripted news source, a scripted
// text generator, a tier that always fails, and small fixture builders.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use newsroom_slots::cache::{memory::MemoryTier, CacheEntry, CacheError, CacheTier, SlotCache};
use newsroom_slots::config::ScheduleConfig;
use newsroom_slots::editorial::ai_adapter::{CompletionRequest, TextGenerator};
use newsroom_slots::editorial::{prompts, EditorialError, EditorialProcessor};
use newsroom_slots::ingest::types::{ArticleSource, RawArticle, SourceError};
use newsroom_slots::model::{Category, Story, TimeBlock, TimeSlot};
use newsroom_slots::pipeline::IngestionPipeline;
use newsroom_slots::scheduler::SlotScheduler;

/// 2024-01-01 at `h:m` UTC.
pub fn at(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, h, m, 0).unwrap()
}

pub fn article(title: &str, description: &str, published_at: DateTime<Utc>) -> RawArticle {
    RawArticle {
        title: title.to_string(),
        description: Some(description.to_string()),
        content: Some(format!("{description} Full body text.")),
        published_at,
        source_name: "Wire".to_string(),
        image_url: None,
        url: format!("https://news.example/{}", title.to_lowercase().replace(' ', "-")),
        category: None,
    }
}

pub fn story(category: Category, headline: &str, ts: DateTime<Utc>) -> Story {
    Story {
        id: format!("{category}-{}", headline.len()),
        timestamp: ts,
        category,
        headline: headline.to_string(),
        content: "One.\n\nTwo.\n\nThree.".to_string(),
        source: "Wire".to_string(),
        image: "https://img.example/x.png".to_string(),
        original_url: format!("https://news.example/{headline}"),
    }
}

pub fn block(date: &str, slot: TimeSlot) -> TimeBlock {
    TimeBlock {
        time: slot,
        date: date.to_string(),
        stories: vec![story(Category::Tech, "Chip breakthrough", at(9, 0))],
    }
}

pub fn scheduler(always_open: bool) -> SlotScheduler {
    SlotScheduler::new(&ScheduleConfig::default()).with_always_open(always_open)
}

pub fn memory_cache(ttl_secs: u64) -> Arc<SlotCache> {
    Arc::new(SlotCache::new(
        Arc::new(MemoryTier::new(16, ttl_secs)),
        Arc::new(MemoryTier::new(16, ttl_secs)),
        ttl_secs,
    ))
}

// ------------------------------------------------------------
// Source
// ------------------------------------------------------------

/// Per-category canned batches with optional latency and failures.
#[derive(Default)]
pub struct StubSource {
    batches: HashMap<Category, Vec<RawArticle>>,
    failing: Vec<Category>,
    delay: Duration,
    delays: HashMap<Category, Duration>,
    calls: Mutex<HashMap<Category, usize>>,
}

impl StubSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, category: Category, articles: Vec<RawArticle>) -> Self {
        self.batches.insert(category, articles);
        self
    }

    pub fn failing(mut self, category: Category) -> Self {
        self.failing.push(category);
        self
    }

    pub fn delay(mut self, d: Duration) -> Self {
        self.delay = d;
        self
    }

    pub fn delay_for(mut self, category: Category, d: Duration) -> Self {
        self.delays.insert(category, d);
        self
    }

    pub fn calls(&self, category: Category) -> usize {
        self.calls.lock().unwrap().get(&category).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl ArticleSource for StubSource {
    async fn fetch(
        &self,
        category: Category,
        _window: chrono::Duration,
    ) -> Result<Vec<RawArticle>, SourceError> {
        *self.calls.lock().unwrap().entry(category).or_default() += 1;
        let d = self.delays.get(&category).copied().unwrap_or(self.delay);
        if !d.is_zero() {
            tokio::time::sleep(d).await;
        }
        if self.failing.contains(&category) {
            return Err(SourceError::Status(503));
        }
        Ok(self.batches.get(&category).cloned().unwrap_or_default())
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}

// ------------------------------------------------------------
// Generator
// ------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Select,
    Rewrite,
}

type Handler = dyn Fn(Call, &str) -> Result<String, EditorialError> + Send + Sync;

/// Answers selection and rewrite prompts through one closure.
pub struct ScriptedGenerator {
    handler: Box<Handler>,
    calls: AtomicUsize,
}

impl ScriptedGenerator {
    pub fn new<F>(f: F) -> Arc<Self>
    where
        F: Fn(Call, &str) -> Result<String, EditorialError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            handler: Box::new(f),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn complete(&self, req: CompletionRequest<'_>) -> Result<String, EditorialError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let call = if req.system == prompts::SELECTION_SYSTEM {
            Call::Select
        } else {
            Call::Rewrite
        };
        (self.handler)(call, req.user)
    }

    fn provider_name(&self) -> &'static str {
        "scripted"
    }
}

/// Picks candidate 0 and rewrites into a fixed three-paragraph story.
pub fn happy_generator() -> Arc<ScriptedGenerator> {
    ScriptedGenerator::new(|call, _| {
        Ok(match call {
            Call::Select => r#"{"selectedIndex": 0, "reason": "most novel"}"#.to_string(),
            Call::Rewrite => {
                r#"{"headline": "Rewritten", "content": "First.\n\nSecond.\n\nThird."}"#.to_string()
            }
        })
    })
}

/// Sleeps `delay` before delegating, like a model endpoint under load.
pub struct SlowGenerator {
    delay: Duration,
    inner: Arc<ScriptedGenerator>,
}

impl SlowGenerator {
    pub fn new(delay: Duration, inner: Arc<ScriptedGenerator>) -> Arc<Self> {
        Arc::new(Self { delay, inner })
    }
}

#[async_trait]
impl TextGenerator for SlowGenerator {
    async fn complete(&self, req: CompletionRequest<'_>) -> Result<String, EditorialError> {
        tokio::time::sleep(self.delay).await;
        self.inner.complete(req).await
    }

    fn provider_name(&self) -> &'static str {
        "slow"
    }
}

pub fn editorial(generator: Arc<ScriptedGenerator>) -> EditorialProcessor {
    EditorialProcessor::new(generator, Duration::from_secs(8))
}

pub fn pipeline(
    cache: Arc<SlotCache>,
    source: Arc<StubSource>,
    generator: Arc<ScriptedGenerator>,
) -> IngestionPipeline {
    IngestionPipeline::builder(cache, source, editorial(generator), scheduler(false)).build()
}

// ------------------------------------------------------------
// Cache tiers
// ------------------------------------------------------------

/// Every operation fails.
pub struct BrokenTier;

#[async_trait]
impl CacheTier for BrokenTier {
    async fn read(&self, _key: &str) -> Result<Option<CacheEntry>, CacheError> {
        Err(CacheError::Backend("connection refused".into()))
    }

    async fn write(&self, _entry: &CacheEntry) -> Result<(), CacheError> {
        Err(CacheError::Backend("connection refused".into()))
    }

    async fn remove(&self, _key: &str) -> Result<(), CacheError> {
        Err(CacheError::Backend("connection refused".into()))
    }

    fn label(&self) -> &'static str {
        "broken"
    }
}
