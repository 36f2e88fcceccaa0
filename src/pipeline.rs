// src/pipeline.rs
//! Ingestion pipeline: serve a slot from cache, or refresh it.
//!
//! A refresh fans out one task per configured category (fetch → classify →
//! select → rewrite), joins them under an overall deadline and caches the
//! assembled block when at least one category produced a story. Refreshes
//! are single-flight per cache key within the process and run detached, so
//! callers that go away do not cancel them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use tokio::sync::watch;
use tokio::task::JoinSet;

use crate::cache::{slot_key, CachedBlock, SlotCache};
use crate::classify::CategoryClassifier;
use crate::editorial::{EditorialProcessor, DEFAULT_MAX_CANDIDATES};
use crate::ingest::{self, types::ArticleSource};
use crate::model::{Category, Story, TimeBlock, TimeSlot};
use crate::scheduler::SlotScheduler;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    #[error("no category produced a story for {date} {slot}")]
    NoStories { date: String, slot: TimeSlot },
    #[error("refresh for {date} {slot} timed out before any category finished")]
    TimedOut { date: String, slot: TimeSlot },
    #[error("refresh task ended without a result: {0}")]
    Aborted(String),
}

/// Where a served block came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServedFrom {
    Cache,
    /// This request led the refresh.
    Refresh,
    /// This request awaited a refresh already in flight.
    Joined,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Served {
    pub block: TimeBlock,
    pub from: ServedFrom,
}

/// Editorial calls wrap up this long before the overall deadline, so the
/// source-text fallback lands before the join gives up on the category.
const EDITORIAL_MARGIN: StdDuration = StdDuration::from_millis(250);

type RefreshResult = Result<TimeBlock, PipelineError>;
type Inflight = Mutex<HashMap<String, watch::Receiver<Option<RefreshResult>>>>;

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("pipeline_refresh_total", "Slot refreshes started.");
        describe_counter!(
            "pipeline_refresh_failed_total",
            "Slot refreshes that produced no story (hard failure)."
        );
        describe_counter!(
            "pipeline_refresh_coalesced_total",
            "Requests that awaited an in-flight refresh instead of starting one."
        );
        describe_counter!(
            "pipeline_category_timeout_total",
            "Categories cut off by the overall refresh deadline."
        );
        describe_gauge!("pipeline_last_refresh_ts", "Unix ts of the last successful refresh.");
        describe_gauge!(
            "pipeline_stories_assembled",
            "Stories in the most recently assembled block."
        );
    });
}

pub struct PipelineBuilder {
    cache: Arc<SlotCache>,
    source: Arc<dyn ArticleSource>,
    editorial: EditorialProcessor,
    scheduler: SlotScheduler,
    classifier: CategoryClassifier,
    categories: Vec<Category>,
    window: Duration,
    overall_timeout: StdDuration,
    max_candidates: usize,
}

impl PipelineBuilder {
    pub fn categories(mut self, categories: Vec<Category>) -> Self {
        self.categories = categories;
        self
    }

    pub fn classifier(mut self, classifier: CategoryClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// How recent candidates must be.
    pub fn window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    pub fn overall_timeout(mut self, timeout: StdDuration) -> Self {
        self.overall_timeout = timeout;
        self
    }

    pub fn max_candidates(mut self, n: usize) -> Self {
        self.max_candidates = n.max(1);
        self
    }

    pub fn build(self) -> IngestionPipeline {
        ensure_metrics_described();
        let editorial = self.editorial.with_max_candidates(self.max_candidates);
        IngestionPipeline {
            inner: Arc::new(Inner {
                cache: self.cache,
                source: self.source,
                editorial,
                scheduler: self.scheduler,
                classifier: self.classifier,
                categories: self.categories,
                window: self.window,
                overall_timeout: self.overall_timeout,
                max_candidates: self.max_candidates,
                inflight: Mutex::new(HashMap::new()),
            }),
        }
    }
}

struct Inner {
    cache: Arc<SlotCache>,
    source: Arc<dyn ArticleSource>,
    editorial: EditorialProcessor,
    scheduler: SlotScheduler,
    classifier: CategoryClassifier,
    categories: Vec<Category>,
    window: Duration,
    overall_timeout: StdDuration,
    max_candidates: usize,
    inflight: Inflight,
}

#[derive(Clone)]
pub struct IngestionPipeline {
    inner: Arc<Inner>,
}

impl IngestionPipeline {
    pub fn builder(
        cache: Arc<SlotCache>,
        source: Arc<dyn ArticleSource>,
        editorial: EditorialProcessor,
        scheduler: SlotScheduler,
    ) -> PipelineBuilder {
        PipelineBuilder {
            cache,
            source,
            editorial,
            scheduler,
            classifier: CategoryClassifier::default(),
            categories: Category::ALL.to_vec(),
            window: Duration::hours(48),
            overall_timeout: StdDuration::from_secs(9),
            max_candidates: DEFAULT_MAX_CANDIDATES,
        }
    }

    pub fn scheduler(&self) -> &SlotScheduler {
        &self.inner.scheduler
    }

    pub fn categories(&self) -> &[Category] {
        &self.inner.categories
    }

    /// Today's block for `slot`, refreshing if needed.
    pub async fn get_or_refresh(&self, slot: TimeSlot) -> RefreshResult {
        let now = Utc::now();
        let date = self.inner.scheduler.date_key(now);
        self.get_or_refresh_for(&date, slot, now, false)
            .await
            .map(|s| s.block)
    }

    /// Serve (`date`, `slot`) as of `now`. `force` skips the cache read but
    /// still writes the refreshed block through.
    pub async fn get_or_refresh_for(
        &self,
        date: &str,
        slot: TimeSlot,
        now: DateTime<Utc>,
        force: bool,
    ) -> Result<Served, PipelineError> {
        if !force {
            if let Some(hit) = self.inner.cache.lookup(date, slot, now).await {
                if !self.is_stale(date, slot, &hit, now) {
                    return Ok(Served {
                        block: hit.block,
                        from: ServedFrom::Cache,
                    });
                }
                tracing::info!(
                    target: "pipeline",
                    date,
                    slot = %slot,
                    written_at = %hit.written_at,
                    "cached block predates slot opening, refreshing"
                );
            }
        }

        let (mut rx, led) = self.join_or_start(date, slot, now, force);
        if !led {
            counter!("pipeline_refresh_coalesced_total").increment(1);
            tracing::debug!(target: "pipeline", date, slot = %slot, "awaiting in-flight refresh");
        }
        let result = match rx.wait_for(|v| v.is_some()).await {
            Ok(v) => v.clone(),
            Err(_) => None,
        };
        let block = result.unwrap_or_else(|| {
            Err(PipelineError::Aborted(format!("refresh of {} stopped", slot_key(date, slot))))
        })?;
        Ok(Served {
            block,
            from: if led {
                ServedFrom::Refresh
            } else {
                ServedFrom::Joined
            },
        })
    }

    /// Every open slot's block for today, in slot order. Slots are served or
    /// refreshed concurrently; a slot whose refresh fails is left out.
    pub async fn available_blocks(&self, now: DateTime<Utc>) -> Vec<TimeBlock> {
        let date = self.inner.scheduler.date_key(now);
        let mut set = JoinSet::new();
        for slot in self.inner.scheduler.open_slots(now) {
            let this = self.clone();
            let date = date.clone();
            set.spawn(async move { (slot, this.get_or_refresh_for(&date, slot, now, false).await) });
        }

        let mut blocks = Vec::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((_, Ok(served))) => blocks.push(served.block),
                Ok((slot, Err(e))) => {
                    tracing::warn!(target: "pipeline", date = %date, slot = %slot, error = %e, "slot left out of day view");
                }
                Err(e) => tracing::error!(target: "pipeline", error = %e, "day view task failed"),
            }
        }
        blocks.sort_by_key(|b| b.time);
        blocks
    }

    /// A hit is stale only inside today's refresh window when it was written
    /// before the slot opened.
    fn is_stale(&self, date: &str, slot: TimeSlot, hit: &CachedBlock, now: DateTime<Utc>) -> bool {
        let sched = &self.inner.scheduler;
        date == sched.date_key(now)
            && sched.is_due_for_refresh(slot, now)
            && hit.written_at < sched.slot_opens_at(slot, now)
    }

    fn join_or_start(
        &self,
        date: &str,
        slot: TimeSlot,
        now: DateTime<Utc>,
        force: bool,
    ) -> (watch::Receiver<Option<RefreshResult>>, bool) {
        let key = slot_key(date, slot);
        let mut map = lock_inflight(&self.inner.inflight);
        if let Some(rx) = map.get(&key) {
            return (rx.clone(), false);
        }

        let (tx, rx) = watch::channel(None);
        map.insert(key.clone(), rx.clone());
        drop(map);

        let inner = Arc::clone(&self.inner);
        let date = date.to_string();
        tokio::spawn(async move {
            let _guard = InflightGuard {
                inner: Arc::clone(&inner),
                key,
            };
            if force {
                inner.cache.invalidate(&date, slot).await;
            }
            let result = Inner::refresh(&inner, date, slot, now).await;
            // publish before the guard clears the key, so late joiners see the result
            let _ = tx.send(Some(result));
        });
        (rx, true)
    }
}

fn lock_inflight(m: &Inflight) -> MutexGuard<'_, HashMap<String, watch::Receiver<Option<RefreshResult>>>> {
    match m.lock() {
        Ok(g) => g,
        Err(poison) => poison.into_inner(),
    }
}

/// Clears the in-flight marker even if the refresh task panics.
struct InflightGuard {
    inner: Arc<Inner>,
    key: String,
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        lock_inflight(&self.inner.inflight).remove(&self.key);
    }
}

impl Inner {
    async fn refresh(this: &Arc<Inner>, date: String, slot: TimeSlot, now: DateTime<Utc>) -> RefreshResult {
        counter!("pipeline_refresh_total").increment(1);
        tracing::info!(
            target: "pipeline",
            date = %date,
            slot = %slot,
            categories = this.categories.len(),
            "refresh started"
        );

        let deadline = tokio::time::Instant::now() + this.overall_timeout;
        let editorial_deadline = deadline - EDITORIAL_MARGIN.min(this.overall_timeout / 10);
        let mut set = JoinSet::new();
        for &category in &this.categories {
            let inner = Arc::clone(this);
            set.spawn(async move {
                let story = inner.process_category(category, now, editorial_deadline).await;
                (category, story)
            });
        }

        let mut stories: Vec<Story> = Vec::with_capacity(this.categories.len());
        let mut timed_out = false;
        loop {
            match tokio::time::timeout_at(deadline, set.join_next()).await {
                Ok(Some(Ok((_, Some(story))))) => stories.push(story),
                Ok(Some(Ok((category, None)))) => {
                    tracing::info!(target: "pipeline", category = %category, "category produced no story");
                }
                Ok(Some(Err(e))) => {
                    tracing::error!(target: "pipeline", error = %e, "category task failed");
                }
                Ok(None) => break,
                Err(_) => {
                    timed_out = true;
                    let pending = set.len();
                    tracing::warn!(
                        target: "pipeline",
                        date = %date,
                        slot = %slot,
                        pending,
                        timeout = ?this.overall_timeout,
                        "overall deadline reached, assembling completed categories"
                    );
                    counter!("pipeline_category_timeout_total").increment(pending as u64);
                    set.abort_all();
                    break;
                }
            }
        }

        if stories.is_empty() {
            counter!("pipeline_refresh_failed_total").increment(1);
            tracing::error!(target: "pipeline", date = %date, slot = %slot, timed_out, "refresh produced no stories");
            return Err(if timed_out {
                PipelineError::TimedOut { date, slot }
            } else {
                PipelineError::NoStories { date, slot }
            });
        }

        stories.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        let block = TimeBlock {
            time: slot,
            date,
            stories,
        };

        if let Err(e) = this.cache.set_at(&block.date, slot, &block, now).await {
            tracing::error!(
                target: "pipeline",
                error = %e,
                key = %slot_key(&block.date, slot),
                "no cache tier accepted the refreshed block"
            );
        }

        gauge!("pipeline_last_refresh_ts").set(Utc::now().timestamp() as f64);
        gauge!("pipeline_stories_assembled").set(block.stories.len() as f64);
        tracing::info!(
            target: "pipeline",
            date = %block.date,
            slot = %slot,
            stories = block.stories.len(),
            of = this.categories.len(),
            "refresh assembled"
        );
        Ok(block)
    }

    async fn process_category(
        &self,
        category: Category,
        now: DateTime<Utc>,
        editorial_deadline: tokio::time::Instant,
    ) -> Option<Story> {
        let raw = ingest::fetch_candidates(&*self.source, category, self.window).await;
        let candidates = ingest::prepare_candidates(
            now,
            raw,
            category,
            self.window,
            &self.classifier,
            self.max_candidates,
        );
        if candidates.is_empty() {
            return None;
        }
        self.editorial
            .process_until(category, &candidates, Some(editorial_deadline))
            .await
    }
}
