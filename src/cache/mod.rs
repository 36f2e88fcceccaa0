// src/cache/mod.rs
//! Two-tier slot cache: a fast in-process tier in front of a durable shared tier.
//!
//! Reads go fast → durable and backfill the fast tier on a durable hit. Writes
//! go to both tiers. Tier errors never surface from reads: they are logged,
//! counted, and degrade to a miss. Expiry is lazy (checked on read), and the
//! payload's own date/slot must match the requested key.

pub mod file;
pub mod memory;
#[cfg(feature = "redis-tier")]
pub mod redis;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::model::{TimeBlock, TimeSlot};

/// Stored record. `payload` is the serialized `TimeBlock`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub key: String,
    pub payload: String,
    pub written_at: DateTime<Utc>,
    pub ttl_seconds: u64,
}

impl CacheEntry {
    pub fn expires_at(&self) -> DateTime<Utc> {
        let ttl = i64::try_from(self.ttl_seconds).unwrap_or(i64::MAX / 1_000);
        self.written_at + Duration::seconds(ttl)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at()
    }

    /// Seconds left before expiry, never negative.
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> u64 {
        (self.expires_at() - now).num_seconds().max(0) as u64
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("backend error: {0}")]
    Backend(String),
}

/// One storage tier. Implementations only store and fetch; expiry and
/// date validation live in [`SlotCache`].
#[async_trait]
pub trait CacheTier: Send + Sync {
    async fn read(&self, key: &str) -> Result<Option<CacheEntry>, CacheError>;
    async fn write(&self, entry: &CacheEntry) -> Result<(), CacheError>;
    async fn remove(&self, key: &str) -> Result<(), CacheError>;
    fn label(&self) -> &'static str;
}

pub fn slot_key(date: &str, slot: TimeSlot) -> String {
    format!("news:{date}:{slot}")
}

/// A cache hit with its provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedBlock {
    pub block: TimeBlock,
    pub written_at: DateTime<Utc>,
    pub tier: &'static str,
}

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("cache_hit_total", "Slot cache hits by tier.");
        describe_counter!("cache_miss_total", "Slot cache misses (both tiers).");
        describe_counter!(
            "cache_tier_errors_total",
            "Slot cache tier errors by tier and operation."
        );
        describe_counter!("cache_expired_total", "Entries evicted lazily on read.");
    });
}

fn tier_error(tier: &'static str, op: &'static str, key: &str, err: &CacheError) {
    tracing::warn!(target: "cache", tier, op, key, error = %err, "cache tier error");
    counter!("cache_tier_errors_total", "tier" => tier, "op" => op).increment(1);
}

pub struct SlotCache {
    fast: Arc<dyn CacheTier>,
    durable: Arc<dyn CacheTier>,
    ttl_secs: u64,
}

impl SlotCache {
    pub fn new(fast: Arc<dyn CacheTier>, durable: Arc<dyn CacheTier>, ttl_secs: u64) -> Self {
        ensure_metrics_described();
        Self {
            fast,
            durable,
            ttl_secs,
        }
    }

    pub async fn get(&self, date: &str, slot: TimeSlot) -> Option<TimeBlock> {
        self.get_at(date, slot, Utc::now()).await
    }

    /// `get` with an explicit clock.
    pub async fn get_at(&self, date: &str, slot: TimeSlot, now: DateTime<Utc>) -> Option<TimeBlock> {
        self.lookup(date, slot, now).await.map(|hit| hit.block)
    }

    /// Full read path; returns the block together with its write time and tier.
    pub async fn lookup(&self, date: &str, slot: TimeSlot, now: DateTime<Utc>) -> Option<CachedBlock> {
        let key = slot_key(date, slot);

        if let Some(hit) = self.read_tier(&*self.fast, &key, date, slot, now).await {
            counter!("cache_hit_total", "tier" => self.fast.label()).increment(1);
            return Some(hit);
        }

        let hit = self.read_tier(&*self.durable, &key, date, slot, now).await;
        match hit {
            Some(hit) => {
                counter!("cache_hit_total", "tier" => self.durable.label()).increment(1);
                let entry = CacheEntry {
                    key: key.clone(),
                    payload: serde_json::to_string(&hit.block).unwrap_or_default(),
                    written_at: hit.written_at,
                    ttl_seconds: self.ttl_secs,
                };
                if let Err(e) = self.fast.write(&entry).await {
                    tier_error(self.fast.label(), "backfill", &key, &e);
                }
                Some(hit)
            }
            None => {
                counter!("cache_miss_total").increment(1);
                None
            }
        }
    }

    async fn read_tier(
        &self,
        tier: &dyn CacheTier,
        key: &str,
        date: &str,
        slot: TimeSlot,
        now: DateTime<Utc>,
    ) -> Option<CachedBlock> {
        let entry = match tier.read(key).await {
            Ok(Some(entry)) => entry,
            Ok(None) => return None,
            Err(e) => {
                tier_error(tier.label(), "read", key, &e);
                return None;
            }
        };

        if entry.is_expired(now) {
            tracing::debug!(target: "cache", tier = tier.label(), key, "entry expired, evicting");
            counter!("cache_expired_total", "tier" => tier.label()).increment(1);
            self.evict(tier, key).await;
            return None;
        }

        let block: TimeBlock = match serde_json::from_str(&entry.payload) {
            Ok(b) => b,
            Err(e) => {
                tier_error(tier.label(), "decode", key, &CacheError::Serde(e));
                self.evict(tier, key).await;
                return None;
            }
        };

        if block.date != date || block.time != slot {
            tracing::warn!(
                target: "cache",
                tier = tier.label(),
                key,
                payload_date = %block.date,
                payload_slot = %block.time,
                "payload does not match key, evicting"
            );
            self.evict(tier, key).await;
            return None;
        }

        Some(CachedBlock {
            block,
            written_at: entry.written_at,
            tier: tier.label(),
        })
    }

    async fn evict(&self, tier: &dyn CacheTier, key: &str) {
        if let Err(e) = tier.remove(key).await {
            tier_error(tier.label(), "remove", key, &e);
        }
    }

    pub async fn set(&self, date: &str, slot: TimeSlot, block: &TimeBlock) -> Result<(), CacheError> {
        self.set_at(date, slot, block, Utc::now()).await
    }

    /// Write-through to both tiers. Fails only when neither tier accepted the entry.
    pub async fn set_at(
        &self,
        date: &str,
        slot: TimeSlot,
        block: &TimeBlock,
        now: DateTime<Utc>,
    ) -> Result<(), CacheError> {
        let key = slot_key(date, slot);
        let entry = CacheEntry {
            key: key.clone(),
            payload: serde_json::to_string(block)?,
            written_at: now,
            ttl_seconds: self.ttl_secs,
        };

        let durable = self.durable.write(&entry).await;
        if let Err(e) = &durable {
            tier_error(self.durable.label(), "write", &key, e);
        }
        let fast = self.fast.write(&entry).await;
        if let Err(e) = &fast {
            tier_error(self.fast.label(), "write", &key, e);
        }

        match (durable, fast) {
            (Err(e), Err(_)) => Err(e),
            _ => Ok(()),
        }
    }

    /// Evict from both tiers. Idempotent; tier errors are logged only.
    pub async fn invalidate(&self, date: &str, slot: TimeSlot) {
        let key = slot_key(date, slot);
        self.evict(&*self.fast, &key).await;
        self.evict(&*self.durable, &key).await;
        tracing::info!(target: "cache", key = %key, "slot invalidated");
    }
}
