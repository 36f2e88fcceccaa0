// src/cache/memory.rs
//! In-process tier backed by Moka.

use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;

use super::{CacheEntry, CacheError, CacheTier};

/// Fast tier: lock-free reads, bounded capacity, lost on restart.
///
/// Moka's own TTL is only a memory bound; logical expiry is still decided by
/// `SlotCache` from `CacheEntry::written_at`.
#[derive(Clone)]
pub struct MemoryTier {
    cache: Cache<String, CacheEntry>,
}

impl MemoryTier {
    pub fn new(max_capacity: u64, ttl_secs: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity.max(1))
            .time_to_live(Duration::from_secs(ttl_secs.max(1)))
            .build();
        Self { cache }
    }
}

impl std::fmt::Debug for MemoryTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTier")
            .field("entries", &self.cache.entry_count())
            .finish()
    }
}

#[async_trait]
impl CacheTier for MemoryTier {
    async fn read(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        Ok(self.cache.get(key).await)
    }

    async fn write(&self, entry: &CacheEntry) -> Result<(), CacheError> {
        self.cache.insert(entry.key.clone(), entry.clone()).await;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.cache.invalidate(key).await;
        Ok(())
    }

    fn label(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_read_remove() {
        let tier = MemoryTier::new(8, 3600);
        let e = CacheEntry {
            key: "news:2024-01-01:10AM".into(),
            payload: "{}".into(),
            written_at: chrono::Utc::now(),
            ttl_seconds: 3600,
        };
        tier.write(&e).await.unwrap();
        assert_eq!(tier.read(&e.key).await.unwrap(), Some(e.clone()));
        tier.remove(&e.key).await.unwrap();
        tier.remove(&e.key).await.unwrap();
        assert_eq!(tier.read(&e.key).await.unwrap(), None);
    }
}
