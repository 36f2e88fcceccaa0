// src/cache/redis.rs
//! Durable shared tier on Redis (feature `redis-tier`).

use async_trait::async_trait;
use chrono::Utc;
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use tokio::sync::OnceCell;

use super::{CacheEntry, CacheError, CacheTier};

impl From<redis::RedisError> for CacheError {
    fn from(e: redis::RedisError) -> Self {
        CacheError::Backend(e.to_string())
    }
}

/// Entries are stored as JSON strings with a Redis `EX` equal to the
/// entry's remaining lifetime, so Redis drops them on its own as well.
pub struct RedisTier {
    client: Client,
    connection: OnceCell<ConnectionManager>,
}

impl RedisTier {
    pub fn new(url: &str) -> Result<Self, CacheError> {
        Ok(Self {
            client: Client::open(url)?,
            connection: OnceCell::new(),
        })
    }

    /// Lazily established, shared connection manager.
    async fn connection(&self) -> Result<ConnectionManager, CacheError> {
        let manager = self
            .connection
            .get_or_try_init(|| {
                tracing::trace!("initialize redis connection manager");
                self.client.get_connection_manager()
            })
            .await?;
        Ok(manager.clone())
    }
}

#[async_trait]
impl CacheTier for RedisTier {
    async fn read(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        let mut con = self.connection().await?;
        let raw: Option<String> = con.get(key).await?;
        match raw {
            Some(s) => Ok(Some(serde_json::from_str(&s)?)),
            None => Ok(None),
        }
    }

    async fn write(&self, entry: &CacheEntry) -> Result<(), CacheError> {
        let ttl = entry.remaining_secs(Utc::now());
        if ttl == 0 {
            return Ok(());
        }
        let mut con = self.connection().await?;
        let json = serde_json::to_string(entry)?;
        let _: () = con.set_ex(&entry.key, json, ttl).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        let mut con = self.connection().await?;
        let _: i64 = con.del(key).await?;
        Ok(())
    }

    fn label(&self) -> &'static str {
        "redis"
    }
}
