use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;
use tinylink_core::cache::Result;
use tinylink_core::{CacheError, ShortCode, StoredEntity, UrlCache};
use tracing::{trace, warn};

/// Key prefix for cached entities.
pub const DEFAULT_KEY_PREFIX: &str = "url:";

/// A Redis-backed [`UrlCache`].
///
/// Entities are stored as JSON strings under `url:<code>` with a
/// millisecond-precision expiry.
#[derive(Clone)]
pub struct RedisUrlCache {
    conn: ConnectionManager,
    key_prefix: String,
}

fn map_redis_error(operation: &str, err: redis::RedisError) -> CacheError {
    let message = format!("{operation}: {err}");
    if err.is_timeout() || message.to_ascii_lowercase().contains("timed out") {
        CacheError::Timeout(message)
    } else {
        CacheError::Operation(message)
    }
}

impl RedisUrlCache {
    pub fn new(conn: ConnectionManager) -> Self {
        Self::with_prefix(conn, DEFAULT_KEY_PREFIX)
    }

    pub fn with_prefix(conn: ConnectionManager, key_prefix: impl Into<String>) -> Self {
        Self {
            conn,
            key_prefix: key_prefix.into(),
        }
    }

    /// Connects to `redis_url` with an auto-reconnecting connection.
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| map_redis_error("invalid Redis URL", e))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| map_redis_error("failed to connect to Redis", e))?;
        Ok(Self::new(conn))
    }

    fn cache_key(&self, code: &ShortCode) -> String {
        format!("{}{}", self.key_prefix, code.as_str())
    }
}

impl std::fmt::Debug for RedisUrlCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisUrlCache")
            .field("key_prefix", &self.key_prefix)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl UrlCache for RedisUrlCache {
    async fn get_url(&self, code: &ShortCode) -> Result<Option<StoredEntity>> {
        let key = self.cache_key(code);
        let mut conn = self.conn.clone();

        let cached: Option<String> = conn
            .get(&key)
            .await
            .map_err(|e| map_redis_error("failed to fetch value from Redis", e))?;
        let Some(cached) = cached else {
            trace!(code = %code, "redis miss");
            return Ok(None);
        };

        serde_json::from_str(&cached).map(Some).map_err(|e| {
            warn!(code = %code, error = %e, "failed to deserialize cached entity");
            CacheError::InvalidData(format!("invalid cached value for key '{key}': {e}"))
        })
    }

    async fn set_url(&self, entity: &StoredEntity, ttl: Duration) -> Result<()> {
        let key = self.cache_key(entity.short_code());
        let json = serde_json::to_string(entity)
            .map_err(|e| CacheError::Serialization(format!("failed to serialize cache value: {e}")))?;
        // PSETEX rejects a zero expiry
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);

        let mut conn = self.conn.clone();
        conn.pset_ex::<_, _, ()>(&key, json, ttl_ms)
            .await
            .map_err(|e| map_redis_error("failed to write value to Redis", e))
    }

    async fn del(&self, code: &ShortCode) -> Result<()> {
        let key = self.cache_key(code);
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(&key)
            .await
            .map_err(|e| map_redis_error("failed to delete value from Redis", e))
    }
}
