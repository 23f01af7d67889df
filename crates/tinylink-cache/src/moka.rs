use async_trait::async_trait;
use moka::future::Cache;
use moka::Expiry;
use std::time::{Duration, Instant};
use tinylink_core::cache::Result;
use tinylink_core::{ShortCode, StoredEntity, UrlCache};
use tracing::trace;

#[derive(Debug, Clone)]
struct Entry {
    entity: StoredEntity,
    ttl: Duration,
}

/// Expires each entry after the TTL it was written with.
struct PerEntryTtl;

impl Expiry<String, Entry> for PerEntryTtl {
    fn expire_after_create(&self, _key: &String, value: &Entry, _created_at: Instant) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &Entry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// An in-process [`UrlCache`] backed by Moka.
///
/// Suited to single-node deployments. Each entry honours the TTL passed to
/// [`UrlCache::set_url`].
#[derive(Debug, Clone)]
pub struct MokaUrlCache {
    cache: Cache<String, Entry>,
}

impl MokaUrlCache {
    /// Creates a cache holding at most 10,000 entries.
    pub fn new() -> Self {
        Self::with_capacity(10_000)
    }

    pub fn with_capacity(max_capacity: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(PerEntryTtl)
            .build();
        Self { cache }
    }
}

impl Default for MokaUrlCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UrlCache for MokaUrlCache {
    async fn get_url(&self, code: &ShortCode) -> Result<Option<StoredEntity>> {
        let hit = self.cache.get(code.as_str()).await.map(|entry| entry.entity);
        trace!(code = %code, hit = hit.is_some(), "moka lookup");
        Ok(hit)
    }

    async fn set_url(&self, entity: &StoredEntity, ttl: Duration) -> Result<()> {
        let key = entity.short_code().as_str().to_string();
        self.cache
            .insert(
                key,
                Entry {
                    entity: entity.clone(),
                    ttl,
                },
            )
            .await;
        Ok(())
    }

    async fn del(&self, code: &ShortCode) -> Result<()> {
        self.cache.invalidate(code.as_str()).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiff::{SignedDuration, Timestamp};
    use tinylink_test_infra::entity;

    fn sample(code: &str) -> StoredEntity {
        entity(code, "https://example.com", Timestamp::now(), SignedDuration::from_secs(60))
    }

    #[tokio::test]
    async fn get_and_set() {
        let cache = MokaUrlCache::new();
        let url = sample("abc123");

        assert!(cache.get_url(url.short_code()).await.unwrap().is_none());
        cache.set_url(&url, Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.get_url(url.short_code()).await.unwrap(), Some(url));
    }

    #[tokio::test]
    async fn del_is_idempotent() {
        let cache = MokaUrlCache::new();
        let url = sample("abc123");
        cache.set_url(&url, Duration::from_secs(60)).await.unwrap();

        cache.del(url.short_code()).await.unwrap();
        cache.del(url.short_code()).await.unwrap();
        assert!(cache.get_url(url.short_code()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn entries_expire_after_their_own_ttl() {
        let cache = MokaUrlCache::new();
        let short = sample("short1");
        let long = sample("long1");

        cache.set_url(&short, Duration::from_millis(50)).await.unwrap();
        cache.set_url(&long, Duration::from_secs(60)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(120)).await;

        assert!(cache.get_url(short.short_code()).await.unwrap().is_none());
        assert!(cache.get_url(long.short_code()).await.unwrap().is_some());
    }
}
