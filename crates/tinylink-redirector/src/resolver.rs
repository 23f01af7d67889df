use async_trait::async_trait;
use std::sync::Arc;
use tinylink_cache::{CacheLookup, CacheWriter, CircuitState, GuardedCache};
use tinylink_core::repository::Result;
use tinylink_core::{Clock, ReadRepository, ShortCode, StoredEntity, SystemClock, UrlCache};
use tracing::{debug, trace};

/// A read-only repository decorator that puts a best-effort cache in front
/// of the authoritative store.
///
/// The cache is consulted through a [`GuardedCache`], so a slow or failing
/// backend only costs a breaker report before the store is asked. Store
/// hits are written back and stale cached copies are evicted through the
/// [`CacheWriter`], off the request path.
///
/// Concurrent misses for the same code each go to the store.
pub struct CacheAsideResolver<R, C> {
    inner: R,
    cache: Arc<GuardedCache<C>>,
    writer: CacheWriter,
    clock: Arc<dyn Clock>,
}

impl<R: ReadRepository, C: UrlCache> CacheAsideResolver<R, C> {
    pub fn new(inner: R, cache: Arc<GuardedCache<C>>, writer: CacheWriter) -> Self {
        Self::with_clock(inner, cache, writer, Arc::new(SystemClock))
    }

    pub fn with_clock(
        inner: R,
        cache: Arc<GuardedCache<C>>,
        writer: CacheWriter,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner,
            cache,
            writer,
            clock,
        }
    }

    pub fn breaker_state(&self) -> CircuitState {
        self.cache.breaker_state()
    }

    /// Schedules removal of any cached copy of `code`.
    pub fn invalidate(&self, code: &ShortCode) {
        trace!(code = %code, "invalidating cache entry");
        self.writer.enqueue_evict(code.clone());
    }

    fn usable_hit(&self, code: &ShortCode, entity: StoredEntity) -> Option<StoredEntity> {
        if entity.is_live_at(self.clock.now()) {
            return Some(entity);
        }
        debug!(code = %code, "cached entity is stale, evicting");
        self.writer.enqueue_evict(code.clone());
        None
    }
}

#[async_trait]
impl<R: ReadRepository, C: UrlCache> ReadRepository for CacheAsideResolver<R, C> {
    async fn get_by_short_code(&self, code: &ShortCode) -> Result<Option<StoredEntity>> {
        if let CacheLookup::Hit(entity) = self.cache.get(code).await {
            if let Some(entity) = self.usable_hit(code, entity) {
                return Ok(Some(entity));
            }
        }

        let found = self.inner.get_by_short_code(code).await?;
        match &found {
            Some(entity) => self.writer.enqueue_put(entity.clone()),
            None => trace!(code = %code, "short code not in store"),
        }
        Ok(found)
    }
}

impl<R, C: UrlCache> std::fmt::Debug for CacheAsideResolver<R, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheAsideResolver")
            .field("breaker", &self.cache.breaker().snapshot())
            .finish_non_exhaustive()
    }
}
