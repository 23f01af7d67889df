use crate::breaker::{BreakerPermit, CircuitBreaker, CircuitState};
use jiff::{SignedDuration, Timestamp};
use std::sync::Arc;
use std::time::Duration;
use tinylink_core::{CacheError, Clock, ShortCode, StoredEntity, SystemClock, UrlCache};
use tracing::{debug, trace};
use typed_builder::TypedBuilder;

/// Deadlines and TTL padding for a [`GuardedCache`].
#[derive(Debug, Clone, Copy, TypedBuilder)]
pub struct GuardedCacheSettings {
    /// Deadline for a single cache call.
    #[builder(default = Duration::from_millis(250))]
    pub timeout: Duration,
    /// Added to an entity's remaining lifetime when computing its TTL.
    #[builder(default = Duration::from_secs(1))]
    pub ttl_buffer: Duration,
}

impl Default for GuardedCacheSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Outcome of a guarded cache read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    Hit(StoredEntity),
    Miss,
    /// The breaker was open and the backend was not called.
    Bypassed,
    /// The backend failed or missed its deadline.
    Failed,
}

/// Outcome of a guarded cache write or eviction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheWriteOutcome {
    Written,
    /// Nothing to write, the entity has no remaining lifetime.
    Skipped,
    Bypassed,
    Failed,
}

/// Computes the TTL for caching an entity that expires at `expires_at`.
///
/// Returns `None` when the entity has no remaining lifetime.
pub fn cache_ttl(expires_at: Timestamp, now: Timestamp, buffer: Duration) -> Option<Duration> {
    let remaining = expires_at.duration_since(now);
    if remaining <= SignedDuration::ZERO {
        return None;
    }
    let remaining = Duration::try_from(remaining).ok()?;
    Some(remaining.saturating_add(buffer))
}

/// A [`UrlCache`] wrapped in a circuit breaker and per-call deadlines.
///
/// Every backend call is preceded by a breaker check and followed by an
/// outcome report. Errors never escape: callers see a [`CacheLookup`] or
/// [`CacheWriteOutcome`] and fall back to the authoritative store.
pub struct GuardedCache<C> {
    inner: C,
    breaker: Arc<CircuitBreaker>,
    clock: Arc<dyn Clock>,
    settings: GuardedCacheSettings,
}

impl<C: UrlCache> GuardedCache<C> {
    pub fn new(inner: C, breaker: Arc<CircuitBreaker>, settings: GuardedCacheSettings) -> Self {
        Self::with_clock(inner, breaker, settings, Arc::new(SystemClock))
    }

    pub fn with_clock(
        inner: C,
        breaker: Arc<CircuitBreaker>,
        settings: GuardedCacheSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner,
            breaker,
            clock,
            settings,
        }
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub fn breaker_state(&self) -> CircuitState {
        self.breaker.state()
    }

    /// Runs `fut` under the call deadline and settles `permit` with the
    /// outcome. If this future is dropped first, the permit is dropped with
    /// it and any probe slot goes back to the breaker.
    async fn call<T, F>(&self, permit: BreakerPermit<'_>, fut: F) -> Result<T, CacheError>
    where
        F: std::future::Future<Output = Result<T, CacheError>>,
    {
        let outcome = match tokio::time::timeout(self.settings.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::Timeout(format!(
                "cache call exceeded {:?}",
                self.settings.timeout
            ))),
        };
        match &outcome {
            Ok(_) => permit.success(),
            Err(_) => permit.failure(),
        }
        outcome
    }

    pub async fn get(&self, code: &ShortCode) -> CacheLookup {
        let Some(permit) = self.breaker.try_acquire() else {
            trace!(code = %code, "cache breaker open, skipping lookup");
            return CacheLookup::Bypassed;
        };

        match self.call(permit, self.inner.get_url(code)).await {
            Ok(Some(entity)) => {
                debug!(code = %code, "cache hit");
                CacheLookup::Hit(entity)
            }
            Ok(None) => {
                debug!(code = %code, "cache miss");
                CacheLookup::Miss
            }
            Err(e) => {
                debug!(code = %code, error = %e, "cache lookup failed, falling back to store");
                CacheLookup::Failed
            }
        }
    }

    pub async fn put(&self, entity: &StoredEntity) -> CacheWriteOutcome {
        let code = entity.short_code();
        if entity.is_deleted() {
            return CacheWriteOutcome::Skipped;
        }
        let Some(ttl) = cache_ttl(
            entity.expires_at(),
            self.clock.now(),
            self.settings.ttl_buffer,
        ) else {
            trace!(code = %code, "entity already expired, not caching");
            return CacheWriteOutcome::Skipped;
        };
        let Some(permit) = self.breaker.try_acquire() else {
            trace!(code = %code, "cache breaker open, skipping write");
            return CacheWriteOutcome::Bypassed;
        };

        match self.call(permit, self.inner.set_url(entity, ttl)).await {
            Ok(()) => {
                trace!(code = %code, ttl_ms = ttl.as_millis() as u64, "cached entity");
                CacheWriteOutcome::Written
            }
            Err(e) => {
                debug!(code = %code, error = %e, "cache write failed");
                CacheWriteOutcome::Failed
            }
        }
    }

    pub async fn evict(&self, code: &ShortCode) -> CacheWriteOutcome {
        let Some(permit) = self.breaker.try_acquire() else {
            trace!(code = %code, "cache breaker open, skipping eviction");
            return CacheWriteOutcome::Bypassed;
        };

        match self.call(permit, self.inner.del(code)).await {
            Ok(()) => CacheWriteOutcome::Written,
            Err(e) => {
                debug!(code = %code, error = %e, "cache eviction failed");
                CacheWriteOutcome::Failed
            }
        }
    }
}
