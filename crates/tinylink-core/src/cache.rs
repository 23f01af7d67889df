use crate::error::CacheError;
use crate::repository::StoredEntity;
use crate::shortcode::ShortCode;
use async_trait::async_trait;
use std::time::Duration;

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

/// A cache for stored URL entities.
///
/// This trait provides a domain-specific caching abstraction for
/// [`StoredEntity`]s, using [`ShortCode`] as the key. Implementations can use
/// Redis, in-memory caches, or other storage backends.
///
/// A missing key is `Ok(None)`; only backend failures are errors.
#[async_trait]
pub trait UrlCache: Send + Sync + 'static {
    /// Get a cached entity.
    ///
    /// Returns `Ok(None)` if the key is not in the cache.
    async fn get_url(&self, code: &ShortCode) -> Result<Option<StoredEntity>>;

    /// Store an entity under its own short code for `ttl`.
    async fn set_url(&self, entity: &StoredEntity, ttl: Duration) -> Result<()>;

    /// Remove a cached entity.
    ///
    /// It is not an error if the key does not exist.
    async fn del(&self, code: &ShortCode) -> Result<()>;
}

#[async_trait]
impl<C: UrlCache + ?Sized> UrlCache for std::sync::Arc<C> {
    async fn get_url(&self, code: &ShortCode) -> Result<Option<StoredEntity>> {
        (**self).get_url(code).await
    }

    async fn set_url(&self, entity: &StoredEntity, ttl: Duration) -> Result<()> {
        (**self).set_url(entity, ttl).await
    }

    async fn del(&self, code: &ShortCode) -> Result<()> {
        (**self).del(code).await
    }
}
