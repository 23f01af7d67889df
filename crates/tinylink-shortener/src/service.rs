use crate::generator::{Generator, RandomGenerator};
use crate::minter::ShortCodeMinter;
use async_trait::async_trait;
use tinylink_cache::CacheWriter;
use tinylink_core::{Repository, ShortCode, ShortenParams, Shortener, ShortenerError};
use tracing::debug;

/// The creation side of the service.
///
/// New records are minted against the authoritative store and then handed
/// to the [`CacheWriter`] for population. Cache trouble never fails a
/// create or delete.
#[derive(Debug)]
pub struct ShortenerService<R, G = RandomGenerator> {
    minter: ShortCodeMinter<R, G>,
    cache_writer: Option<CacheWriter>,
}

impl<R: Repository, G: Generator> ShortenerService<R, G> {
    pub fn new(minter: ShortCodeMinter<R, G>) -> Self {
        Self {
            minter,
            cache_writer: None,
        }
    }

    pub fn with_cache_writer(mut self, writer: CacheWriter) -> Self {
        self.cache_writer = Some(writer);
        self
    }
}

#[async_trait]
impl<R: Repository, G: Generator> Shortener for ShortenerService<R, G> {
    async fn shorten(&self, params: ShortenParams) -> Result<ShortCode, ShortenerError> {
        let entity = self
            .minter
            .mint(&params.original_url, params.custom_alias.as_deref())
            .await?;
        let code = entity.short_code().clone();

        if let Some(writer) = &self.cache_writer {
            writer.enqueue_put(entity);
        }
        Ok(code)
    }

    async fn delete(&self, code: &ShortCode) -> Result<bool, ShortenerError> {
        let deleted = self.minter.repository().delete(code).await?;
        debug!(code = %code, deleted, "delete requested");

        // a stale copy may be cached even when the store had nothing live
        if let Some(writer) = &self.cache_writer {
            writer.enqueue_evict(code.clone());
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::ShortCodePolicy;
    use jiff::{SignedDuration, Timestamp};
    use std::sync::Arc;
    use tinylink_cache::{CircuitBreaker, GuardedCache, GuardedCacheSettings};
    use tinylink_core::{ReadRepository, StorageError};
    use tinylink_test_infra::{entity, InsertBehavior, ScriptedCache, ScriptedRepository};

    struct Harness {
        repo: ScriptedRepository,
        cache: ScriptedCache,
        writer: CacheWriter,
        service: ShortenerService<ScriptedRepository>,
    }

    fn harness() -> Harness {
        let repo = ScriptedRepository::new();
        let cache = ScriptedCache::new();
        let guarded = Arc::new(GuardedCache::new(
            cache.clone(),
            Arc::new(CircuitBreaker::default()),
            GuardedCacheSettings::default(),
        ));
        let (writer, _handle) = CacheWriter::spawn(guarded, 16);
        let minter = ShortCodeMinter::new(repo.clone(), ShortCodePolicy::default()).unwrap();
        let service = ShortenerService::new(minter).with_cache_writer(writer.clone());
        Harness {
            repo,
            cache,
            writer,
            service,
        }
    }

    #[tokio::test]
    async fn shorten_populates_cache() {
        let h = harness();

        let code = h
            .service
            .shorten(ShortenParams::new("https://example.com"))
            .await
            .unwrap();
        h.writer.flush().await;

        assert!(h.cache.contains(&code));
        let ttl = h.cache.writes()[0].ttl;
        assert!(ttl <= std::time::Duration::from_secs(31));
        assert!(ttl > std::time::Duration::from_secs(29));
    }

    #[tokio::test]
    async fn duplicate_alias_leaves_cache_untouched() {
        let h = harness();
        let params = ShortenParams::new("https://example.com").with_alias("promo2024");

        h.service.shorten(params.clone()).await.unwrap();
        h.writer.flush().await;
        let writes_before = h.cache.writes().len();

        let err = h.service.shorten(params).await.unwrap_err();
        h.writer.flush().await;

        assert_eq!(err, ShortenerError::AliasAlreadyInUse("promo2024".to_string()));
        assert_eq!(h.cache.writes().len(), writes_before);
    }

    #[tokio::test]
    async fn failing_cache_does_not_fail_create() {
        let h = harness();
        h.cache.set_failing(true);

        let code = h
            .service
            .shorten(ShortenParams::new("https://example.com"))
            .await
            .unwrap();
        h.writer.flush().await;

        assert!(h.repo.get_by_short_code(&code).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn store_failure_surfaces_as_unavailable() {
        let h = harness();
        h.repo
            .set_insert_behavior(InsertBehavior::Fail(StorageError::Timeout("slow".to_string())));

        let err = h
            .service
            .shorten(ShortenParams::new("https://example.com"))
            .await
            .unwrap_err();

        assert!(matches!(err, ShortenerError::StoreUnavailable(_)));
        assert!(h.cache.writes().is_empty());
    }

    #[tokio::test]
    async fn delete_evicts_cached_copy() {
        let h = harness();
        let url = entity("abc123", "https://example.com", Timestamp::now(), SignedDuration::from_secs(60));
        h.repo.seed(url.clone());
        h.cache.seed(url.clone());

        assert!(h.service.delete(url.short_code()).await.unwrap());
        h.writer.flush().await;

        assert!(!h.cache.contains(url.short_code()));
        assert!(h.repo.get_by_short_code(url.short_code()).await.unwrap().is_none());
        assert!(!h.service.delete(url.short_code()).await.unwrap());
    }

    #[tokio::test]
    async fn works_without_a_cache() {
        let repo = ScriptedRepository::new();
        let minter = ShortCodeMinter::new(repo.clone(), ShortCodePolicy::default()).unwrap();
        let service = ShortenerService::new(minter);

        let code = service
            .shorten(ShortenParams::new("https://example.com"))
            .await
            .unwrap();
        assert!(repo.get_by_short_code(&code).await.unwrap().is_some());
    }
}
