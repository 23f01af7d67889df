use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tinylink_core::repository::Result;
use tinylink_core::{ReadRepository, Repository, ShortCode, StorageError, StoredEntity, UrlRecord};
use tracing::warn;

/// Default deadline for a single store call.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(3);

/// Bounds every call on the wrapped repository by a deadline.
///
/// A call that misses its deadline fails with [`StorageError::Timeout`].
#[derive(Debug, Clone)]
pub struct TimedRepository<R> {
    inner: R,
    timeout: Duration,
}

impl<R> TimedRepository<R> {
    pub fn new(inner: R, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    async fn bounded<T>(&self, op: &str, fut: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!(op, timeout_ms = self.timeout.as_millis() as u64, "store call timed out");
                Err(StorageError::Timeout(format!(
                    "{op} exceeded {:?}",
                    self.timeout
                )))
            }
        }
    }
}

#[async_trait]
impl<R: ReadRepository> ReadRepository for TimedRepository<R> {
    async fn get_by_short_code(&self, code: &ShortCode) -> Result<Option<StoredEntity>> {
        self.bounded("get_by_short_code", self.inner.get_by_short_code(code))
            .await
    }
}

#[async_trait]
impl<R: Repository> Repository for TimedRepository<R> {
    async fn create(&self, record: UrlRecord) -> Result<StoredEntity> {
        self.bounded("create", self.inner.create(record)).await
    }

    async fn delete(&self, code: &ShortCode) -> Result<bool> {
        self.bounded("delete", self.inner.delete(code)).await
    }
}
