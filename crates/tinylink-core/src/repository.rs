use crate::error::StorageError;
use crate::shortcode::ShortCode;
use async_trait::async_trait;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// A URL mapping as produced by the minter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlRecord {
    /// The original URL that was shortened.
    pub original_url: String,
    /// The short code that resolves to `original_url`.
    pub short_code: ShortCode,
    /// When the record stops resolving.
    pub expires_at: Timestamp,
}

impl UrlRecord {
    /// Returns true once `now` has reached the record's expiration.
    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        now >= self.expires_at
    }
}

/// A [`UrlRecord`] as persisted by an authoritative store.
///
/// This is also the value written to the cache tier, so it round-trips
/// through JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredEntity {
    pub id: u64,
    #[serde(flatten)]
    pub record: UrlRecord,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    /// Set when the record has been logically deleted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<Timestamp>,
}

impl StoredEntity {
    pub fn short_code(&self) -> &ShortCode {
        &self.record.short_code
    }

    pub fn original_url(&self) -> &str {
        &self.record.original_url
    }

    pub fn expires_at(&self) -> Timestamp {
        self.record.expires_at
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// A record is live while it is neither deleted nor expired.
    pub fn is_live_at(&self, now: Timestamp) -> bool {
        !self.is_deleted() && !self.record.is_expired_at(now)
    }
}

/// A read-only view of an authoritative store.
///
/// This trait provides only the read operations from [`Repository`],
/// allowing services like the redirector to have read-only access.
#[async_trait]
pub trait ReadRepository: Send + Sync + 'static {
    /// Retrieves the live record for a given short code.
    ///
    /// Implementations must return `None` for codes whose record is
    /// soft-deleted or expired.
    async fn get_by_short_code(&self, code: &ShortCode) -> Result<Option<StoredEntity>>;
}

#[async_trait]
pub trait Repository: ReadRepository {
    /// Inserts a new record.
    ///
    /// The check for a live holder of the same short code and the insert are
    /// one atomic step. Returns `Err(StorageError::Conflict)` if a live record
    /// already holds the code; expired or deleted holders do not conflict.
    async fn create(&self, record: UrlRecord) -> Result<StoredEntity>;

    /// Logically deletes the live record for a short code.
    /// Returns `true` if a live record existed.
    async fn delete(&self, code: &ShortCode) -> Result<bool>;
}

#[async_trait]
impl<R: ReadRepository + ?Sized> ReadRepository for std::sync::Arc<R> {
    async fn get_by_short_code(&self, code: &ShortCode) -> Result<Option<StoredEntity>> {
        (**self).get_by_short_code(code).await
    }
}

#[async_trait]
impl<R: Repository + ?Sized> Repository for std::sync::Arc<R> {
    async fn create(&self, record: UrlRecord) -> Result<StoredEntity> {
        (**self).create(record).await
    }

    async fn delete(&self, code: &ShortCode) -> Result<bool> {
        (**self).delete(code).await
    }
}
