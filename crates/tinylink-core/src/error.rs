use thiserror::Error;

/// Errors raised by a cache backend.
///
/// These never reach callers of the public operations. They are absorbed by
/// the cache-aside layer and only show up in logs and circuit breaker state.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
    #[error("cache operation timed out: {0}")]
    Timeout(String),
    #[error("cache serialization failed: {0}")]
    Serialization(String),
    #[error("cache value is invalid: {0}")]
    InvalidData(String),
    #[error("cache operation failed: {0}")]
    Operation(String),
}

/// Errors raised by an authoritative store.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    /// The short code is held by a live record.
    #[error("short code already in use: {0}")]
    Conflict(String),
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("storage operation timed out: {0}")]
    Timeout(String),
    #[error("storage query failed: {0}")]
    Query(String),
    #[error("stored data is invalid: {0}")]
    InvalidData(String),
    #[error("storage operation failed: {0}")]
    Operation(String),
}

/// Errors surfaced by the create and resolve operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShortenerError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("url is {len} characters long, the maximum is {max}")]
    UrlTooLong { len: usize, max: usize },
    #[error("invalid alias: {0}")]
    InvalidAlias(String),
    #[error("alias already in use: {0}")]
    AliasAlreadyInUse(String),
    #[error("failed to generate a unique short code after {0} attempts")]
    MaxRetriesExceeded(u32),
    #[error("short code not found: {0}")]
    ShortCodeNotFound(String),
    #[error("data store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("configuration missing: {0}")]
    ConfigurationMissing(String),
}

impl From<StorageError> for ShortenerError {
    fn from(value: StorageError) -> Self {
        Self::StoreUnavailable(value.to_string())
    }
}
