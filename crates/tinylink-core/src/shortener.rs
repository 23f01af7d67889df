use crate::error::ShortenerError;
use crate::shortcode::ShortCode;
use async_trait::async_trait;

type Result<T> = std::result::Result<T, ShortenerError>;

/// Parameters for creating a shortened URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortenParams {
    /// The original URL to be shortened.
    pub original_url: String,
    /// Optional custom alias for the shortened URL.
    pub custom_alias: Option<String>,
}

impl ShortenParams {
    pub fn new(original_url: impl Into<String>) -> Self {
        Self {
            original_url: original_url.into(),
            custom_alias: None,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.custom_alias = Some(alias.into());
        self
    }
}

/// The creation side of the service.
#[async_trait]
pub trait Shortener: Send + Sync + 'static {
    /// Creates a shortened URL and returns its short code.
    async fn shorten(&self, params: ShortenParams) -> Result<ShortCode>;

    /// Logically deletes a shortened URL by its short code.
    /// Returns `true` if a live record existed and was removed.
    async fn delete(&self, code: &ShortCode) -> Result<bool>;
}

/// The resolution side of the service.
#[async_trait]
pub trait Redirector: Send + Sync + 'static {
    /// Resolves a short code to its original URL.
    /// Returns `None` if the code does not exist, was deleted, or has expired.
    async fn resolve(&self, code: &ShortCode) -> Result<Option<String>>;

    /// Reports whether the authoritative store is answering.
    async fn ready(&self) -> bool;
}
