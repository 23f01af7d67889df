use std::time::Duration;
use tinylink_core::{ShortCode, ShortenerError};
use typed_builder::TypedBuilder;
use url::Url;

/// Path segments the gateway routes itself; they can never be aliases.
pub const RESERVED_PATHS: &[&str] = &["health", "ready", "metrics", "urls", "version"];

const DEFAULT_SCHEME_PREFIX: &str = "https://";

/// Rules applied to every new short URL.
#[derive(Debug, Clone, TypedBuilder)]
pub struct ShortCodePolicy {
    /// Length of randomly generated codes.
    #[builder(default = 6)]
    pub code_length: usize,
    #[builder(default = 30)]
    pub max_alias_length: usize,
    #[builder(default = 1000)]
    pub max_url_length: usize,
    /// Insert attempts for a random code before giving up.
    #[builder(default = 10)]
    pub max_attempts: u32,
    /// Lifetime of a new record.
    #[builder(default = Duration::from_millis(30_000))]
    pub ttl: Duration,
}

impl Default for ShortCodePolicy {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ShortCodePolicy {
    /// Rejects settings under which no code could ever be minted.
    pub fn validate(&self) -> Result<(), ShortenerError> {
        if self.code_length == 0 {
            return Err(ShortenerError::ConfigurationMissing(
                "code length must be at least 1".to_string(),
            ));
        }
        if self.code_length > self.max_alias_length {
            return Err(ShortenerError::ConfigurationMissing(format!(
                "code length {} exceeds the maximum alias length {}",
                self.code_length, self.max_alias_length
            )));
        }
        if self.max_attempts == 0 {
            return Err(ShortenerError::ConfigurationMissing(
                "max attempts must be at least 1".to_string(),
            ));
        }
        if self.ttl.is_zero() {
            return Err(ShortenerError::ConfigurationMissing(
                "record ttl must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Checks `raw` and returns the URL to store.
    ///
    /// Input without `://` gets an `https://` prefix. The result must parse
    /// as an absolute URL with a host.
    pub fn validate_url(&self, raw: &str) -> Result<String, ShortenerError> {
        if raw.is_empty() {
            return Err(ShortenerError::InvalidUrl("url must not be empty".to_string()));
        }
        if raw.len() > self.max_url_length {
            return Err(ShortenerError::UrlTooLong {
                len: raw.len(),
                max: self.max_url_length,
            });
        }

        let candidate = if raw.contains("://") {
            raw.to_string()
        } else {
            format!("{DEFAULT_SCHEME_PREFIX}{raw}")
        };

        let parsed = Url::parse(&candidate)
            .map_err(|e| ShortenerError::InvalidUrl(format!("'{raw}': {e}")))?;
        if parsed.host_str().is_none_or(str::is_empty) {
            return Err(ShortenerError::InvalidUrl(format!("'{raw}' has no host")));
        }

        Ok(candidate)
    }

    /// Checks a caller-chosen alias.
    pub fn validate_alias(&self, alias: &str) -> Result<ShortCode, ShortenerError> {
        if alias.len() > self.max_alias_length {
            return Err(ShortenerError::InvalidAlias(format!(
                "alias is longer than {} characters",
                self.max_alias_length
            )));
        }
        if RESERVED_PATHS.contains(&alias) {
            return Err(ShortenerError::InvalidAlias(format!("'{alias}' is reserved")));
        }
        ShortCode::new(alias)
    }
}
