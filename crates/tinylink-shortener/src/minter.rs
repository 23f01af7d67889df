use crate::generator::{Generator, RandomGenerator};
use crate::policy::ShortCodePolicy;
use jiff::SignedDuration;
use std::sync::Arc;
use tinylink_core::{
    Clock, Repository, ShortCode, ShortenerError, StorageError, StoredEntity, SystemClock,
    UrlRecord,
};
use tracing::{debug, info, warn};

/// Creates new records in the authoritative store.
///
/// A caller-chosen alias is attempted exactly once. Random codes are retried
/// on conflict up to the policy's attempt budget; any other store failure
/// aborts immediately.
#[derive(Debug)]
pub struct ShortCodeMinter<R, G = RandomGenerator> {
    repository: R,
    generator: G,
    policy: ShortCodePolicy,
    ttl: SignedDuration,
    clock: Arc<dyn Clock>,
}

impl<R: Repository> ShortCodeMinter<R, RandomGenerator> {
    /// Builds a minter drawing random codes of the policy's length.
    pub fn new(repository: R, policy: ShortCodePolicy) -> Result<Self, ShortenerError> {
        let generator = RandomGenerator::new(policy.code_length);
        Self::with_generator(repository, generator, policy, Arc::new(SystemClock))
    }
}

impl<R: Repository, G: Generator> ShortCodeMinter<R, G> {
    pub fn with_generator(
        repository: R,
        generator: G,
        policy: ShortCodePolicy,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ShortenerError> {
        policy.validate()?;
        let ttl = SignedDuration::try_from(policy.ttl)
            .map_err(|e| ShortenerError::ConfigurationMissing(format!("record ttl: {e}")))?;
        Ok(Self {
            repository,
            generator,
            policy,
            ttl,
            clock,
        })
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// Validates the input and inserts a new record.
    pub async fn mint(
        &self,
        original_url: &str,
        alias: Option<&str>,
    ) -> Result<StoredEntity, ShortenerError> {
        let original_url = self.policy.validate_url(original_url)?;

        match alias {
            Some(alias) => {
                let code = self.policy.validate_alias(alias)?;
                self.mint_alias(original_url, code).await
            }
            None => self.mint_random(original_url).await,
        }
    }

    async fn mint_alias(
        &self,
        original_url: String,
        code: ShortCode,
    ) -> Result<StoredEntity, ShortenerError> {
        match self.repository.create(self.record(original_url, code)).await {
            Ok(entity) => {
                info!(code = %entity.short_code(), "created short url with alias");
                Ok(entity)
            }
            Err(StorageError::Conflict(code)) => Err(ShortenerError::AliasAlreadyInUse(code)),
            Err(e) => {
                warn!(error = %e, "store rejected alias insert");
                Err(e.into())
            }
        }
    }

    async fn mint_random(&self, original_url: String) -> Result<StoredEntity, ShortenerError> {
        for attempt in 1..=self.policy.max_attempts {
            let code = self.generator.generate();
            let record = self.record(original_url.clone(), code);

            match self.repository.create(record).await {
                Ok(entity) => {
                    info!(code = %entity.short_code(), attempt, "created short url");
                    return Ok(entity);
                }
                Err(StorageError::Conflict(code)) => {
                    debug!(code = %code, attempt, "short code collision, retrying");
                }
                Err(e) => {
                    warn!(error = %e, attempt, "store rejected insert");
                    return Err(e.into());
                }
            }
        }

        warn!(attempts = self.policy.max_attempts, "exhausted short code attempts");
        Err(ShortenerError::MaxRetriesExceeded(self.policy.max_attempts))
    }

    fn record(&self, original_url: String, short_code: ShortCode) -> UrlRecord {
        UrlRecord {
            original_url,
            short_code,
            expires_at: self.clock.now() + self.ttl,
        }
    }
}
