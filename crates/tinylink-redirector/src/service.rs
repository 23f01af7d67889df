use async_trait::async_trait;
use std::sync::Arc;
use tinylink_core::{
    Clock, ReadRepository, Redirector, ShortCode, ShortenerError, SystemClock,
};
use tracing::{debug, trace, warn};

/// Code probed by [`RedirectorService::ready`]. It is never minted, as the
/// underscores fall outside the short code alphabet.
const READINESS_PROBE_CODE: &str = "__health_check__";

/// The resolution side of the service.
#[derive(Debug, Clone)]
pub struct RedirectorService<R> {
    repository: Arc<R>,
    clock: Arc<dyn Clock>,
}

impl<R: ReadRepository> RedirectorService<R> {
    pub fn new(repository: R) -> Self {
        Self::with_clock(repository, Arc::new(SystemClock))
    }

    pub fn with_clock(repository: R, clock: Arc<dyn Clock>) -> Self {
        Self {
            repository: Arc::new(repository),
            clock,
        }
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// Resolves `code`, mapping an absent, expired or deleted record to
    /// [`ShortenerError::ShortCodeNotFound`].
    pub async fn resolve_or_not_found(&self, code: &ShortCode) -> Result<String, ShortenerError> {
        self.resolve(code)
            .await?
            .ok_or_else(|| ShortenerError::ShortCodeNotFound(code.to_string()))
    }
}

#[async_trait]
impl<R: ReadRepository> Redirector for RedirectorService<R> {
    async fn resolve(&self, code: &ShortCode) -> Result<Option<String>, ShortenerError> {
        trace!(code = %code, "resolving short code");

        let found = self.repository.get_by_short_code(code).await.map_err(|e| {
            warn!(code = %code, error = %e, "store lookup failed");
            ShortenerError::from(e)
        })?;

        match found {
            Some(entity) if entity.is_live_at(self.clock.now()) => {
                debug!(code = %code, "resolved short code");
                Ok(Some(entity.record.original_url))
            }
            Some(_) => {
                debug!(code = %code, "short code expired");
                Ok(None)
            }
            None => {
                debug!(code = %code, "short code not found");
                Ok(None)
            }
        }
    }

    async fn ready(&self) -> bool {
        let probe = ShortCode::new_unchecked(READINESS_PROBE_CODE);
        match self.repository.get_by_short_code(&probe).await {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "readiness probe failed");
                false
            }
        }
    }
}
