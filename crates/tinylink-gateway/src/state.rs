use crate::cli::{CacheBackendArg, Cli, StorageBackendArg};
use anyhow::Context;
use std::sync::Arc;
use tinylink_cache::{CacheWriter, CircuitBreaker, GuardedCache, MokaUrlCache, RedisUrlCache};
use tinylink_core::{Redirector, Repository, Shortener, ShortenerError, UrlCache};
use tinylink_redirector::{CacheAsideResolver, RedirectorService};
use tinylink_shortener::{ShortCodeMinter, ShortenerService};
use tinylink_storage::{InMemoryRepository, MySqlRepository, TimedRepository};
use tokio::task::JoinHandle;
use tracing::info;

/// Shared handles for the HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    shortener: Arc<dyn Shortener>,
    redirector: Arc<dyn Redirector>,
    public_base_url: Arc<str>,
    breaker: Option<Arc<CircuitBreaker>>,
}

impl AppState {
    pub fn new(
        shortener: Arc<dyn Shortener>,
        redirector: Arc<dyn Redirector>,
        public_base_url: impl Into<String>,
    ) -> Self {
        let public_base_url: String = public_base_url.into();
        Self {
            shortener,
            redirector,
            public_base_url: public_base_url.trim_end_matches('/').into(),
            breaker: None,
        }
    }

    pub fn with_breaker(mut self, breaker: Arc<CircuitBreaker>) -> Self {
        self.breaker = Some(breaker);
        self
    }

    pub fn shortener(&self) -> &dyn Shortener {
        self.shortener.as_ref()
    }

    pub fn redirector(&self) -> &dyn Redirector {
        self.redirector.as_ref()
    }

    pub fn public_base_url(&self) -> &str {
        &self.public_base_url
    }

    pub fn breaker(&self) -> Option<&CircuitBreaker> {
        self.breaker.as_deref()
    }
}

/// Background cache work that must be drained before exit.
pub struct CacheWorker {
    pub writer: CacheWriter,
    pub handle: JoinHandle<()>,
}

impl CacheWorker {
    /// Applies every pending cache command, then stops the worker.
    pub async fn shutdown(self) {
        self.writer.flush().await;
        self.handle.abort();
    }
}

/// Everything the composition root builds.
pub struct Services {
    pub state: AppState,
    pub cache_worker: Option<CacheWorker>,
}

impl Services {
    /// Connects the configured backends and wires the services together.
    pub async fn build(cli: &Cli) -> anyhow::Result<Self> {
        let public_base_url = cli.public_base_url.clone().ok_or_else(|| {
            ShortenerError::ConfigurationMissing(format!(
                "{} must be set to build short urls",
                crate::cli::PUBLIC_BASE_URL_ENV
            ))
        })?;
        let policy = cli.policy();
        policy.validate()?;

        let store: Arc<dyn Repository> = match cli.storage {
            StorageBackendArg::InMemory => Arc::new(TimedRepository::new(
                InMemoryRepository::new(),
                cli.store_timeout(),
            )),
            StorageBackendArg::Mysql => {
                let dsn = cli
                    .mysql_dsn
                    .as_deref()
                    .context("mysql dsn is required when storage backend is mysql")?;
                let repository = MySqlRepository::connect(dsn)
                    .await
                    .context("failed to connect to mysql")?;
                repository
                    .ensure_schema()
                    .await
                    .context("failed to prepare mysql schema")?;
                Arc::new(TimedRepository::new(repository, cli.store_timeout()))
            }
        };
        info!(storage_backend = %cli.storage, "store ready");

        let minter = ShortCodeMinter::new(Arc::clone(&store), policy)?;

        let services = match cli.cache {
            CacheBackendArg::Disabled => {
                let shortener = ShortenerService::new(minter);
                let redirector = RedirectorService::new(store);
                Self {
                    state: AppState::new(Arc::new(shortener), Arc::new(redirector), public_base_url),
                    cache_worker: None,
                }
            }
            CacheBackendArg::InMemory => {
                let cache = MokaUrlCache::with_capacity(cli.cache_capacity);
                Self::with_cache(cli, cache, store, minter, public_base_url)
            }
            CacheBackendArg::Redis => {
                let url = cli
                    .redis_url
                    .as_deref()
                    .context("redis url is required when cache backend is redis")?;
                let cache = RedisUrlCache::connect(url)
                    .await
                    .context("failed to connect to redis")?;
                Self::with_cache(cli, cache, store, minter, public_base_url)
            }
        };
        info!(cache_backend = %cli.cache, "services ready");

        Ok(services)
    }

    fn with_cache<C: UrlCache>(
        cli: &Cli,
        cache: C,
        store: Arc<dyn Repository>,
        minter: ShortCodeMinter<Arc<dyn Repository>>,
        public_base_url: String,
    ) -> Self {
        let breaker = Arc::new(CircuitBreaker::new(cli.breaker_settings()));
        let guarded = Arc::new(GuardedCache::new(
            cache,
            Arc::clone(&breaker),
            cli.cache_settings(),
        ));
        let (writer, handle) = CacheWriter::spawn(Arc::clone(&guarded), cli.cache_queue_capacity);

        let shortener = ShortenerService::new(minter).with_cache_writer(writer.clone());
        let redirector = RedirectorService::new(CacheAsideResolver::new(store, guarded, writer.clone()));

        Self {
            state: AppState::new(Arc::new(shortener), Arc::new(redirector), public_base_url)
                .with_breaker(breaker),
            cache_worker: Some(CacheWorker { writer, handle }),
        }
    }
}
