//! URL resolution for tinylink.
//!
//! [`CacheAsideResolver`] decorates any [`tinylink_core::ReadRepository`]
//! with a breaker-guarded cache, and [`RedirectorService`] turns lookups
//! into redirect targets.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tinylink_cache::{CacheWriter, CircuitBreaker, GuardedCache, GuardedCacheSettings, MokaUrlCache};
//! use tinylink_core::ShortCode;
//! use tinylink_redirector::{CacheAsideResolver, RedirectorService};
//! use tinylink_storage::InMemoryRepository;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let cache = Arc::new(GuardedCache::new(
//!     MokaUrlCache::new(),
//!     Arc::new(CircuitBreaker::default()),
//!     GuardedCacheSettings::default(),
//! ));
//! let (writer, _worker) = CacheWriter::spawn(Arc::clone(&cache), 1024);
//! let service = RedirectorService::new(CacheAsideResolver::new(
//!     InMemoryRepository::new(),
//!     cache,
//!     writer,
//! ));
//!
//! let code = ShortCode::new("abc123")?;
//! if let Some(url) = tinylink_core::Redirector::resolve(&service, &code).await? {
//!     println!("Redirect to: {url}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod resolver;
pub mod service;

pub use resolver::CacheAsideResolver;
pub use service::RedirectorService;
