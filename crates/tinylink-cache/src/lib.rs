//! Cache backends and the resilience layer in front of them.
//!
//! [`GuardedCache`] wraps any [`tinylink_core::UrlCache`] with a
//! [`CircuitBreaker`] and per-call deadlines, and [`CacheWriter`] applies
//! population and eviction off the request path.

pub mod breaker;
pub mod guarded;
pub mod moka;
pub mod redis;
pub mod writer;

pub use breaker::{BreakerPermit, BreakerSnapshot, CircuitBreaker, CircuitBreakerSettings, CircuitState};
pub use guarded::{cache_ttl, CacheLookup, CacheWriteOutcome, GuardedCache, GuardedCacheSettings};
pub use self::moka::MokaUrlCache;
pub use self::redis::RedisUrlCache;
pub use writer::{CacheWriter, DEFAULT_QUEUE_CAPACITY};
