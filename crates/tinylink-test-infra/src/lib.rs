//! Test fixtures shared across the tinylink crates.
//!
//! In-process doubles ([`ScriptedCache`], [`ScriptedRepository`],
//! [`ManualClock`]) cover failure modes that are awkward to provoke in a
//! real backend. The container fixtures start disposable Redis and MySQL
//! servers for the integration suites.

pub mod cache;
pub mod clock;
pub mod error;
pub mod mysql;
pub mod redis;
pub mod repository;

pub use cache::{CacheWrite, ScriptedCache};
pub use clock::ManualClock;
pub use error::{Result, TestInfraError};
pub use repository::{InsertBehavior, ScriptedRepository};

use jiff::{SignedDuration, Timestamp};
use tinylink_core::{ShortCode, StoredEntity, UrlRecord};

/// Builds a live entity that expires `ttl` after `now`.
pub fn entity(code: &str, url: &str, now: Timestamp, ttl: SignedDuration) -> StoredEntity {
    StoredEntity {
        id: 1,
        record: UrlRecord {
            original_url: url.to_string(),
            short_code: ShortCode::new_unchecked(code),
            expires_at: now + ttl,
        },
        created_at: now,
        updated_at: now,
        deleted_at: None,
    }
}
