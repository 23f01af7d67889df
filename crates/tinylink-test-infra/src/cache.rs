use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tinylink_core::cache::Result;
use tinylink_core::{CacheError, ShortCode, StoredEntity, UrlCache};

/// One `set_url` call as observed by [`ScriptedCache`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheWrite {
    pub code: ShortCode,
    pub ttl: Duration,
}

#[derive(Debug, Default)]
struct State {
    entries: HashMap<String, StoredEntity>,
    raw_failures: HashMap<String, CacheError>,
    writes: Vec<CacheWrite>,
    failing: bool,
    delay: Option<Duration>,
    gets: usize,
    dels: usize,
}

/// An in-process [`UrlCache`] whose health can be scripted.
///
/// Entries never expire on their own; the TTL of every write is recorded so
/// tests can assert on it. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct ScriptedCache {
    state: Arc<Mutex<State>>,
}

impl ScriptedCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent operation fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.state.lock().failing = failing;
    }

    /// Delays every subsequent operation, e.g. to trip a deadline.
    pub fn set_delay(&self, delay: Option<Duration>) {
        self.state.lock().delay = delay;
    }

    /// Seeds an entry without recording a write.
    pub fn seed(&self, entity: StoredEntity) {
        self.state
            .lock()
            .entries
            .insert(entity.short_code().as_str().to_string(), entity);
    }

    /// Makes reads of one key fail, as a corrupt payload would.
    pub fn corrupt(&self, code: &ShortCode) {
        self.state.lock().raw_failures.insert(
            code.as_str().to_string(),
            CacheError::InvalidData(format!("corrupt value for '{code}'")),
        );
    }

    pub fn contains(&self, code: &ShortCode) -> bool {
        self.state.lock().entries.contains_key(code.as_str())
    }

    pub fn writes(&self) -> Vec<CacheWrite> {
        self.state.lock().writes.clone()
    }

    pub fn get_calls(&self) -> usize {
        self.state.lock().gets
    }

    pub fn del_calls(&self) -> usize {
        self.state.lock().dels
    }

    async fn pause(&self) {
        let delay = self.state.lock().delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn check_health(state: &State) -> Result<()> {
        if state.failing {
            return Err(CacheError::Unavailable("scripted failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl UrlCache for ScriptedCache {
    async fn get_url(&self, code: &ShortCode) -> Result<Option<StoredEntity>> {
        self.pause().await;
        let mut state = self.state.lock();
        state.gets += 1;
        Self::check_health(&state)?;

        if let Some(err) = state.raw_failures.get(code.as_str()) {
            return Err(err.clone());
        }
        Ok(state.entries.get(code.as_str()).cloned())
    }

    async fn set_url(&self, entity: &StoredEntity, ttl: Duration) -> Result<()> {
        self.pause().await;
        let mut state = self.state.lock();
        state.writes.push(CacheWrite {
            code: entity.short_code().clone(),
            ttl,
        });
        Self::check_health(&state)?;

        let key = entity.short_code().as_str().to_string();
        state.raw_failures.remove(&key);
        state.entries.insert(key, entity.clone());
        Ok(())
    }

    async fn del(&self, code: &ShortCode) -> Result<()> {
        self.pause().await;
        let mut state = self.state.lock();
        state.dels += 1;
        Self::check_health(&state)?;

        state.entries.remove(code.as_str());
        state.raw_failures.remove(code.as_str());
        Ok(())
    }
}
