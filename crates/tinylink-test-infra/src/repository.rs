use async_trait::async_trait;
use jiff::Timestamp;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tinylink_core::repository::Result;
use tinylink_core::{ReadRepository, Repository, ShortCode, StorageError, StoredEntity, UrlRecord};

/// How a [`ScriptedRepository`] answers inserts.
#[derive(Debug, Clone, Default)]
pub enum InsertBehavior {
    /// Behave like a real store.
    #[default]
    Normal,
    /// Report every code as taken.
    AlwaysConflict,
    /// Fail every insert with the given error.
    Fail(StorageError),
}

#[derive(Debug, Default)]
struct State {
    rows: HashMap<String, StoredEntity>,
    next_id: u64,
    insert_behavior: InsertBehavior,
    read_failure: Option<StorageError>,
    delay: Option<Duration>,
    creates: Vec<UrlRecord>,
    reads: usize,
}

/// An in-process authoritative store whose answers can be scripted.
///
/// Clones share state.
#[derive(Debug, Clone, Default)]
pub struct ScriptedRepository {
    state: Arc<Mutex<State>>,
}

impl ScriptedRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_insert_behavior(&self, behavior: InsertBehavior) {
        self.state.lock().insert_behavior = behavior;
    }

    pub fn set_read_failure(&self, failure: Option<StorageError>) {
        self.state.lock().read_failure = failure;
    }

    pub fn set_delay(&self, delay: Option<Duration>) {
        self.state.lock().delay = delay;
    }

    /// Stores a row directly, bypassing the insert rules.
    pub fn seed(&self, entity: StoredEntity) {
        let mut state = self.state.lock();
        state.next_id = state.next_id.max(entity.id);
        state
            .rows
            .insert(entity.short_code().as_str().to_string(), entity);
    }

    /// Every record passed to `create`, in call order.
    pub fn create_attempts(&self) -> Vec<UrlRecord> {
        self.state.lock().creates.clone()
    }

    pub fn read_calls(&self) -> usize {
        self.state.lock().reads
    }

    async fn pause(&self) {
        let delay = self.state.lock().delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl ReadRepository for ScriptedRepository {
    async fn get_by_short_code(&self, code: &ShortCode) -> Result<Option<StoredEntity>> {
        self.pause().await;
        let mut state = self.state.lock();
        state.reads += 1;

        if let Some(err) = &state.read_failure {
            return Err(err.clone());
        }

        let now = Timestamp::now();
        Ok(state
            .rows
            .get(code.as_str())
            .filter(|row| row.is_live_at(now))
            .cloned())
    }
}

#[async_trait]
impl Repository for ScriptedRepository {
    async fn create(&self, record: UrlRecord) -> Result<StoredEntity> {
        self.pause().await;
        let mut state = self.state.lock();
        state.creates.push(record.clone());

        match &state.insert_behavior {
            InsertBehavior::Normal => {}
            InsertBehavior::AlwaysConflict => {
                return Err(StorageError::Conflict(record.short_code.to_string()))
            }
            InsertBehavior::Fail(err) => return Err(err.clone()),
        }

        let now = Timestamp::now();
        let key = record.short_code.as_str().to_string();
        if state.rows.get(&key).is_some_and(|row| row.is_live_at(now)) {
            return Err(StorageError::Conflict(key));
        }

        state.next_id += 1;
        let entity = StoredEntity {
            id: state.next_id,
            record,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        state.rows.insert(key, entity.clone());
        Ok(entity)
    }

    async fn delete(&self, code: &ShortCode) -> Result<bool> {
        self.pause().await;
        let mut state = self.state.lock();
        let now = Timestamp::now();

        match state.rows.get_mut(code.as_str()) {
            Some(row) if row.is_live_at(now) => {
                row.deleted_at = Some(now);
                row.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
