use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tinylink_core::repository::Result;
use tinylink_core::{
    Clock, ReadRepository, Repository, ShortCode, StorageError, StoredEntity, SystemClock,
    UrlRecord,
};

/// In-memory authoritative store backed by a [`DashMap`].
///
/// Check-and-insert runs under the shard lock of the code's entry, so two
/// concurrent creates of the same code cannot both succeed. Expired and
/// deleted rows stay in the map until their code is claimed again.
#[derive(Debug)]
pub struct InMemoryRepository {
    rows: DashMap<String, StoredEntity>,
    next_id: AtomicU64,
    clock: Arc<dyn Clock>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            rows: DashMap::new(),
            next_id: AtomicU64::new(1),
            clock,
        }
    }

    /// Number of rows held, including expired and deleted ones.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn new_entity(&self, record: UrlRecord) -> StoredEntity {
        let now = self.clock.now();
        StoredEntity {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            record,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReadRepository for InMemoryRepository {
    async fn get_by_short_code(&self, code: &ShortCode) -> Result<Option<StoredEntity>> {
        let now = self.clock.now();
        Ok(self
            .rows
            .get(code.as_str())
            .filter(|row| row.is_live_at(now))
            .map(|row| row.clone()))
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn create(&self, record: UrlRecord) -> Result<StoredEntity> {
        let now = self.clock.now();
        match self.rows.entry(record.short_code.as_str().to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_live_at(now) {
                    return Err(StorageError::Conflict(record.short_code.to_string()));
                }
                let entity = self.new_entity(record);
                occupied.insert(entity.clone());
                Ok(entity)
            }
            Entry::Vacant(vacant) => {
                let entity = self.new_entity(record);
                vacant.insert(entity.clone());
                Ok(entity)
            }
        }
    }

    async fn delete(&self, code: &ShortCode) -> Result<bool> {
        let now = self.clock.now();
        let Some(mut row) = self.rows.get_mut(code.as_str()) else {
            return Ok(false);
        };
        if !row.is_live_at(now) {
            return Ok(false);
        }
        row.deleted_at = Some(now);
        row.updated_at = now;
        Ok(true)
    }
}
