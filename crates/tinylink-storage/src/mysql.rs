use async_trait::async_trait;
use jiff::Timestamp;
use sqlx::mysql::MySqlRow;
use sqlx::{MySqlPool, Row};
use std::sync::Arc;
use tinylink_core::repository::Result;
use tinylink_core::{
    Clock, ReadRepository, Repository, ShortCode, StorageError, StoredEntity, SystemClock,
    UrlRecord,
};
use tracing::debug;

const SCHEMA: &str = include_str!("../ddl/mysql/short_urls.sql");

/// MySQL implementation of the repository contract.
///
/// Timestamps are stored as BIGINT milliseconds since the Unix epoch. A code
/// has at most one row and the unique index on `short_code` arbitrates
/// concurrent claims. Every statement runs on its own in autocommit, so no
/// locks are held across statements. A create that hits the unique index
/// removes the existing row only if it is expired or soft-deleted, then
/// inserts once more.
#[derive(Debug, Clone)]
pub struct MySqlRepository {
    pool: MySqlPool,
    clock: Arc<dyn Clock>,
}

impl MySqlRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self::with_clock(pool, Arc::new(SystemClock))
    }

    pub fn with_clock(pool: MySqlPool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }

    /// Opens a new connection pool against `database_url`.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = MySqlPool::connect(database_url)
            .await
            .map_err(map_sqlx_error)?;
        Ok(Self::new(pool))
    }

    /// Creates the `short_urls` table if it does not exist.
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        debug!("short_urls schema ensured");
        Ok(())
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    /// Inserts a row, returning `None` when the code already has one.
    async fn insert(&self, record: &UrlRecord, now_ms: i64) -> Result<Option<u64>> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO short_urls
                (short_code, original_url, expires_at, created_at, updated_at, deleted_at)
            VALUES (?, ?, ?, ?, ?, NULL)
            "#,
        )
        .bind(record.short_code.as_str())
        .bind(&record.original_url)
        .bind(to_millis(record.expires_at))
        .bind(now_ms)
        .bind(now_ms)
        .execute(&self.pool)
        .await;

        match inserted {
            Ok(result) => Ok(Some(result.last_insert_id())),
            Err(err) if is_unique_violation(&err) => Ok(None),
            Err(err) => Err(map_sqlx_error(err)),
        }
    }

    /// Removes the row for `code` if it is expired or soft-deleted.
    async fn clear_stale(&self, code: &ShortCode, now_ms: i64) -> Result<bool> {
        let cleared = sqlx::query(
            r#"
            DELETE FROM short_urls
            WHERE short_code = ?
              AND (deleted_at IS NOT NULL OR expires_at <= ?)
            "#,
        )
        .bind(code.as_str())
        .bind(now_ms)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(cleared.rows_affected() > 0)
    }
}

fn to_millis(ts: Timestamp) -> i64 {
    ts.as_millisecond()
}

fn from_millis(column: &str, millis: i64) -> Result<Timestamp> {
    Timestamp::from_millisecond(millis).map_err(|e| {
        StorageError::InvalidData(format!("invalid {column} timestamp '{millis}': {e}"))
    })
}

fn decode_row(row: &MySqlRow) -> Result<StoredEntity> {
    let id: u64 = row.try_get("id").map_err(map_sqlx_error)?;
    let short_code: String = row.try_get("short_code").map_err(map_sqlx_error)?;
    let original_url: String = row.try_get("original_url").map_err(map_sqlx_error)?;
    let expires_at: i64 = row.try_get("expires_at").map_err(map_sqlx_error)?;
    let created_at: i64 = row.try_get("created_at").map_err(map_sqlx_error)?;
    let updated_at: i64 = row.try_get("updated_at").map_err(map_sqlx_error)?;
    let deleted_at: Option<i64> = row.try_get("deleted_at").map_err(map_sqlx_error)?;

    let short_code = ShortCode::new(short_code)
        .map_err(|e| StorageError::InvalidData(format!("invalid stored short code: {e}")))?;

    Ok(StoredEntity {
        id,
        record: UrlRecord {
            original_url,
            short_code,
            expires_at: from_millis("expires_at", expires_at)?,
        },
        created_at: from_millis("created_at", created_at)?,
        updated_at: from_millis("updated_at", updated_at)?,
        deleted_at: deleted_at
            .map(|millis| from_millis("deleted_at", millis))
            .transpose()?,
    })
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(sqlx::error::DatabaseError::is_unique_violation)
}

fn map_sqlx_error(err: sqlx::Error) -> StorageError {
    let message = err.to_string();

    match err {
        sqlx::Error::PoolTimedOut => StorageError::Timeout(message),
        sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StorageError::Unavailable(message),
        sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::TypeNotFound { .. }
        | sqlx::Error::Decode(_) => StorageError::InvalidData(message),
        _ => StorageError::Query(message),
    }
}

#[async_trait]
impl ReadRepository for MySqlRepository {
    async fn get_by_short_code(&self, code: &ShortCode) -> Result<Option<StoredEntity>> {
        let now = to_millis(self.clock.now());

        let row = sqlx::query(
            r#"
            SELECT id, short_code, original_url, expires_at, created_at, updated_at, deleted_at
            FROM short_urls
            WHERE short_code = ?
              AND deleted_at IS NULL
              AND expires_at > ?
            LIMIT 1
            "#,
        )
        .bind(code.as_str())
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.as_ref().map(decode_row).transpose()
    }
}

#[async_trait]
impl Repository for MySqlRepository {
    async fn create(&self, mut record: UrlRecord) -> Result<StoredEntity> {
        let now_ms = to_millis(self.clock.now());
        record.expires_at = from_millis("expires_at", to_millis(record.expires_at))?;

        let id = match self.insert(&record, now_ms).await? {
            Some(id) => id,
            None => {
                if !self.clear_stale(&record.short_code, now_ms).await? {
                    return Err(StorageError::Conflict(record.short_code.to_string()));
                }
                debug!(code = %record.short_code, "reclaimed stale short code");
                // another writer may claim the code between the two statements
                self.insert(&record, now_ms)
                    .await?
                    .ok_or_else(|| StorageError::Conflict(record.short_code.to_string()))?
            }
        };

        Ok(StoredEntity {
            id,
            record,
            created_at: from_millis("created_at", now_ms)?,
            updated_at: from_millis("updated_at", now_ms)?,
            deleted_at: None,
        })
    }

    async fn delete(&self, code: &ShortCode) -> Result<bool> {
        let now = to_millis(self.clock.now());

        let result = sqlx::query(
            r#"
            UPDATE short_urls
            SET deleted_at = ?, updated_at = ?
            WHERE short_code = ?
              AND deleted_at IS NULL
              AND expires_at > ?
            "#,
        )
        .bind(now)
        .bind(now)
        .bind(code.as_str())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn millisecond_timestamps_survive_storage() {
        let ts = Timestamp::from_millisecond(1_700_000_000_123).unwrap();
        assert_eq!(from_millis("expires_at", to_millis(ts)).unwrap(), ts);
    }

    #[test]
    fn out_of_range_millis_is_invalid_data() {
        let err = from_millis("expires_at", i64::MAX).unwrap_err();
        assert!(matches!(err, StorageError::InvalidData(_)));
    }

    #[test]
    fn pool_errors_map_to_availability() {
        assert!(matches!(
            map_sqlx_error(sqlx::Error::PoolTimedOut),
            StorageError::Timeout(_)
        ));
        assert!(matches!(
            map_sqlx_error(sqlx::Error::PoolClosed),
            StorageError::Unavailable(_)
        ));
        assert!(matches!(
            map_sqlx_error(sqlx::Error::RowNotFound),
            StorageError::Query(_)
        ));
    }
}
