//! `SQLite` implementation of [`KeyValueStore`].

use std::future::Future;

use sqlx::SqlitePool;

use relaysync_app::ports::KeyValueStore;
use relaysync_domain::error::RelaySyncError;

use crate::error::StorageError;

const SELECT_BY_KEY: &str = "SELECT value FROM kv_store WHERE key = ?";
const UPSERT: &str = "INSERT INTO kv_store (key, value, updated_at) VALUES (?, ?, ?) \
     ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at";

/// `SQLite`-backed key-value store.
#[derive(Clone)]
pub struct SqliteKeyValueStore {
    pool: SqlitePool,
}

impl SqliteKeyValueStore {
    /// Create a new store using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl KeyValueStore for SqliteKeyValueStore {
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>, RelaySyncError>> + Send {
        let pool = self.pool.clone();
        let key = key.to_owned();
        async move {
            let row: Option<(String,)> = sqlx::query_as(SELECT_BY_KEY)
                .bind(&key)
                .fetch_optional(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(row.map(|(value,)| value))
        }
    }

    fn put(
        &self,
        key: &str,
        value: &str,
    ) -> impl Future<Output = Result<(), RelaySyncError>> + Send {
        let pool = self.pool.clone();
        let key = key.to_owned();
        let value = value.to_owned();
        async move {
            sqlx::query(UPSERT)
                .bind(&key)
                .bind(&value)
                .bind(chrono::Utc::now().to_rfc3339())
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            tracing::debug!(key = %key, bytes = value.len(), "stored value");
            Ok(())
        }
    }
}
