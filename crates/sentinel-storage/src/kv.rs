//! String-keyed local store.
//!
//! The desktop counterpart of per-browser local storage: a flat map of
//! string keys to string values with no schema versioning.

use std::sync::Arc;

use rusqlite::{params, OptionalExtension};

use sentinel_core::error::SentinelError;

use crate::db::Database;

/// A flat string-keyed store.
pub trait KeyValueStore: Send + Sync {
    /// Read a value. Absent keys return `Ok(None)`.
    fn get(&self, key: &str) -> Result<Option<String>, SentinelError>;

    /// Insert or overwrite a value.
    fn set(&self, key: &str, value: &str) -> Result<(), SentinelError>;

    /// Delete a value. Deleting an absent key is not an error.
    fn remove(&self, key: &str) -> Result<(), SentinelError>;

    /// Delete every key.
    fn clear(&self) -> Result<(), SentinelError>;
}

/// `KeyValueStore` backed by the `kv_store` table.
#[derive(Debug, Clone)]
pub struct SqliteKvStore {
    db: Arc<Database>,
}

impl SqliteKvStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

impl KeyValueStore for SqliteKvStore {
    fn get(&self, key: &str) -> Result<Option<String>, SentinelError> {
        self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| SentinelError::Storage(format!("Failed to read '{}': {}", key, e)))
        })
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SentinelError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO kv_store (key, value, updated_at)
                 VALUES (?1, ?2, strftime('%s', 'now'))
                 ON CONFLICT(key) DO UPDATE SET
                    value = excluded.value,
                    updated_at = excluded.updated_at",
                params![key, value],
            )
            .map_err(|e| SentinelError::Storage(format!("Failed to write '{}': {}", key, e)))?;
            Ok(())
        })
    }

    fn remove(&self, key: &str) -> Result<(), SentinelError> {
        self.db.with_conn(|conn| {
            conn.execute("DELETE FROM kv_store WHERE key = ?1", params![key])
                .map_err(|e| {
                    SentinelError::Storage(format!("Failed to delete '{}': {}", key, e))
                })?;
            Ok(())
        })
    }

    fn clear(&self) -> Result<(), SentinelError> {
        self.db.with_conn(|conn| {
            let removed = conn
                .execute("DELETE FROM kv_store", [])
                .map_err(|e| SentinelError::Storage(format!("Failed to clear store: {}", e)))?;
            tracing::info!(removed, "Local store cleared");
            Ok(())
        })
    }
}
