//! SQLite-backed key-value store.

use std::sync::Arc;

use teller_core::error::{Result, TellerError};
use teller_core::store::KeyValueStore;

use crate::db::{Database, OptionalExt};

/// `KeyValueStore` implementation on the kv table.
///
/// Session and context records arrive here already serialized to JSON;
/// the store treats values as opaque strings. Writes are last-wins per
/// key, matching the in-memory store.
pub struct SqliteKvStore {
    db: Arc<Database>,
}

impl SqliteKvStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

impl KeyValueStore for SqliteKvStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT value FROM kv WHERE key = ?1",
                rusqlite::params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| TellerError::Storage(format!("Failed to read key: {}", e)))
        })
    }

    fn put(&self, key: &str, value: &str) -> Result<()> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, strftime('%s', 'now'))
                 ON CONFLICT(key) DO UPDATE SET
                     value = excluded.value,
                     updated_at = excluded.updated_at",
                rusqlite::params![key, value],
            )
            .map_err(|e| TellerError::Storage(format!("Failed to write key: {}", e)))?;
            Ok(())
        })
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.db.with_conn(|conn| {
            conn.execute("DELETE FROM kv WHERE key = ?1", rusqlite::params![key])
                .map_err(|e| TellerError::Storage(format!("Failed to delete key: {}", e)))?;
            Ok(())
        })
    }
}
