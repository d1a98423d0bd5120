//! SQLite-backed credential store.

use std::sync::Arc;

use teller_core::error::{Result, TellerError};
use teller_session::CredentialStore;

use crate::db::{Database, OptionalExt};

/// `CredentialStore` implementation on the users table.
///
/// Secrets are stored and compared as opaque strings; hashing (and any
/// salting policy) belongs to whatever provisions the rows. Each user
/// holds exactly one secret, and storing a secret that currently belongs
/// to another user moves it, matching the in-memory store.
pub struct SqliteCredentialStore {
    db: Arc<Database>,
}

impl SqliteCredentialStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

impl CredentialStore for SqliteCredentialStore {
    fn verify_credential(&self, secret: &str) -> Result<Option<String>> {
        self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT user_id FROM users WHERE secret = ?1",
                rusqlite::params![secret],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| TellerError::Storage(format!("Failed to look up credential: {}", e)))
        })
    }

    fn store_credential(&self, user_id: &str, secret: &str) -> Result<()> {
        self.db.with_conn(|conn| {
            // Release the secret from any other holder before the upsert,
            // so the UNIQUE constraint on secret cannot trip.
            conn.execute(
                "DELETE FROM users WHERE secret = ?1 AND user_id <> ?2",
                rusqlite::params![secret, user_id],
            )
            .map_err(|e| TellerError::Storage(format!("Failed to release credential: {}", e)))?;

            conn.execute(
                "INSERT INTO users (user_id, secret) VALUES (?1, ?2)
                 ON CONFLICT(user_id) DO UPDATE SET secret = excluded.secret",
                rusqlite::params![user_id, secret],
            )
            .map_err(|e| TellerError::Storage(format!("Failed to store credential: {}", e)))?;
            Ok(())
        })
    }
}
