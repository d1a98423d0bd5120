//! Database schema migrations.
//!
//! Applies the initial schema including the kv, users, turns, and
//! schema_migrations tables.

use rusqlite::Connection;
use tracing::info;

use teller_core::error::TellerError;

/// Run all pending database migrations.
///
/// Currently implements the initial schema (version 1). Future migrations
/// can be added by checking the current version and applying incremental changes.
pub fn run_migrations(conn: &Connection) -> Result<(), TellerError> {
    // Create the migrations tracking table first.
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| TellerError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| TellerError::Storage(format!("Failed to query migration version: {}", e)))?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: initial_schema");
    }

    Ok(())
}

/// Version 1: Initial schema.
fn apply_v1(conn: &Connection) -> Result<(), TellerError> {
    conn.execute_batch(
        "
        -- Key-value state (session and context records, stored as JSON).
        CREATE TABLE IF NOT EXISTS kv (
            key         TEXT PRIMARY KEY NOT NULL,
            value       TEXT NOT NULL,
            updated_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );

        -- Registered users and their login secrets. One secret per user;
        -- secrets are opaque strings compared verbatim.
        CREATE TABLE IF NOT EXISTS users (
            user_id     TEXT PRIMARY KEY NOT NULL,
            secret      TEXT NOT NULL UNIQUE,
            created_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );

        -- Completed conversation turns, one row per (session, turn index).
        -- The rating column starts NULL and is filled in by feedback.
        CREATE TABLE IF NOT EXISTS turns (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id      TEXT NOT NULL,
            turn_index      INTEGER NOT NULL,
            user_id         TEXT NOT NULL,
            raw_text        TEXT NOT NULL DEFAULT '',
            normalized_text TEXT NOT NULL DEFAULT '',
            modality        TEXT NOT NULL DEFAULT 'text'
                            CHECK (modality IN ('text', 'voice')),
            response_text   TEXT NOT NULL DEFAULT '',
            source_backend  TEXT NOT NULL DEFAULT '',
            latency_ms      INTEGER NOT NULL DEFAULT 0,
            truncated       INTEGER NOT NULL DEFAULT 0,
            intent          TEXT NOT NULL DEFAULT 'general_inquiry',
            sentiment       TEXT NOT NULL DEFAULT 'neutral',
            rating          INTEGER
                            CHECK (rating IS NULL OR rating BETWEEN 1 AND 5),
            created_at      INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
            UNIQUE (session_id, turn_index)
        );

        CREATE INDEX IF NOT EXISTS idx_turns_session
            ON turns (session_id, turn_index ASC);

        CREATE INDEX IF NOT EXISTS idx_turns_created_at
            ON turns (created_at DESC);

        CREATE INDEX IF NOT EXISTS idx_turns_intent
            ON turns (intent, created_at DESC);

        CREATE INDEX IF NOT EXISTS idx_turns_rating
            ON turns (rating)
            WHERE rating IS NOT NULL;

        -- Record migration.
        INSERT OR IGNORE INTO schema_migrations (version, name) VALUES (1, 'initial_schema');
        ",
    )
    .map_err(|e| TellerError::Storage(format!("Failed to apply migration v1: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        conn
    }

    #[test]
    fn test_migrations_run_once() {
        let conn = open_test_conn();
        run_migrations(&conn).unwrap();

        // Running again should be idempotent.
        run_migrations(&conn).unwrap();

        let version: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(version, 1);
    }

    #[test]
    fn test_kv_table_exists() {
        let conn = open_test_conn();
        run_migrations(&conn).unwrap();

        conn.execute(
            "INSERT INTO kv (key, value) VALUES ('context/abc', '{\"turns\":[]}')",
            [],
        )
        .unwrap();

        let value: String = conn
            .query_row("SELECT value FROM kv WHERE key = 'context/abc'", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(value, "{\"turns\":[]}");
    }

    #[test]
    fn test_users_table_exists() {
        let conn = open_test_conn();
        run_migrations(&conn).unwrap();

        conn.execute(
            "INSERT INTO users (user_id, secret) VALUES ('alice', 's3cret')",
            [],
        )
        .unwrap();

        let user: String = conn
            .query_row(
                "SELECT user_id FROM users WHERE secret = 's3cret'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(user, "alice");
    }

    #[test]
    fn test_users_secret_is_unique() {
        let conn = open_test_conn();
        run_migrations(&conn).unwrap();

        conn.execute(
            "INSERT INTO users (user_id, secret) VALUES ('alice', 'shared')",
            [],
        )
        .unwrap();

        let result = conn.execute(
            "INSERT INTO users (user_id, secret) VALUES ('bob', 'shared')",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_turns_table_exists() {
        let conn = open_test_conn();
        run_migrations(&conn).unwrap();

        conn.execute(
            "INSERT INTO turns (session_id, turn_index, user_id, raw_text, modality, response_text)
             VALUES ('sess-1', 0, 'alice', 'what is my balance', 'text', 'Your balance is 12.00')",
            [],
        )
        .unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM turns", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_turns_modality_check() {
        let conn = open_test_conn();
        run_migrations(&conn).unwrap();

        let result = conn.execute(
            "INSERT INTO turns (session_id, turn_index, user_id, modality)
             VALUES ('sess-1', 0, 'alice', 'telepathy')",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_turns_rating_check() {
        let conn = open_test_conn();
        run_migrations(&conn).unwrap();

        let result = conn.execute(
            "INSERT INTO turns (session_id, turn_index, user_id, rating)
             VALUES ('sess-1', 0, 'alice', 9)",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_turns_index_is_unique_per_session() {
        let conn = open_test_conn();
        run_migrations(&conn).unwrap();

        conn.execute(
            "INSERT INTO turns (session_id, turn_index, user_id) VALUES ('sess-1', 0, 'alice')",
            [],
        )
        .unwrap();

        let duplicate = conn.execute(
            "INSERT INTO turns (session_id, turn_index, user_id) VALUES ('sess-1', 0, 'alice')",
            [],
        );
        assert!(duplicate.is_err());

        // The same index under a different session is fine.
        conn.execute(
            "INSERT INTO turns (session_id, turn_index, user_id) VALUES ('sess-2', 0, 'bob')",
            [],
        )
        .unwrap();
    }
}
