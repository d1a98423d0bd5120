//! Teller Storage crate - SQLite persistence for state, users, and turns.
//!
//! Provides a WAL-mode SQLite database with migrations, plus the concrete
//! key-value, credential, turn, and feedback implementations behind the
//! storage traits the rest of the system consumes.

pub mod credentials;
pub mod db;
pub mod kv;
pub mod migrations;
pub mod repository;

pub use credentials::SqliteCredentialStore;
pub use db::Database;
pub use kv::SqliteKvStore;
pub use repository::{SqliteFeedbackSink, TurnRecord, TurnRepository};
