//! Key-value persistence contract.
//!
//! The core treats persistence as a string key-value store with per-key
//! atomicity and nothing more. Session and context records are serialized
//! to JSON values by their owners before they get here. The SQLite
//! implementation lives in `teller-storage`; `MemoryStore` backs tests and
//! ephemeral deployments.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{Result, TellerError};

/// Minimal key-value store used for session and context records.
pub trait KeyValueStore: Send + Sync {
    /// Fetch the value stored under `key`, if any.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    fn put(&self, key: &str, value: &str) -> Result<()>;

    /// Remove the value stored under `key`. Removing a missing key is not
    /// an error.
    fn delete(&self, key: &str) -> Result<()>;
}

/// In-memory `KeyValueStore` for tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| TellerError::Storage("store lock poisoned".to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| TellerError::Storage("store lock poisoned".to_string()))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| TellerError::Storage("store lock poisoned".to_string()))?;
        entries.remove(key);
        Ok(())
    }
}
