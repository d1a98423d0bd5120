//! Credential verification behind a pluggable store.

use std::collections::HashMap;
use std::sync::Mutex;

use teller_core::{Result, TellerError};

/// Looks up and records user credentials.
///
/// `verify_credential` maps a presented secret to the owning user id, or
/// `None` when the secret is unknown.
pub trait CredentialStore: Send + Sync {
    fn verify_credential(&self, secret: &str) -> Result<Option<String>>;
    fn store_credential(&self, user_id: &str, secret: &str) -> Result<()>;
}

/// In-memory credential store for tests and single-process setups.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn verify_credential(&self, secret: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|e| TellerError::Storage(format!("credential lock poisoned: {}", e)))?;
        Ok(entries.get(secret).cloned())
    }

    fn store_credential(&self, user_id: &str, secret: &str) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| TellerError::Storage(format!("credential lock poisoned: {}", e)))?;
        entries.insert(secret.to_string(), user_id.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stored_credential_verifies() {
        let store = MemoryCredentialStore::new();
        store.store_credential("alice", "s3cret").unwrap();
        assert_eq!(
            store.verify_credential("s3cret").unwrap(),
            Some("alice".to_string())
        );
    }

    #[test]
    fn test_unknown_secret_returns_none() {
        let store = MemoryCredentialStore::new();
        assert_eq!(store.verify_credential("nope").unwrap(), None);
    }

    #[test]
    fn test_restoring_secret_rebinds_user() {
        let store = MemoryCredentialStore::new();
        store.store_credential("alice", "shared").unwrap();
        store.store_credential("bob", "shared").unwrap();
        assert_eq!(
            store.verify_credential("shared").unwrap(),
            Some("bob".to_string())
        );
    }
}
