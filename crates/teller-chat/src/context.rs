//! Per-session conversation context with a bounded turn window.
//!
//! Contexts live in memory for the life of the process and are written
//! through to the key-value store on every mutation, so a conversation
//! survives a restart. The store is written before memory is updated; a
//! storage failure leaves the in-memory context exactly as it was.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use teller_backend::HistoryTurn;
use teller_core::store::KeyValueStore;
use teller_core::types::Turn;
use teller_core::{Result, TellerError};
use tracing::warn;
use uuid::Uuid;

/// Conversation state for one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Context {
    pub session_id: Uuid,
    /// Completed turns, oldest first, bounded by the configured window.
    pub turns: Vec<Turn>,
    /// Backend the user pinned for this conversation, if any.
    pub backend_preference: Option<String>,
    /// Turns completed over the session's lifetime, including turns
    /// already evicted from the window.
    #[serde(default)]
    pub turn_count: usize,
}

impl Context {
    pub fn new(session_id: Uuid) -> Self {
        Self {
            session_id,
            turns: Vec::new(),
            backend_preference: None,
            turn_count: 0,
        }
    }

    /// The window's exchanges in the form backends consume.
    pub fn history(&self) -> Vec<HistoryTurn> {
        self.turns
            .iter()
            .map(|turn| {
                HistoryTurn::new(
                    turn.query.normalized_text.clone(),
                    turn.response.text.clone(),
                )
            })
            .collect()
    }
}

/// Write-through store for conversation contexts.
pub struct ContextStore {
    window: usize,
    store: Arc<dyn KeyValueStore>,
    contexts: Mutex<HashMap<Uuid, Context>>,
}

impl ContextStore {
    pub fn new(window: usize, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            window,
            store,
            contexts: Mutex::new(HashMap::new()),
        }
    }

    /// Configured turn-window size.
    pub fn window(&self) -> usize {
        self.window
    }

    /// Current context for a session, loading from the backing store on
    /// first access.
    pub fn load(&self, session_id: Uuid) -> Result<Context> {
        let mut contexts = self
            .contexts
            .lock()
            .map_err(|e| TellerError::Storage(format!("context lock poisoned: {}", e)))?;
        self.load_or_fetch(&mut contexts, session_id)
    }

    /// Append a completed turn, evicting the oldest once the window is
    /// full.
    pub fn append_turn(&self, session_id: Uuid, turn: Turn) -> Result<Context> {
        let mut contexts = self
            .contexts
            .lock()
            .map_err(|e| TellerError::Storage(format!("context lock poisoned: {}", e)))?;
        let mut updated = self.load_or_fetch(&mut contexts, session_id)?;
        updated.turns.push(turn);
        while updated.turns.len() > self.window {
            updated.turns.remove(0);
        }
        updated.turn_count += 1;
        self.persist(&mut contexts, updated)
    }

    /// Pin (or clear) the session's preferred backend.
    pub fn set_preference(&self, session_id: Uuid, backend: Option<String>) -> Result<Context> {
        let mut contexts = self
            .contexts
            .lock()
            .map_err(|e| TellerError::Storage(format!("context lock poisoned: {}", e)))?;
        let mut updated = self.load_or_fetch(&mut contexts, session_id)?;
        updated.backend_preference = backend;
        self.persist(&mut contexts, updated)
    }

    /// Drop a session's context from memory and the backing store.
    pub fn remove(&self, session_id: Uuid) -> Result<()> {
        let mut contexts = self
            .contexts
            .lock()
            .map_err(|e| TellerError::Storage(format!("context lock poisoned: {}", e)))?;
        contexts.remove(&session_id);
        self.store.delete(&storage_key(session_id))
    }

    // -- Private helpers --

    fn load_or_fetch(
        &self,
        contexts: &mut HashMap<Uuid, Context>,
        session_id: Uuid,
    ) -> Result<Context> {
        if let Some(context) = contexts.get(&session_id) {
            return Ok(context.clone());
        }
        let context = match self.store.get(&storage_key(session_id))? {
            Some(raw) => match serde_json::from_str::<Context>(&raw) {
                Ok(stored) => stored,
                Err(e) => {
                    warn!(%session_id, error = %e, "stored context unreadable, starting fresh");
                    Context::new(session_id)
                }
            },
            None => Context::new(session_id),
        };
        contexts.insert(session_id, context.clone());
        Ok(context)
    }

    /// Store first, then commit to memory.
    fn persist(
        &self,
        contexts: &mut HashMap<Uuid, Context>,
        updated: Context,
    ) -> Result<Context> {
        let raw = serde_json::to_string(&updated)?;
        self.store.put(&storage_key(updated.session_id), &raw)?;
        contexts.insert(updated.session_id, updated.clone());
        Ok(updated)
    }
}

fn storage_key(session_id: Uuid) -> String {
    format!("context/{}", session_id)
}
