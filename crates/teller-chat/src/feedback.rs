//! Feedback collaborator contract.
//!
//! Ratings reference a turn by session and lifetime index, so feedback
//! can outlive the turn's eviction from the context window. Rating range
//! checks belong to the ingesting surface; the sink stores what it is
//! given.

use std::sync::Mutex;

use teller_core::{Result, TellerError};
use uuid::Uuid;

/// A single rating left on a completed turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackEntry {
    pub session_id: Uuid,
    pub turn_index: usize,
    pub rating: u8,
}

/// Records user ratings on completed turns.
pub trait FeedbackSink: Send + Sync {
    fn record_feedback(&self, session_id: Uuid, turn_index: usize, rating: u8) -> Result<()>;
}

/// In-memory sink for tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryFeedbackSink {
    entries: Mutex<Vec<FeedbackEntry>>,
}

impl MemoryFeedbackSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything recorded so far, in arrival order.
    pub fn entries(&self) -> Vec<FeedbackEntry> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl FeedbackSink for MemoryFeedbackSink {
    fn record_feedback(&self, session_id: Uuid, turn_index: usize, rating: u8) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| TellerError::Storage("feedback lock poisoned".to_string()))?;
        entries.push(FeedbackEntry {
            session_id,
            turn_index,
            rating,
        });
        Ok(())
    }
}
