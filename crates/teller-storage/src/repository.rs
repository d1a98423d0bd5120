//! Repository implementation for archived conversation turns.
//!
//! Provides TurnRepository for recording and querying completed turns,
//! and SqliteFeedbackSink for attaching ratings to stored rows.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use tracing::warn;
use uuid::Uuid;

use teller_chat::FeedbackSink;
use teller_core::error::TellerError;
use teller_core::types::{Intent, Modality, Sentiment, Turn};

use crate::db::{Database, OptionalExt};

const TURN_COLUMNS: &str = "session_id, turn_index, user_id, raw_text, normalized_text, modality,
     response_text, source_backend, latency_ms, truncated, intent, sentiment, rating, created_at";

/// A stored turn row, flattened from the in-flight entity.
///
/// `rating` starts as `None` and is filled in when feedback arrives for
/// the turn.
#[derive(Debug, Clone)]
pub struct TurnRecord {
    pub session_id: Uuid,
    pub turn_index: usize,
    pub user_id: String,
    pub raw_text: String,
    pub normalized_text: String,
    pub modality: Modality,
    pub response_text: String,
    pub source_backend: String,
    pub latency_ms: u64,
    pub truncated: bool,
    pub intent: Intent,
    pub sentiment: Sentiment,
    pub rating: Option<u8>,
    pub created_at: DateTime<Utc>,
}

/// Repository for completed conversation turns.
pub struct TurnRepository {
    db: Arc<Database>,
}

impl TurnRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Store a completed turn under its session and index.
    ///
    /// The (session_id, turn_index) pair is unique; recording the same
    /// index twice is an error.
    pub fn record(&self, user_id: &str, turn_index: usize, turn: &Turn) -> Result<(), TellerError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO turns (session_id, turn_index, user_id, raw_text, normalized_text,
                                    modality, response_text, source_backend, latency_ms,
                                    truncated, intent, sentiment)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                rusqlite::params![
                    turn.query.session_id.to_string(),
                    turn_index as i64,
                    user_id,
                    turn.query.raw_text,
                    turn.query.normalized_text,
                    turn.query.modality.as_str(),
                    turn.response.text,
                    turn.response.source_backend,
                    turn.response.latency_ms,
                    turn.response.truncated as i32,
                    turn.intent.as_str(),
                    turn.sentiment.as_str(),
                ],
            )
            .map_err(|e| TellerError::Storage(format!("Failed to record turn: {}", e)))?;
            Ok(())
        })
    }

    /// Fetch one stored turn, if present.
    pub fn find(
        &self,
        session_id: Uuid,
        turn_index: usize,
    ) -> Result<Option<TurnRecord>, TellerError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {TURN_COLUMNS} FROM turns
                     WHERE session_id = ?1 AND turn_index = ?2"
                ))
                .map_err(|e| TellerError::Storage(e.to_string()))?;

            let result = stmt
                .query_row(
                    rusqlite::params![session_id.to_string(), turn_index as i64],
                    |row| Ok(row_to_turn_record(row)),
                )
                .optional()
                .map_err(|e| TellerError::Storage(e.to_string()))?;

            match result {
                Some(record) => Ok(Some(record?)),
                None => Ok(None),
            }
        })
    }

    /// All stored turns for a session, oldest first.
    pub fn for_session(&self, session_id: Uuid) -> Result<Vec<TurnRecord>, TellerError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {TURN_COLUMNS} FROM turns
                     WHERE session_id = ?1
                     ORDER BY turn_index ASC"
                ))
                .map_err(|e| TellerError::Storage(e.to_string()))?;

            let rows = stmt
                .query_map(rusqlite::params![session_id.to_string()], |row| {
                    Ok(row_to_turn_record(row))
                })
                .map_err(|e| TellerError::Storage(e.to_string()))?;

            let mut records = Vec::new();
            for row in rows {
                let record = row.map_err(|e| TellerError::Storage(e.to_string()))??;
                records.push(record);
            }
            Ok(records)
        })
    }

    /// The most recently stored turns across all sessions, newest first.
    pub fn recent(&self, limit: u64) -> Result<Vec<TurnRecord>, TellerError> {
        self.db.with_conn(|conn| {
            // created_at has one-second precision; id breaks ties in
            // insertion order.
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {TURN_COLUMNS} FROM turns
                     ORDER BY created_at DESC, id DESC
                     LIMIT ?1"
                ))
                .map_err(|e| TellerError::Storage(e.to_string()))?;

            let rows = stmt
                .query_map(rusqlite::params![limit], |row| Ok(row_to_turn_record(row)))
                .map_err(|e| TellerError::Storage(e.to_string()))?;

            let mut records = Vec::new();
            for row in rows {
                let record = row.map_err(|e| TellerError::Storage(e.to_string()))??;
                records.push(record);
            }
            Ok(records)
        })
    }

    /// Count all stored turns.
    pub fn count(&self) -> Result<u64, TellerError> {
        self.db.with_conn(|conn| {
            let count: i64 = conn
                .query_row("SELECT COUNT(*) FROM turns", [], |row| row.get(0))
                .map_err(|e| TellerError::Storage(e.to_string()))?;
            Ok(count as u64)
        })
    }
}

/// `FeedbackSink` implementation that rates stored turn rows.
pub struct SqliteFeedbackSink {
    db: Arc<Database>,
}

impl SqliteFeedbackSink {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

impl FeedbackSink for SqliteFeedbackSink {
    fn record_feedback(
        &self,
        session_id: Uuid,
        turn_index: usize,
        rating: u8,
    ) -> teller_core::Result<()> {
        self.db.with_conn(|conn| {
            let updated = conn
                .execute(
                    "UPDATE turns SET rating = ?1 WHERE session_id = ?2 AND turn_index = ?3",
                    rusqlite::params![rating, session_id.to_string(), turn_index as i64],
                )
                .map_err(|e| TellerError::Storage(format!("Failed to record feedback: {}", e)))?;

            if updated == 0 {
                warn!(
                    %session_id,
                    turn_index, "Feedback for a turn that was never stored; dropping"
                );
            }
            Ok(())
        })
    }
}

// ============================================================================
// Helper functions for row-to-record conversion.
// ============================================================================

fn row_to_turn_record(row: &rusqlite::Row<'_>) -> Result<TurnRecord, TellerError> {
    let session_id_str: String = row
        .get(0)
        .map_err(|e| TellerError::Storage(e.to_string()))?;
    let turn_index: i64 = row
        .get(1)
        .map_err(|e| TellerError::Storage(e.to_string()))?;
    let user_id: String = row
        .get(2)
        .map_err(|e| TellerError::Storage(e.to_string()))?;
    let raw_text: String = row
        .get(3)
        .map_err(|e| TellerError::Storage(e.to_string()))?;
    let normalized_text: String = row
        .get(4)
        .map_err(|e| TellerError::Storage(e.to_string()))?;
    let modality_str: String = row
        .get(5)
        .map_err(|e| TellerError::Storage(e.to_string()))?;
    let response_text: String = row
        .get(6)
        .map_err(|e| TellerError::Storage(e.to_string()))?;
    let source_backend: String = row
        .get(7)
        .map_err(|e| TellerError::Storage(e.to_string()))?;
    let latency_ms: i64 = row
        .get(8)
        .map_err(|e| TellerError::Storage(e.to_string()))?;
    let truncated: i32 = row
        .get(9)
        .map_err(|e| TellerError::Storage(e.to_string()))?;
    let intent_str: String = row
        .get(10)
        .map_err(|e| TellerError::Storage(e.to_string()))?;
    let sentiment_str: String = row
        .get(11)
        .map_err(|e| TellerError::Storage(e.to_string()))?;
    let rating: Option<i64> = row
        .get(12)
        .map_err(|e| TellerError::Storage(e.to_string()))?;
    let created_at_i64: i64 = row
        .get(13)
        .map_err(|e| TellerError::Storage(e.to_string()))?;

    Ok(TurnRecord {
        session_id: Uuid::parse_str(&session_id_str)
            .map_err(|e| TellerError::Storage(format!("Invalid UUID: {}", e)))?,
        turn_index: turn_index as usize,
        user_id,
        raw_text,
        normalized_text,
        modality: Modality::parse(&modality_str).unwrap_or(Modality::Text),
        response_text,
        source_backend,
        latency_ms: latency_ms as u64,
        truncated: truncated != 0,
        intent: Intent::parse(&intent_str).unwrap_or_default(),
        sentiment: Sentiment::parse(&sentiment_str).unwrap_or_default(),
        rating: rating.map(|r| r as u8),
        created_at: Utc
            .timestamp_opt(created_at_i64, 0)
            .single()
            .unwrap_or_default(),
    })
}
