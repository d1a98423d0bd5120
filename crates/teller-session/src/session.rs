//! Session records and token minting.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use teller_core::config::SessionConfig;

use crate::bucket::TokenBucket;

/// Authentication lifecycle of a session.
///
/// Sessions minted by the guard enter the registry already
/// `Authenticated`; `Unauthenticated` exists for callers staging a
/// session before credential verification completes. Idle sessions are
/// tombstoned as `Expired` until a purge removes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthState {
    Unauthenticated,
    Authenticated,
    Expired,
}

/// A live session held in the guard's registry.
#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: Uuid,
    pub user_id: String,
    pub token: String,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub auth_state: AuthState,
    pub(crate) bucket: TokenBucket,
}

/// Snapshot of a session handed to callers outside the guard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: Uuid,
    pub user_id: String,
    pub token: String,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

impl Session {
    /// Create an authenticated session with a full rate bucket.
    pub fn new(user_id: &str, token: &str, config: &SessionConfig) -> Self {
        let now = Utc::now();
        Self {
            session_id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            token: token.to_string(),
            created_at: now,
            last_activity_at: now,
            auth_state: AuthState::Authenticated,
            bucket: TokenBucket::new(config.bucket_capacity, config.refill_per_sec),
        }
    }

    /// Whether the idle timeout has strictly elapsed since the last
    /// activity. A session touched exactly `idle_timeout_secs` ago is
    /// still live.
    pub fn is_expired(&self, idle_timeout_secs: i64, now: DateTime<Utc>) -> bool {
        let idle = now.signed_duration_since(self.last_activity_at);
        idle.num_seconds() > idle_timeout_secs
    }

    /// Record activity at the given time.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_activity_at = now;
    }

    /// Snapshot for callers.
    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            session_id: self.session_id,
            user_id: self.user_id.clone(),
            token: self.token.clone(),
            created_at: self.created_at,
            last_activity_at: self.last_activity_at,
        }
    }
}

/// Mint an opaque session token.
pub fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rng.random();
    hex::encode(bytes)
}
