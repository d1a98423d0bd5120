//! Session admission: authentication, rate limiting, and activity
//! tracking over an in-memory registry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use teller_core::config::SessionConfig;
use teller_core::TellerError;

use crate::credentials::CredentialStore;
use crate::error::{AuthError, RateLimitError};
use crate::session::{generate_token, AuthState, Session, SessionInfo};

/// Front door for every request: resolves tokens to sessions, enforces
/// idle expiry, and meters request rate per session.
///
/// The registry lives in memory only. Restarting the process logs every
/// caller out, which is the intended recovery behavior.
pub struct SessionGuard {
    credentials: Arc<dyn CredentialStore>,
    sessions: Mutex<HashMap<String, Session>>,
    config: SessionConfig,
}

impl SessionGuard {
    pub fn new(credentials: Arc<dyn CredentialStore>, config: SessionConfig) -> Self {
        Self {
            credentials,
            sessions: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// Verify an explicit credential pair and mint a session for it.
    pub fn login(&self, user_id: &str, secret: &str) -> Result<SessionInfo, AuthError> {
        match self.credentials.verify_credential(secret) {
            Ok(Some(owner)) if owner == user_id => match self.open_session(user_id) {
                Ok(info) => Ok(info),
                Err(e) => {
                    error!("failed to open session: {}", e);
                    Err(AuthError::InvalidToken)
                }
            },
            Ok(_) => Err(AuthError::InvalidToken),
            Err(e) => {
                error!("credential lookup failed: {}", e);
                Err(AuthError::InvalidToken)
            }
        }
    }

    /// Mint a token and register a fresh session for `user_id`.
    pub fn open_session(&self, user_id: &str) -> teller_core::Result<SessionInfo> {
        let token = generate_token();
        let session = Session::new(user_id, &token, &self.config);
        let info = session.info();
        let mut sessions = self
            .sessions
            .lock()
            .map_err(|e| TellerError::Storage(format!("session lock poisoned: {}", e)))?;
        sessions.insert(token, session);
        info!(user_id = %user_id, session_id = %info.session_id, "session opened");
        Ok(info)
    }

    /// Resolve a token to a live session.
    ///
    /// Unknown tokens fall through to the credential store; a recognized
    /// credential opens a session keyed by the presented token, so
    /// long-lived credentials act as self-serve logins. Idle sessions are
    /// tombstoned and reported as [`AuthError::Expired`].
    pub fn authenticate(&self, token: &str) -> Result<SessionInfo, AuthError> {
        let mut sessions = match self.sessions.lock() {
            Ok(guard) => guard,
            Err(e) => {
                error!("session lock poisoned: {}", e);
                return Err(AuthError::InvalidToken);
            }
        };

        if let Some(session) = sessions.get_mut(token) {
            if session.auth_state == AuthState::Expired {
                return Err(AuthError::Expired);
            }
            if session.is_expired(self.config.idle_timeout_secs as i64, Utc::now()) {
                debug!(session_id = %session.session_id, "session expired on access");
                session.auth_state = AuthState::Expired;
                return Err(AuthError::Expired);
            }
            return Ok(session.info());
        }

        match self.credentials.verify_credential(token) {
            Ok(Some(user_id)) => {
                let session = Session::new(&user_id, token, &self.config);
                let session_info = session.info();
                sessions.insert(token.to_string(), session);
                info!(user_id = %user_id, session_id = %session_info.session_id, "session opened from credential");
                Ok(session_info)
            }
            Ok(None) => Err(AuthError::InvalidToken),
            Err(e) => {
                error!("credential lookup failed: {}", e);
                Err(AuthError::InvalidToken)
            }
        }
    }

    /// Take one token from the session's rate bucket. Successful checks
    /// count as activity; denied ones leave the idle clock untouched.
    pub fn check_rate(&self, token: &str) -> Result<(), RateLimitError> {
        let mut sessions = match self.sessions.lock() {
            Ok(guard) => guard,
            Err(e) => {
                error!("session lock poisoned: {}", e);
                return Ok(());
            }
        };

        match sessions.get_mut(token) {
            Some(session) => {
                session.bucket.try_consume_at(Instant::now())?;
                session.touch(Utc::now());
                Ok(())
            }
            None => {
                // Callers authenticate first under the same per-session
                // serialization, so a missing entry means the caller
                // skipped admission. Do not punish the request for it.
                warn!("rate check for unknown session token");
                Ok(())
            }
        }
    }

    /// Record activity on the session, resetting its idle clock.
    pub fn touch(&self, token: &str) {
        let mut sessions = match self.sessions.lock() {
            Ok(guard) => guard,
            Err(e) => {
                error!("session lock poisoned: {}", e);
                return;
            }
        };
        if let Some(session) = sessions.get_mut(token) {
            session.touch(Utc::now());
        }
    }

    /// Drop the session for `token`, returning its info when one existed.
    pub fn logout(&self, token: &str) -> Option<SessionInfo> {
        let mut sessions = match self.sessions.lock() {
            Ok(guard) => guard,
            Err(e) => {
                error!("session lock poisoned: {}", e);
                return None;
            }
        };
        sessions.remove(token).map(|session| {
            info!(session_id = %session.session_id, "session closed");
            session.info()
        })
    }

    /// Remove idle and tombstoned sessions, returning what was dropped
    /// so callers can release per-session state of their own.
    pub fn purge_expired(&self) -> Vec<SessionInfo> {
        let mut sessions = match self.sessions.lock() {
            Ok(guard) => guard,
            Err(e) => {
                error!("session lock poisoned: {}", e);
                return Vec::new();
            }
        };
        let now = Utc::now();
        let idle_timeout = self.config.idle_timeout_secs as i64;
        let stale: Vec<String> = sessions
            .iter()
            .filter(|(_, session)| {
                session.auth_state != AuthState::Authenticated
                    || session.is_expired(idle_timeout, now)
            })
            .map(|(token, _)| token.clone())
            .collect();
        let mut purged = Vec::with_capacity(stale.len());
        for token in stale {
            if let Some(session) = sessions.remove(&token) {
                purged.push(session.info());
            }
        }
        if !purged.is_empty() {
            debug!(purged = purged.len(), "purged expired sessions");
        }
        purged
    }

    /// Number of registered sessions, tombstones included.
    pub fn active_sessions(&self) -> usize {
        match self.sessions.lock() {
            Ok(sessions) => sessions.len(),
            Err(e) => {
                error!("session lock poisoned: {}", e);
                0
            }
        }
    }
}
