//! Conversation pipeline: central coordinator wiring admission, input
//! normalization, backend routing, and response validation.
//!
//! Drives one request through a fixed sequence of stages: authenticate,
//! rate-check, normalize, route, validate, record. A failure at any
//! stage short-circuits the rest and is attributed to that stage.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use teller_backend::ModelRouter;
use teller_core::config::TellerConfig;
use teller_core::store::KeyValueStore;
use teller_core::types::{Intent, Modality, Query, Response, Sentiment, Turn};
use teller_session::{AuthError, SessionGuard, SessionInfo};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, warn};

use crate::context::ContextStore;
use crate::error::{OutputError, PipelineCause, PipelineError, PipelineStage};
use crate::intent::{classify_intent, classify_sentiment};
use crate::normalize::InputNormalizer;
use crate::transcribe::SpeechToText;
use crate::validate::ResponseValidator;

/// Raw input for one request.
#[derive(Debug, Clone)]
pub enum RequestInput {
    /// Typed text.
    Text(String),
    /// Captured audio, transcribed before normalization.
    Voice(Vec<u8>),
}

/// Everything produced by one completed turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub session: SessionInfo,
    /// Lifetime index of this turn within its session, stable across
    /// window eviction. Feedback references turns by this index.
    pub turn_index: usize,
    pub query: Query,
    pub response: Response,
    pub intent: Intent,
    pub sentiment: Sentiment,
}

/// Snapshot of a session and its conversation state.
#[derive(Debug, Clone)]
pub struct SessionView {
    pub session: SessionInfo,
    pub turns_in_window: usize,
    pub turn_count: usize,
    pub backend_preference: Option<String>,
}

/// Drives requests through the processing stages in order.
///
/// Requests for the same session are serialized: the second caller waits
/// until the first turn has fully completed or failed. A caller that
/// stops waiting does not cancel the in-flight turn.
pub struct ConversationPipeline {
    guard: Arc<SessionGuard>,
    normalizer: InputNormalizer,
    router: Arc<ModelRouter>,
    validator: ResponseValidator,
    contexts: ContextStore,
    transcriber: Arc<dyn SpeechToText>,
    retry_on_empty: bool,
    /// One lock per session token, held for the whole stage sequence.
    session_locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl ConversationPipeline {
    pub fn new(
        config: &TellerConfig,
        guard: Arc<SessionGuard>,
        router: Arc<ModelRouter>,
        store: Arc<dyn KeyValueStore>,
        transcriber: Arc<dyn SpeechToText>,
    ) -> Self {
        Self {
            guard,
            normalizer: InputNormalizer::from_config(config),
            router,
            validator: ResponseValidator::from_config(config),
            contexts: ContextStore::new(config.pipeline.context_turns, store),
            transcriber,
            retry_on_empty: config.pipeline.retry_on_empty,
            session_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Process one request end to end.
    pub async fn handle(
        &self,
        token: &str,
        input: RequestInput,
    ) -> Result<TurnOutcome, PipelineError> {
        let lock = self.session_lock(token);
        let _held = lock.lock().await;
        let result = self.run(token, input).await;
        self.discard_on_invalid_token(token, &lock, result.as_ref().err());
        result
    }

    /// Verify an explicit credential pair and mint a session for it.
    pub fn login(&self, user_id: &str, secret: &str) -> Result<SessionInfo, PipelineError> {
        self.guard
            .login(user_id, secret)
            .map_err(|e| PipelineError::new(PipelineStage::Authenticated, e))
    }

    /// Close a session and drop its conversation state. Returns whether a
    /// session existed for the token.
    pub async fn logout(&self, token: &str) -> bool {
        let lock = self.session_lock(token);
        let _held = lock.lock().await;
        let removed = self.guard.logout(token);
        if let Some(ref session) = removed {
            if let Err(e) = self.contexts.remove(session.session_id) {
                warn!(session_id = %session.session_id, error = %e, "failed to drop context on logout");
            }
        }
        self.discard_session_lock(token, &lock);
        removed.is_some()
    }

    /// Snapshot of the session and its conversation state.
    pub async fn session_view(&self, token: &str) -> Result<SessionView, PipelineError> {
        let lock = self.session_lock(token);
        let _held = lock.lock().await;
        let result = self.view(token);
        self.discard_on_invalid_token(token, &lock, result.as_ref().err());
        result
    }

    /// Pin (or clear) the backend used for this session's conversation.
    /// The preference is best-effort; routing falls back when the named
    /// backend is missing or failing.
    pub async fn set_backend_preference(
        &self,
        token: &str,
        backend: Option<String>,
    ) -> Result<SessionView, PipelineError> {
        let lock = self.session_lock(token);
        let _held = lock.lock().await;
        let result = self.update_preference(token, backend);
        self.discard_on_invalid_token(token, &lock, result.as_ref().err());
        result
    }

    /// Drop expired sessions along with their conversation state.
    /// Returns how many sessions were purged.
    pub fn purge_expired(&self) -> usize {
        let purged = self.guard.purge_expired();
        for session in &purged {
            if let Err(e) = self.contexts.remove(session.session_id) {
                warn!(session_id = %session.session_id, error = %e, "failed to drop context on purge");
            }
            let mut locks = self
                .session_locks
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            locks.remove(&session.token);
        }
        purged.len()
    }

    /// Number of registered sessions, tombstones included.
    pub fn active_sessions(&self) -> usize {
        self.guard.active_sessions()
    }

    /// Names of the configured backends, in priority order.
    pub fn backend_names(&self) -> Vec<String> {
        self.router.backend_names()
    }

    // -- Private helpers --

    /// The stage sequence for one request. Caller holds the session lock.
    async fn run(&self, token: &str, input: RequestInput) -> Result<TurnOutcome, PipelineError> {
        let session = self
            .guard
            .authenticate(token)
            .map_err(|e| PipelineError::new(PipelineStage::Authenticated, e))?;

        self.guard
            .check_rate(token)
            .map_err(|e| PipelineError::new(PipelineStage::RateChecked, e))?;

        let (raw_text, modality) = match input {
            RequestInput::Text(text) => (text, Modality::Text),
            RequestInput::Voice(audio) => {
                let transcript = self
                    .transcriber
                    .transcribe(&audio)
                    .await
                    .map_err(|e| PipelineError::new(PipelineStage::Normalized, e))?;
                (transcript, Modality::Voice)
            }
        };
        let query = self
            .normalizer
            .normalize(session.session_id, &raw_text, modality)
            .map_err(|e| PipelineError::new(PipelineStage::Normalized, e))?;

        let context = self
            .contexts
            .load(session.session_id)
            .map_err(|e| PipelineError::new(PipelineStage::Routed, e))?;
        let history = context.history();
        let preference = context.backend_preference.as_deref();
        let reply = self
            .router
            .answer(&query.normalized_text, &history, preference)
            .await
            .map_err(|e| PipelineError::new(PipelineStage::Routed, e))?;

        let response = match self.validator.validate(&reply) {
            Ok(response) => response,
            Err(OutputError::Empty) if self.retry_on_empty => {
                warn!(backend = %reply.backend, "empty reply, retrying on an alternate backend");
                let alternate = self
                    .router
                    .answer_excluding(&query.normalized_text, &history, preference, &reply.backend)
                    .await
                    .map_err(|_| PipelineError::new(PipelineStage::Validated, OutputError::Empty))?;
                self.validator
                    .validate(&alternate)
                    .map_err(|_| PipelineError::new(PipelineStage::Validated, OutputError::Empty))?
            }
            Err(e) => return Err(PipelineError::new(PipelineStage::Validated, e)),
        };

        let intent = classify_intent(&query.normalized_text);
        let sentiment = classify_sentiment(&query.normalized_text);
        let turn = Turn {
            query: query.clone(),
            response: response.clone(),
            intent,
            sentiment,
        };
        let updated = self
            .contexts
            .append_turn(session.session_id, turn)
            .map_err(|e| PipelineError::new(PipelineStage::Completed, e))?;
        self.guard.touch(token);

        info!(
            session_id = %session.session_id,
            backend = %response.source_backend,
            intent = intent.as_str(),
            latency_ms = response.latency_ms,
            "turn completed"
        );

        Ok(TurnOutcome {
            session,
            turn_index: updated.turn_count - 1,
            query,
            response,
            intent,
            sentiment,
        })
    }

    fn view(&self, token: &str) -> Result<SessionView, PipelineError> {
        let session = self
            .guard
            .authenticate(token)
            .map_err(|e| PipelineError::new(PipelineStage::Authenticated, e))?;
        let context = self
            .contexts
            .load(session.session_id)
            .map_err(|e| PipelineError::new(PipelineStage::Received, e))?;
        Ok(SessionView {
            session,
            turns_in_window: context.turns.len(),
            turn_count: context.turn_count,
            backend_preference: context.backend_preference,
        })
    }

    fn update_preference(
        &self,
        token: &str,
        backend: Option<String>,
    ) -> Result<SessionView, PipelineError> {
        let session = self
            .guard
            .authenticate(token)
            .map_err(|e| PipelineError::new(PipelineStage::Authenticated, e))?;
        let context = self
            .contexts
            .set_preference(session.session_id, backend)
            .map_err(|e| PipelineError::new(PipelineStage::Received, e))?;
        Ok(SessionView {
            session,
            turns_in_window: context.turns.len(),
            turn_count: context.turn_count,
            backend_preference: context.backend_preference,
        })
    }

    fn session_lock(&self, token: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self
            .session_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        locks.entry(token.to_string()).or_default().clone()
    }

    /// Drop the lock entry minted for a token that turned out not to name
    /// a session, so probing cannot grow the map.
    fn discard_on_invalid_token(
        &self,
        token: &str,
        lock: &Arc<AsyncMutex<()>>,
        err: Option<&PipelineError>,
    ) {
        if let Some(err) = err {
            if matches!(err.cause, PipelineCause::Auth(AuthError::InvalidToken)) {
                self.discard_session_lock(token, lock);
            }
        }
    }

    fn discard_session_lock(&self, token: &str, lock: &Arc<AsyncMutex<()>>) {
        let mut locks = self
            .session_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = locks.get(token) {
            // Keep the entry if another request is already waiting on it.
            if Arc::ptr_eq(entry, lock) && Arc::strong_count(entry) <= 2 {
                locks.remove(token);
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
