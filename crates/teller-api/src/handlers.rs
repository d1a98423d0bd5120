//! Route handler functions for all API endpoints.
//!
//! Each handler extracts the bearer token and request body, calls into
//! the pipeline, and maps the outcome to a JSON response. Authentication
//! happens inside the pipeline; there is no separate auth middleware.

use axum::extract::State;
use axum::http::{header, HeaderMap};
use axum::Json;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use teller_chat::{PipelineCause, PipelineError, RequestInput, SessionView, TurnOutcome};
use teller_core::types::Turn;

use crate::error::ApiError;
use crate::state::AppState;

// =============================================================================
// Request types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub user_id: String,
    pub secret: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct VoiceChatRequest {
    /// Base64-encoded audio bytes.
    pub audio: String,
}

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    pub turn_index: usize,
    pub rating: u8,
}

#[derive(Debug, Deserialize)]
pub struct BackendPreferenceRequest {
    /// Backend name to pin, or null to clear the preference.
    pub backend: Option<String>,
}

// =============================================================================
// Response types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub session_id: Uuid,
    pub user_id: String,
    pub expires_in_secs: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub session_id: Uuid,
    pub turn_index: usize,
    pub reply: String,
    pub backend: String,
    pub intent: String,
    pub sentiment: String,
    pub latency_ms: u64,
    pub truncated: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FeedbackResponse {
    pub success: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LogoutResponse {
    /// Whether a session existed for the presented token.
    pub closed: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub session_id: Uuid,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    /// Seconds of idle time left before the session expires.
    pub expires_in_secs: u64,
    pub turns_in_window: usize,
    pub turn_count: usize,
    pub backend_preference: Option<String>,
    pub available_backends: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub active_sessions: usize,
    pub stored_turns: u64,
    pub backends: Vec<String>,
}

// =============================================================================
// Handler functions
// =============================================================================

/// POST /api/login - verify credentials and mint a session token.
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    if req.user_id.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "Field 'user_id' must not be empty".to_string(),
        ));
    }

    let session = state.pipeline.login(&req.user_id, &req.secret).map_err(|err| {
        if matches!(err.cause, PipelineCause::Auth(_)) {
            ApiError::Unauthorized("Invalid user id or secret".to_string())
        } else {
            pipeline_error(err)
        }
    })?;

    info!(user_id = %session.user_id, session_id = %session.session_id, "session opened");

    Ok(Json(LoginResponse {
        token: session.token,
        session_id: session.session_id,
        user_id: session.user_id,
        expires_in_secs: state.config.session.idle_timeout_secs,
    }))
}

/// POST /api/logout - close the caller's session and drop its state.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<LogoutResponse>, ApiError> {
    let token = bearer_token(&headers)?;
    let closed = state.pipeline.logout(token).await;
    Ok(Json(LogoutResponse { closed }))
}

/// POST /api/chat - process one text message end to end.
pub async fn chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let token = bearer_token(&headers)?;
    let outcome = state
        .pipeline
        .handle(token, RequestInput::Text(req.message))
        .await
        .map_err(pipeline_error)?;

    archive_turn(&state, &outcome);
    Ok(Json(chat_response(outcome)))
}

/// POST /api/chat/voice - process one voice message; the body carries the
/// audio as base64.
pub async fn chat_voice(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<VoiceChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let token = bearer_token(&headers)?;
    let audio = BASE64_STANDARD
        .decode(req.audio.as_bytes())
        .map_err(|e| ApiError::BadRequest(format!("Invalid base64 audio payload: {}", e)))?;

    let outcome = state
        .pipeline
        .handle(token, RequestInput::Voice(audio))
        .await
        .map_err(pipeline_error)?;

    archive_turn(&state, &outcome);
    Ok(Json(chat_response(outcome)))
}

/// POST /api/feedback - rate one turn of the caller's own session.
pub async fn feedback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<FeedbackRequest>,
) -> Result<Json<FeedbackResponse>, ApiError> {
    let token = bearer_token(&headers)?;

    if !(1..=5).contains(&req.rating) {
        return Err(ApiError::BadRequest(format!(
            "Rating must be between 1 and 5, got {}",
            req.rating
        )));
    }

    let view = state
        .pipeline
        .session_view(token)
        .await
        .map_err(pipeline_error)?;

    if req.turn_index >= view.turn_count {
        return Err(ApiError::BadRequest(format!(
            "No turn with index {} in this session",
            req.turn_index
        )));
    }

    state
        .feedback
        .record_feedback(view.session.session_id, req.turn_index, req.rating)?;

    info!(
        session_id = %view.session.session_id,
        turn_index = req.turn_index,
        rating = req.rating,
        "feedback recorded"
    );

    Ok(Json(FeedbackResponse { success: true }))
}

/// GET /api/session - session metadata and conversation state.
pub async fn session(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SessionResponse>, ApiError> {
    let token = bearer_token(&headers)?;
    let view = state
        .pipeline
        .session_view(token)
        .await
        .map_err(pipeline_error)?;
    Ok(Json(session_response(&state, view)))
}

/// PUT /api/session - pin or clear the session's backend preference.
pub async fn set_backend(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<BackendPreferenceRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let token = bearer_token(&headers)?;

    if let Some(ref name) = req.backend {
        let known = state.pipeline.backend_names();
        if !known.iter().any(|b| b == name) {
            return Err(ApiError::BadRequest(format!(
                "Unknown backend '{}'. Available: {}",
                name,
                known.join(", ")
            )));
        }
    }

    let view = state
        .pipeline
        .set_backend_preference(token, req.backend)
        .await
        .map_err(pipeline_error)?;
    Ok(Json(session_response(&state, view)))
}

/// GET /health - liveness plus coarse service stats.
pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    let stored_turns = state.turns.count().unwrap_or(0);

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: "0.1.0".to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        active_sessions: state.pipeline.active_sessions(),
        stored_turns,
        backends: state.pipeline.backend_names(),
    }))
}

// =============================================================================
// Helpers
// =============================================================================

/// Pull the session token out of `Authorization: Bearer <token>`.
fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| ApiError::Unauthorized("Missing Authorization header".to_string()))?;
    let value = value
        .to_str()
        .map_err(|_| ApiError::Unauthorized("Invalid Authorization header encoding".to_string()))?;
    value.strip_prefix("Bearer ").ok_or_else(|| {
        ApiError::Unauthorized("Authorization header must be a bearer token".to_string())
    })
}

/// Log the failed stage server-side, then map to the response error. The
/// response body carries only the stable user-facing message.
fn pipeline_error(err: PipelineError) -> ApiError {
    debug!(stage = err.stage.as_str(), error = %err, "request rejected");
    ApiError::from(err)
}

/// Store the completed turn. The reply has already been produced, so
/// archive failures are logged rather than surfaced.
fn archive_turn(state: &AppState, outcome: &TurnOutcome) {
    let turn = Turn {
        query: outcome.query.clone(),
        response: outcome.response.clone(),
        intent: outcome.intent,
        sentiment: outcome.sentiment,
    };
    if let Err(e) = state
        .turns
        .record(&outcome.session.user_id, outcome.turn_index, &turn)
    {
        warn!(
            session_id = %outcome.session.session_id,
            turn_index = outcome.turn_index,
            error = %e,
            "failed to archive turn"
        );
    }
}

fn chat_response(outcome: TurnOutcome) -> ChatResponse {
    ChatResponse {
        session_id: outcome.session.session_id,
        turn_index: outcome.turn_index,
        reply: outcome.response.text,
        backend: outcome.response.source_backend,
        intent: outcome.intent.as_str().to_string(),
        sentiment: outcome.sentiment.as_str().to_string(),
        latency_ms: outcome.response.latency_ms,
        truncated: outcome.response.truncated,
    }
}

fn session_response(state: &AppState, view: SessionView) -> SessionResponse {
    let idle_secs = Utc::now()
        .signed_duration_since(view.session.last_activity_at)
        .num_seconds()
        .max(0) as u64;
    let expires_in_secs = state.config.session.idle_timeout_secs.saturating_sub(idle_secs);

    SessionResponse {
        session_id: view.session.session_id,
        user_id: view.session.user_id,
        created_at: view.session.created_at,
        last_activity_at: view.session.last_activity_at,
        expires_in_secs,
        turns_in_window: view.turns_in_window,
        turn_count: view.turn_count,
        backend_preference: view.backend_preference,
        available_backends: state.pipeline.backend_names(),
    }
}
