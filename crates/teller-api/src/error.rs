//! API error types and JSON error response formatting.
//!
//! ApiError provides a consistent JSON error response format across all
//! endpoints, mapping pipeline failures to appropriate HTTP status codes.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use teller_chat::{PipelineCause, PipelineError};
use teller_core::TellerError;
use teller_session::RateLimitError;

/// JSON error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code (e.g., "bad_request", "unauthorized").
    pub error: String,
    /// Human-readable error message.
    pub message: String,
    /// Optional structured details about the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// API error type that maps to HTTP status codes and JSON responses.
#[derive(Debug)]
pub enum ApiError {
    /// 400 Bad Request - missing or invalid parameters, rejected input.
    BadRequest(String),
    /// 401 Unauthorized - missing, invalid, or expired session token.
    Unauthorized(String),
    /// 429 Too Many Requests - session rate limit exceeded.
    RateLimited {
        message: String,
        retry_after_secs: u64,
    },
    /// 500 Internal Server Error - unexpected server error.
    Internal(String),
    /// 503 Service Unavailable - no backend could produce a reply.
    ServiceUnavailable(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let retry_after = match &self {
            ApiError::RateLimited {
                retry_after_secs, ..
            } => Some(*retry_after_secs),
            _ => None,
        };

        let (status, error_code, message, details) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg, None),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg, None),
            ApiError::RateLimited {
                message,
                retry_after_secs,
            } => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limited",
                message,
                Some(serde_json::json!({ "retry_after_secs": retry_after_secs })),
            ),
            ApiError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg, None)
            }
            ApiError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", msg, None)
            }
        };

        let body = ErrorBody {
            error: error_code.to_string(),
            message,
            details,
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(secs) = retry_after {
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        let message = err.user_message().to_string();
        match &err.cause {
            PipelineCause::Auth(_) => ApiError::Unauthorized(message),
            PipelineCause::RateLimit(RateLimitError::RetryAfter { seconds }) => {
                ApiError::RateLimited {
                    message,
                    retry_after_secs: seconds.ceil() as u64,
                }
            }
            PipelineCause::Input(_) => ApiError::BadRequest(message),
            PipelineCause::Backend(_) | PipelineCause::Output(_) => {
                ApiError::ServiceUnavailable(message)
            }
            PipelineCause::Internal(_) => ApiError::Internal(message),
        }
    }
}

impl From<TellerError> for ApiError {
    fn from(err: TellerError) -> Self {
        match &err {
            TellerError::Config(msg) => ApiError::BadRequest(msg.clone()),
            TellerError::Storage(msg) => ApiError::Internal(msg.clone()),
            _ => ApiError::Internal(err.to_string()),
        }
    }
}
