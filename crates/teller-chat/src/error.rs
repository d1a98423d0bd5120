//! Error types for the conversation pipeline.

use serde::{Deserialize, Serialize};
use teller_backend::BackendError;
use teller_core::error::TellerError;
use teller_session::{AuthError, RateLimitError};

/// Errors raised while validating and normalizing user input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    #[error("input is empty")]
    Empty,
    #[error("input exceeds maximum length of {max} characters (got {length})")]
    TooLong { length: usize, max: usize },
    #[error("input contains invalid characters")]
    InvalidChars,
    #[error("transcription failed: {0}")]
    TranscriptionFailed(String),
}

/// Errors raised while validating a backend reply.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OutputError {
    #[error("backend returned an empty reply")]
    Empty,
}

/// The stages a request moves through, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Received,
    Authenticated,
    RateChecked,
    Normalized,
    Routed,
    Validated,
    Completed,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Received => "received",
            PipelineStage::Authenticated => "authenticated",
            PipelineStage::RateChecked => "rate_checked",
            PipelineStage::Normalized => "normalized",
            PipelineStage::Routed => "routed",
            PipelineStage::Validated => "validated",
            PipelineStage::Completed => "completed",
        }
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The underlying failure behind a [`PipelineError`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PipelineCause {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    RateLimit(#[from] RateLimitError),
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Output(#[from] OutputError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<TellerError> for PipelineCause {
    fn from(err: TellerError) -> Self {
        PipelineCause::Internal(err.to_string())
    }
}

/// A request failure attributed to the stage that produced it.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("pipeline failed at {stage}: {cause}")]
pub struct PipelineError {
    pub stage: PipelineStage,
    pub cause: PipelineCause,
}

impl PipelineError {
    pub fn new(stage: PipelineStage, cause: impl Into<PipelineCause>) -> Self {
        PipelineError {
            stage,
            cause: cause.into(),
        }
    }

    /// Stable message safe to show to the end user. Internal detail
    /// stays in the Display form and the logs.
    pub fn user_message(&self) -> &'static str {
        match self.cause {
            PipelineCause::Auth(_) => "Please sign in again.",
            PipelineCause::RateLimit(_) => {
                "You are sending requests too quickly. Please wait a moment."
            }
            PipelineCause::Input(_) => "Your message could not be accepted. Please rephrase it.",
            PipelineCause::Backend(_) | PipelineCause::Output(_) => {
                "The assistant is temporarily unavailable. Please try again shortly."
            }
            PipelineCause::Internal(_) => "Something went wrong. Please try again.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_error_display() {
        let err = InputError::Empty;
        assert_eq!(err.to_string(), "input is empty");

        let err = InputError::TooLong {
            length: 4500,
            max: 4000,
        };
        assert_eq!(
            err.to_string(),
            "input exceeds maximum length of 4000 characters (got 4500)"
        );

        let err = InputError::InvalidChars;
        assert_eq!(err.to_string(), "input contains invalid characters");

        let err = InputError::TranscriptionFailed("no audio".to_string());
        assert_eq!(err.to_string(), "transcription failed: no audio");
    }

    #[test]
    fn test_output_error_display() {
        let err = OutputError::Empty;
        assert_eq!(err.to_string(), "backend returned an empty reply");
    }

    #[test]
    fn test_stage_as_str_covers_all_stages() {
        let stages = [
            (PipelineStage::Received, "received"),
            (PipelineStage::Authenticated, "authenticated"),
            (PipelineStage::RateChecked, "rate_checked"),
            (PipelineStage::Normalized, "normalized"),
            (PipelineStage::Routed, "routed"),
            (PipelineStage::Validated, "validated"),
            (PipelineStage::Completed, "completed"),
        ];
        for (stage, name) in stages {
            assert_eq!(stage.as_str(), name);
            assert_eq!(stage.to_string(), name);
        }
    }

    #[test]
    fn test_stage_serializes_snake_case() {
        let json = serde_json::to_string(&PipelineStage::RateChecked).unwrap();
        assert_eq!(json, "\"rate_checked\"");
        let back: PipelineStage = serde_json::from_str("\"validated\"").unwrap();
        assert_eq!(back, PipelineStage::Validated);
    }

    #[test]
    fn test_pipeline_error_display_includes_stage_and_cause() {
        let err = PipelineError::new(PipelineStage::Normalized, InputError::Empty);
        assert_eq!(
            err.to_string(),
            "pipeline failed at normalized: input is empty"
        );

        let err = PipelineError::new(PipelineStage::Authenticated, AuthError::Expired);
        assert_eq!(
            err.to_string(),
            "pipeline failed at authenticated: session expired"
        );

        let err = PipelineError::new(PipelineStage::Routed, BackendError::AllBackendsFailed);
        assert_eq!(err.to_string(), "pipeline failed at routed: all backends failed");
    }

    #[test]
    fn test_cause_from_conversions() {
        let cause: PipelineCause = AuthError::InvalidToken.into();
        assert!(matches!(cause, PipelineCause::Auth(AuthError::InvalidToken)));

        let cause: PipelineCause = RateLimitError::RetryAfter { seconds: 2.0 }.into();
        assert!(matches!(cause, PipelineCause::RateLimit(_)));

        let cause: PipelineCause = InputError::InvalidChars.into();
        assert!(matches!(cause, PipelineCause::Input(_)));

        let cause: PipelineCause = BackendError::Unavailable("offline".to_string()).into();
        assert!(matches!(cause, PipelineCause::Backend(_)));

        let cause: PipelineCause = OutputError::Empty.into();
        assert!(matches!(cause, PipelineCause::Output(_)));

        let cause: PipelineCause = TellerError::Storage("disk full".to_string()).into();
        assert!(matches!(cause, PipelineCause::Internal(_)));
        assert!(cause.to_string().contains("disk full"));
    }

    #[test]
    fn test_user_message_by_category() {
        let auth = PipelineError::new(PipelineStage::Authenticated, AuthError::InvalidToken);
        assert_eq!(auth.user_message(), "Please sign in again.");

        let rate = PipelineError::new(
            PipelineStage::RateChecked,
            RateLimitError::RetryAfter { seconds: 1.0 },
        );
        assert_eq!(
            rate.user_message(),
            "You are sending requests too quickly. Please wait a moment."
        );

        let input = PipelineError::new(
            PipelineStage::Normalized,
            InputError::TooLong {
                length: 5000,
                max: 4000,
            },
        );
        assert_eq!(
            input.user_message(),
            "Your message could not be accepted. Please rephrase it."
        );

        let backend = PipelineError::new(PipelineStage::Routed, BackendError::AllBackendsFailed);
        assert_eq!(
            backend.user_message(),
            "The assistant is temporarily unavailable. Please try again shortly."
        );

        let output = PipelineError::new(PipelineStage::Validated, OutputError::Empty);
        assert_eq!(
            output.user_message(),
            "The assistant is temporarily unavailable. Please try again shortly."
        );

        let internal = PipelineError::new(
            PipelineStage::Completed,
            PipelineCause::Internal("lock poisoned".to_string()),
        );
        assert_eq!(internal.user_message(), "Something went wrong. Please try again.");
    }

    #[test]
    fn test_same_cause_different_stage_not_equal() {
        let a = PipelineError::new(PipelineStage::Normalized, InputError::Empty);
        let b = PipelineError::new(PipelineStage::Validated, InputError::Empty);
        assert_ne!(a, b);
    }

    #[test]
    fn test_transparent_cause_display_matches_inner() {
        let inner = RateLimitError::RetryAfter { seconds: 1.5 };
        let cause = PipelineCause::RateLimit(inner.clone());
        assert_eq!(cause.to_string(), inner.to_string());
    }
}
