//! Speech-to-text collaborator contract.
//!
//! The signal processing itself lives outside the core; implementations
//! wrap whatever engine is deployed. The pipeline only needs the
//! transcript, which then takes the same normalization path as typed
//! text.

use async_trait::async_trait;

use crate::error::InputError;

/// Converts a captured audio payload into text.
#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Transcribe an audio payload. Failures surface as
    /// [`InputError::TranscriptionFailed`].
    async fn transcribe(&self, audio: &[u8]) -> Result<String, InputError>;
}

/// Placeholder used when no engine is wired in. Every call fails, so
/// voice requests are rejected while text requests are unaffected.
pub struct UnavailableSpeechToText;

#[async_trait]
impl SpeechToText for UnavailableSpeechToText {
    async fn transcribe(&self, _audio: &[u8]) -> Result<String, InputError> {
        Err(InputError::TranscriptionFailed(
            "no speech-to-text engine configured".to_string(),
        ))
    }
}

/// Test transcriber with a fixed outcome.
pub struct MockSpeechToText {
    outcome: Result<String, InputError>,
}

impl MockSpeechToText {
    /// Transcriber that always produces `text`.
    pub fn returning(text: &str) -> Self {
        Self {
            outcome: Ok(text.to_string()),
        }
    }

    /// Transcriber that always fails.
    pub fn failing(reason: &str) -> Self {
        Self {
            outcome: Err(InputError::TranscriptionFailed(reason.to_string())),
        }
    }
}

#[async_trait]
impl SpeechToText for MockSpeechToText {
    async fn transcribe(&self, _audio: &[u8]) -> Result<String, InputError> {
        self.outcome.clone()
    }
}
