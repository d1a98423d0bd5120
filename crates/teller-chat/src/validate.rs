//! Response validation: raw backend output becomes a sanitized, bounded
//! reply, or is rejected for the pipeline's empty-reply retry.

use teller_backend::RoutedReply;
use teller_core::config::TellerConfig;
use teller_core::sanitize::Sanitizer;
use teller_core::types::Response;
use tracing::debug;

use crate::error::OutputError;

/// Post-processes raw model output into a [`Response`].
///
/// Applies the same denylist as the input path; a backend can echo an
/// injection sequence back. A response never leaves here unsanitized.
pub struct ResponseValidator {
    max_chars: usize,
    sanitizer: Sanitizer,
}

impl ResponseValidator {
    pub fn new(max_chars: usize, sanitizer: Sanitizer) -> Self {
        Self {
            max_chars,
            sanitizer,
        }
    }

    pub fn from_config(config: &TellerConfig) -> Self {
        Self::new(
            config.output.max_chars,
            Sanitizer::from_config(&config.sanitize),
        )
    }

    pub fn validate(&self, reply: &RoutedReply) -> Result<Response, OutputError> {
        let cleaned = self.sanitizer.apply(&reply.text);
        if cleaned.text.is_empty() {
            return Err(OutputError::Empty);
        }
        if cleaned.removed > 0 {
            debug!(
                backend = %reply.backend,
                removed = cleaned.removed,
                "removed denied sequences from backend reply"
            );
        }

        let length = cleaned.text.chars().count();
        let truncated = length > self.max_chars;
        let text = if truncated {
            cleaned.text.chars().take(self.max_chars).collect()
        } else {
            cleaned.text
        };

        Ok(Response {
            text,
            source_backend: reply.backend.clone(),
            latency_ms: reply.latency_ms,
            sanitized: true,
            truncated,
        })
    }
}
