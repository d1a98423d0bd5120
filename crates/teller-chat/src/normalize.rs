//! Input normalization: raw text or a voice transcript becomes a canonical
//! query, or is rejected before it can reach a backend.

use chrono::Utc;
use teller_core::config::TellerConfig;
use teller_core::sanitize::Sanitizer;
use teller_core::types::{Modality, Query};
use uuid::Uuid;

use crate::error::InputError;

/// Converts raw user input into a canonical [`Query`].
///
/// Checks run in a fixed order so the same input always produces the same
/// outcome: emptiness, length, charset, then sanitization. Length is
/// checked on the raw text; sanitization cannot bring an over-long message
/// back under the limit.
pub struct InputNormalizer {
    max_chars: usize,
    sanitizer: Sanitizer,
}

impl InputNormalizer {
    pub fn new(max_chars: usize, sanitizer: Sanitizer) -> Self {
        Self {
            max_chars,
            sanitizer,
        }
    }

    pub fn from_config(config: &TellerConfig) -> Self {
        Self::new(
            config.input.max_chars,
            Sanitizer::from_config(&config.sanitize),
        )
    }

    /// Normalize one piece of raw input. Voice input arrives here as its
    /// transcript and takes the same path as typed text.
    pub fn normalize(
        &self,
        session_id: Uuid,
        raw_text: &str,
        modality: Modality,
    ) -> Result<Query, InputError> {
        if raw_text.trim().is_empty() {
            return Err(InputError::Empty);
        }

        let length = raw_text.chars().count();
        if length > self.max_chars {
            return Err(InputError::TooLong {
                length,
                max: self.max_chars,
            });
        }

        // NUL never survives into a query; other control characters are
        // stripped by the sanitizer rather than rejected.
        if raw_text.contains('\u{0}') {
            return Err(InputError::InvalidChars);
        }

        let cleaned = self.sanitizer.apply(raw_text);
        if cleaned.text.is_empty() {
            return Err(InputError::Empty);
        }

        Ok(Query {
            session_id,
            raw_text: raw_text.to_string(),
            modality,
            normalized_text: cleaned.text,
            received_at: Utc::now(),
        })
    }
}
