//! Hosted backend speaking the OpenAI Chat Completions API.

use std::time::Instant;

use async_trait::async_trait;
use tracing::warn;

use teller_core::{Result, TellerError};

use crate::backend::{BackendReply, HistoryTurn, LlmBackend};
use crate::descriptor::BackendDescriptor;
use crate::error::BackendError;
use crate::wire::{build_messages, ChatCompletionRequest, ChatCompletionResponse};

/// Adapter for OpenAI and API-compatible hosted providers.
pub struct OpenAiBackend {
    descriptor: BackendDescriptor,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiBackend {
    pub fn new(descriptor: BackendDescriptor, api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(descriptor.timeout)
            .build()
            .map_err(|e| TellerError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            descriptor,
            api_key,
            client,
        })
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.descriptor.endpoint.trim_end_matches('/')
        )
    }

    fn transport_error(&self, err: &reqwest::Error) -> BackendError {
        if err.is_timeout() {
            BackendError::Timeout {
                backend: self.descriptor.name.clone(),
                seconds: self.descriptor.timeout.as_secs(),
            }
        } else {
            BackendError::Unavailable(self.descriptor.name.clone())
        }
    }
}

#[async_trait]
impl LlmBackend for OpenAiBackend {
    async fn invoke(
        &self,
        prompt: &str,
        history: &[HistoryTurn],
    ) -> std::result::Result<BackendReply, BackendError> {
        let body = ChatCompletionRequest {
            model: self.descriptor.model.clone(),
            messages: build_messages(history, prompt),
            max_tokens: self.descriptor.max_tokens,
            temperature: self.descriptor.temperature,
            stream: false,
        };

        let started = Instant::now();
        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                warn!(backend = %self.descriptor.name, error = %e, "request failed");
                self.transport_error(&e)
            })?;

        if !response.status().is_success() {
            let status = response.status();
            warn!(backend = %self.descriptor.name, %status, "error status from backend");
            return Err(BackendError::Unavailable(self.descriptor.name.clone()));
        }

        let parsed: ChatCompletionResponse = response.json().await.map_err(|e| {
            warn!(backend = %self.descriptor.name, error = %e, "malformed backend response");
            BackendError::Unavailable(self.descriptor.name.clone())
        })?;
        let latency_ms = started.elapsed().as_millis() as u64;

        // An empty choice list or missing content becomes an empty reply;
        // judging emptiness is the validator's job, not the adapter's.
        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();

        Ok(BackendReply {
            text,
            model: self.descriptor.model.clone(),
            latency_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use teller_core::config::BackendConfig;

    fn make_backend(endpoint: &str) -> OpenAiBackend {
        let config = BackendConfig {
            endpoint: endpoint.to_string(),
            ..BackendConfig::default()
        };
        let descriptor = BackendDescriptor::from_config(&config).unwrap();
        OpenAiBackend::new(descriptor, "test-key".to_string()).unwrap()
    }

    #[test]
    fn test_completions_url_from_base() {
        let backend = make_backend("https://api.openai.com/v1");
        assert_eq!(
            backend.completions_url(),
            "https://api.openai.com/v1/chat/completions"
        );
    }

    #[test]
    fn test_completions_url_trims_trailing_slash() {
        let backend = make_backend("https://api.openai.com/v1/");
        assert_eq!(
            backend.completions_url(),
            "https://api.openai.com/v1/chat/completions"
        );
    }

    #[test]
    fn test_backend_carries_descriptor_timeout() {
        let backend = make_backend("https://api.openai.com/v1");
        assert_eq!(backend.descriptor.timeout, Duration::from_secs(30));
    }
}
