//! Local Ollama backend via its OpenAI-compatible endpoint.

use std::time::Instant;

use async_trait::async_trait;
use tracing::warn;

use teller_core::{Result, TellerError};

use crate::backend::{BackendReply, HistoryTurn, LlmBackend};
use crate::descriptor::BackendDescriptor;
use crate::error::BackendError;
use crate::wire::{build_messages, ChatCompletionRequest, ChatCompletionResponse};

/// Strip trailing slashes and a `/v1` suffix so configured endpoints
/// land on the same base regardless of spelling.
fn normalize_endpoint(url: &str) -> String {
    let mut url = url.trim_end_matches('/').to_string();
    if url.ends_with("/v1") {
        url.truncate(url.len() - 3);
    }
    url
}

/// Adapter for a local Ollama server. No authentication.
pub struct OllamaBackend {
    descriptor: BackendDescriptor,
    base_url: String,
    client: reqwest::Client,
}

impl OllamaBackend {
    pub fn new(descriptor: BackendDescriptor) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(descriptor.timeout)
            .build()
            .map_err(|e| TellerError::Config(format!("Failed to build HTTP client: {}", e)))?;
        let base_url = normalize_endpoint(&descriptor.endpoint);
        Ok(Self {
            descriptor,
            base_url,
            client,
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
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
impl LlmBackend for OllamaBackend {
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
