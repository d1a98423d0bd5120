//! Uniform invocation contract over heterogeneous model providers.
//!
//! Every provider, hosted or local, is wrapped behind [`LlmBackend`].
//! Provider-specific request and response shapes stay inside the
//! individual adapter modules; everything past this boundary sees only
//! prompt text, history, and a [`BackendReply`].

use async_trait::async_trait;

use crate::error::BackendError;

/// System prompt sent ahead of every conversation.
pub const SYSTEM_PROMPT: &str = "You are a helpful banking assistant.";

/// One completed exchange replayed to the backend as history.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryTurn {
    pub user: String,
    pub assistant: String,
}

impl HistoryTurn {
    pub fn new(user: impl Into<String>, assistant: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            assistant: assistant.into(),
        }
    }
}

/// Raw reply from a single backend call, before validation.
#[derive(Debug, Clone)]
pub struct BackendReply {
    pub text: String,
    pub model: String,
    pub latency_ms: u64,
}

/// A language-model provider.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Send the prompt with replayed history and return the raw reply.
    async fn invoke(&self, prompt: &str, history: &[HistoryTurn])
        -> Result<BackendReply, BackendError>;
}
