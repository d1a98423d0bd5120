//! OpenAI-compatible chat-completions wire format, shared by the HTTP
//! adapters.

use serde::{Deserialize, Serialize};

use crate::backend::{HistoryTurn, SYSTEM_PROMPT};

#[derive(Debug, Serialize)]
pub(crate) struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f64,
    pub stream: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatCompletionResponse {
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatChoice {
    pub message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatResponseMessage {
    pub content: Option<String>,
}

/// Assemble the message list: system prompt, replayed history in order,
/// then the current prompt.
pub(crate) fn build_messages(history: &[HistoryTurn], prompt: &str) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() * 2 + 2);
    messages.push(ChatMessage {
        role: "system".to_string(),
        content: SYSTEM_PROMPT.to_string(),
    });
    for turn in history {
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: turn.user.clone(),
        });
        messages.push(ChatMessage {
            role: "assistant".to_string(),
            content: turn.assistant.clone(),
        });
    }
    messages.push(ChatMessage {
        role: "user".to_string(),
        content: prompt.to_string(),
    });
    messages
}
