//! Scripted backend for tests and offline runs.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::backend::{BackendReply, HistoryTurn, LlmBackend};
use crate::error::BackendError;

/// Backend returning queued replies, or a canned default once the queue
/// is drained. Records every prompt it receives.
pub struct MockBackend {
    name: String,
    replies: Mutex<VecDeque<Result<String, BackendError>>>,
    calls: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

impl MockBackend {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            replies: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Make every call stall before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue a successful reply.
    pub fn push_reply(&self, text: &str) {
        self.replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(Ok(text.to_string()));
    }

    /// Queue a failure.
    pub fn push_failure(&self, err: BackendError) {
        self.replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(Err(err));
    }

    /// Prompts received so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl LlmBackend for MockBackend {
    async fn invoke(
        &self,
        prompt: &str,
        _history: &[HistoryTurn],
    ) -> Result<BackendReply, BackendError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(prompt.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let scripted = self
            .replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        match scripted {
            Some(Ok(text)) => Ok(BackendReply {
                text,
                model: "mock".to_string(),
                latency_ms: 0,
            }),
            Some(Err(err)) => Err(err),
            None => Ok(BackendReply {
                text: format!("mock reply from {}", self.name),
                model: "mock".to_string(),
                latency_ms: 0,
            }),
        }
    }
}
