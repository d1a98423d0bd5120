//! Pluggable language-model backends behind one invocation contract,
//! with selection, failover, and per-backend timeouts.

pub mod backend;
pub mod descriptor;
pub mod error;
pub mod mock;
pub mod ollama;
pub mod openai;
pub mod router;

mod wire;

pub use backend::{BackendReply, HistoryTurn, LlmBackend, SYSTEM_PROMPT};
pub use descriptor::{BackendDescriptor, BackendKind};
pub use error::BackendError;
pub use mock::MockBackend;
pub use ollama::OllamaBackend;
pub use openai::OpenAiBackend;
pub use router::{ModelRouter, RoutedReply};
