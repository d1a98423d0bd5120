//! Conversational request-processing core for Teller.
//!
//! Drives each request through admission, input normalization, backend
//! routing, and response validation, maintaining a bounded per-session
//! conversation context along the way.

pub mod context;
pub mod error;
pub mod feedback;
pub mod intent;
pub mod normalize;
pub mod pipeline;
pub mod transcribe;
pub mod validate;

pub use context::{Context, ContextStore};
pub use error::{InputError, OutputError, PipelineCause, PipelineError, PipelineStage};
pub use feedback::{FeedbackEntry, FeedbackSink, MemoryFeedbackSink};
pub use intent::{classify_intent, classify_sentiment};
pub use normalize::InputNormalizer;
pub use pipeline::{ConversationPipeline, RequestInput, SessionView, TurnOutcome};
pub use transcribe::{MockSpeechToText, SpeechToText, UnavailableSpeechToText};
pub use validate::ResponseValidator;
