//! Application state shared across all route handlers.
//!
//! AppState holds references to the pipeline and the archival services.
//! It is passed to handlers via axum's State extractor.

use std::sync::Arc;
use std::time::Instant;

use teller_chat::{ConversationPipeline, FeedbackSink};
use teller_core::TellerConfig;
use teller_storage::TurnRepository;

/// Shared application state.
///
/// All fields use `Arc` for cheap cloning across handler tasks.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<TellerConfig>,
    /// The request-processing core; owns sessions, routing, and context.
    pub pipeline: Arc<ConversationPipeline>,
    /// Archive of completed turns, written after each successful chat.
    pub turns: Arc<TurnRepository>,
    /// Destination for user ratings of stored turns.
    pub feedback: Arc<dyn FeedbackSink>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    /// Create a new AppState with the given components.
    pub fn new(
        config: TellerConfig,
        pipeline: ConversationPipeline,
        turns: TurnRepository,
        feedback: Arc<dyn FeedbackSink>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            pipeline: Arc::new(pipeline),
            turns: Arc::new(turns),
            feedback,
            start_time: Instant::now(),
        }
    }
}
