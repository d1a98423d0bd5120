//! Teller API crate - axum HTTP server, route handlers, error mapping.
//!
//! Provides the REST surface for the teller service: login/logout, text
//! and voice chat, per-turn feedback, session introspection, and health
//! checks. Handlers are thin callers of the request-processing core.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::{ApiError, ErrorBody};
pub use routes::{create_router, start_server};
pub use state::AppState;
