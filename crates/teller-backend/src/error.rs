//! Error types for backend invocation and routing.

/// Errors from language-model backends and the router.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("backend {backend} timed out after {seconds}s")]
    Timeout { backend: String, seconds: u64 },
    #[error("all backends failed")]
    AllBackendsFailed,
}
