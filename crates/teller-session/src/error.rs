//! Error types for session authentication and rate limiting.

/// Authentication failures. Surfaced to the caller without retry; the
/// user must log in again.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("invalid session token")]
    InvalidToken,
    #[error("session expired")]
    Expired,
}

/// Rate-limit failures. Surfaced to the caller without retry; the wait
/// until one whole token is available is included.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RateLimitError {
    #[error("rate limit exceeded, retry in {seconds:.1}s")]
    RetryAfter { seconds: f64 },
}
