use thiserror::Error;

/// Ambient error type for the Teller system.
///
/// Covers cross-cutting failures (configuration, storage, I/O,
/// serialization). Domain crates define their own error types and convert
/// into `TellerError` where a call crosses out of the domain, so the `?`
/// operator works across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TellerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Shutdown in progress")]
    ShuttingDown,
}

impl From<toml::de::Error> for TellerError {
    fn from(err: toml::de::Error) -> Self {
        TellerError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for TellerError {
    fn from(err: toml::ser::Error) -> Self {
        TellerError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for TellerError {
    fn from(err: serde_json::Error) -> Self {
        TellerError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Teller operations.
pub type Result<T> = std::result::Result<T, TellerError>;
