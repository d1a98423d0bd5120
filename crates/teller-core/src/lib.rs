pub mod config;
pub mod error;
pub mod sanitize;
pub mod store;
pub mod types;

pub use config::TellerConfig;
pub use error::{Result, TellerError};
pub use sanitize::{Sanitized, Sanitizer};
pub use store::{KeyValueStore, MemoryStore};
pub use types::*;
