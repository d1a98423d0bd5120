//! Session admission for the teller service: token authentication,
//! idle-timeout expiry, and per-session token-bucket rate limiting.

pub mod bucket;
pub mod credentials;
pub mod error;
pub mod guard;
pub mod session;

pub use bucket::TokenBucket;
pub use credentials::{CredentialStore, MemoryCredentialStore};
pub use error::{AuthError, RateLimitError};
pub use guard::SessionGuard;
pub use session::{generate_token, AuthState, Session, SessionInfo};
