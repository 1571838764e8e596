//! QR login session lifecycle.
//!
//! A browser asks for a login session and shows its confirmation URL as a
//! QR code. A second device scans it and confirms. The browser polls until
//! the session reads `Confirmed`, or until it disappears (expired).
//!
//! ## Guarantees
//! - Session ids are 32 URL-safe chars from the OS CSPRNG
//! - Sessions are valid for exactly 5 minutes from creation
//! - Confirmation is single-use, even under concurrent confirm calls
//! - Expired sessions are removed lazily on read and swept on every create

pub mod clock;
pub mod session;
pub mod store;
pub mod token;

pub use clock::{Clock, ManualClock, SystemClock};
pub use session::{LoginSession, LoginStatus};
pub use store::{LoginSessionStore, DEFAULT_USER_INFO, SESSION_TTL_SECS};

/// Failures that abort session creation. Lookup misses and rejected
/// confirmations are ordinary return values, not errors.
#[derive(Debug, thiserror::Error)]
pub enum LoginError {
    /// The OS entropy source could not produce bytes.
    #[error("secure random source unavailable: {0}")]
    Entropy(String),
    /// `create` was called without a base URL.
    #[error("confirmation base URL must not be empty")]
    InvalidBaseUrl,
}
