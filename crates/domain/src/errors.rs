//! Error types used throughout the application

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the KSeF pull pipeline.
///
/// The handshake variants (`KeyFetch` through `Redeem`) map one-to-one onto
/// the six authentication steps so a failed run names the step that broke.
#[derive(Error, Debug, Serialize, Deserialize)]
pub enum KsefError {
    /// Non-success HTTP status with a best-effort decoded body.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Public key fetch failed: {0}")]
    KeyFetch(String),

    #[error("Challenge request failed: {0}")]
    Challenge(String),

    #[error("Token encryption failed: {0}")]
    Encryption(String),

    #[error("Token submission failed: {0}")]
    Submit(String),

    /// Explicit server-side rejection of the handshake. Never retried.
    #[error("Authentication rejected (code {code}): {description} | {details:?}")]
    Rejected { code: i64, description: String, details: Vec<String> },

    #[error("Authentication confirmation polling exhausted")]
    Timeout,

    #[error("Token redemption failed: {0}")]
    Redeem(String),

    #[error("Token refresh failed: {0}")]
    Refresh(String),

    #[error("Not authenticated: run authenticate() first")]
    NotAuthenticated,

    #[error("Invoice query failed: {0}")]
    Fetch(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for KSeF operations
pub type Result<T> = std::result::Result<T, KsefError>;
