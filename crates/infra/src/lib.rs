//! # KSeF Infra
//!
//! Adapters around the KSeF API 2.0:
//! - [`http`] — thin JSON-over-HTTP transport with bounded timeouts
//! - [`auth`] — the six-step token handshake and session credential holder
//! - [`fetch`] — windowed, rate-limited, self-recovering bulk retrieval
//! - [`report`] — spreadsheet artifact for the fetched record lists

pub mod auth;
pub mod fetch;
pub mod http;
pub mod report;

pub use auth::AuthSession;
pub use fetch::WindowedFetcher;
