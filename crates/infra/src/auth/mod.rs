//! KSeF token authentication.

pub mod crypto;
mod session;

pub use session::AuthSession;
