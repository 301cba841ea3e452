//! # KSeF Core
//!
//! Pure logic for the invoice pull pipeline:
//! - date-range partitioning under the hourly request quota
//! - ordered candidate-key extraction for unstable server field naming
//! - token-shape normalization
//! - the clock/sleep seam that makes every fixed-interval wait testable
//!
//! No networking and no I/O; the infra crate wires these into the
//! authentication handshake and the windowed fetcher.

pub mod extract;
pub mod time;
pub mod windowing;
