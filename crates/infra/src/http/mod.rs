//! HTTP transport wrapper.

mod client;

pub use client::{json_headers, status_error, HttpClient};
