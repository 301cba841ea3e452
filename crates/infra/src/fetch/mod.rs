//! Windowed, rate-limited bulk invoice retrieval.

mod fetcher;

pub use fetcher::WindowedFetcher;
