//! Time abstraction for testability
//!
//! Every wait in the pipeline (poll interval, inter-page pause,
//! inter-window pause, throttle backoff) is a blocking suspension of the
//! single sequential flow. Routing them through [`Clock`] lets tests
//! simulate elapsed time without real delays; production wiring uses
//! [`SystemClock`].

use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;

/// Trait over wall-clock reads and pacing waits.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Milliseconds since the UNIX epoch.
    fn now_millis(&self) -> i64;

    /// Suspend the calling flow for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// Real system clock implementation. Use this in production code.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as i64
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Mock clock for deterministic tests.
///
/// Time advances only through recorded `sleep` calls, which return
/// immediately. Tests assert on the recorded sleep sequence instead of
/// waiting out real intervals.
#[derive(Debug, Clone)]
pub struct MockClock {
    state: Arc<Mutex<MockState>>,
}

#[derive(Debug)]
struct MockState {
    now_millis: i64,
    sleeps: Vec<Duration>,
}

impl MockClock {
    #[must_use]
    pub fn new(now_millis: i64) -> Self {
        Self { state: Arc::new(Mutex::new(MockState { now_millis, sleeps: Vec::new() })) }
    }

    /// Every sleep requested so far, in call order.
    #[must_use]
    pub fn sleeps(&self) -> Vec<Duration> {
        // Test utility: panic on poisoned mutex to fail tests early
        self.state.lock().expect("mutex poisoned").sleeps.clone()
    }

    /// Sum of all requested sleeps.
    #[must_use]
    pub fn total_slept(&self) -> Duration {
        self.sleeps().iter().sum()
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new(0)
    }
}

#[async_trait]
impl Clock for MockClock {
    fn now_millis(&self) -> i64 {
        self.state.lock().expect("mutex poisoned").now_millis
    }

    async fn sleep(&self, duration: Duration) {
        let mut state = self.state.lock().expect("mutex poisoned");
        state.now_millis += duration.as_millis() as i64;
        state.sleeps.push(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_clock_records_sleeps_and_advances() {
        let clock = MockClock::new(1_000);
        clock.sleep(Duration::from_millis(1500)).await;
        clock.sleep(Duration::from_secs(185)).await;

        assert_eq!(clock.sleeps(), vec![Duration::from_millis(1500), Duration::from_secs(185)]);
        assert_eq!(clock.now_millis(), 1_000 + 1_500 + 185_000);
        assert_eq!(clock.total_slept(), Duration::from_millis(186_500));
    }

    #[test]
    fn system_clock_reads_wall_time() {
        // Sanity bound: after 2020, before 2100.
        let now = SystemClock.now_millis();
        assert!(now > 1_577_836_800_000);
        assert!(now < 4_102_444_800_000);
    }
}
