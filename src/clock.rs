//! Time source abstraction
//!
//! Every "now" lookup in the engine goes through a [`Clock`] so that
//! timestamps, durations and analysis windows can be driven from tests.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Source of wall-clock and monotonic time
pub trait Clock: Send + Sync + Debug {
    /// Wall-clock time in Unix milliseconds
    fn now_millis(&self) -> u64;

    /// Monotonic time elapsed since an arbitrary fixed origin
    fn monotonic(&self) -> Duration;
}

/// Current Unix time in milliseconds
pub fn current_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Real system clock
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        current_millis()
    }

    fn monotonic(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Manually driven clock for deterministic tests
///
/// Wall-clock and monotonic time advance together.
#[derive(Debug)]
pub struct ManualClock {
    millis: AtomicU64,
    start: u64,
}

impl ManualClock {
    pub fn new(start_millis: u64) -> Self {
        Self {
            millis: AtomicU64::new(start_millis),
            start: start_millis,
        }
    }

    pub fn advance(&self, by: Duration) {
        self.millis
            .fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }

    /// Jump to an absolute time; moving backwards is ignored
    pub fn set(&self, millis: u64) {
        self.millis.fetch_max(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.millis.load(Ordering::SeqCst)
    }

    fn monotonic(&self) -> Duration {
        Duration::from_millis(self.now_millis().saturating_sub(self.start))
    }
}
