//! Sleep abstraction for the periodic consumer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Trait for sleeping between refresh ticks.
pub trait Sleeper: Send + Sync {
    /// Sleep for the specified number of seconds.
    fn sleep_sec(&self, seconds: u64);
}

/// Real sleeper that uses `std::thread::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealSleeper;

impl Sleeper for RealSleeper {
    fn sleep_sec(&self, seconds: u64) {
        std::thread::sleep(Duration::from_secs(seconds));
    }
}

/// Mock sleeper for testing: returns immediately and tallies the requested
/// time. Clones share the tally.
#[derive(Debug, Default, Clone)]
pub struct MockSleeper {
    slept: Arc<AtomicU64>,
    calls: Arc<AtomicU64>,
}

impl MockSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total seconds requested so far.
    pub fn slept_sec(&self) -> u64 {
        self.slept.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Sleeper for MockSleeper {
    fn sleep_sec(&self, seconds: u64) {
        self.slept.fetch_add(seconds, Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}
