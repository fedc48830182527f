//! Clock abstraction for NetGuard.
//!
//! The store stamps every record from its own clock at write time, and the
//! trailing-window query reads the same clock. Keeping time behind a trait lets
//! tests move it explicitly.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{TimeZone, Utc};

/// Trait for getting the current Unix timestamp.
pub trait Clock: Send + Sync {
    /// Returns the current time as Unix seconds since epoch.
    fn now_unix_sec(&self) -> u64;
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now_unix_sec(&self) -> u64 {
        (**self).now_unix_sec()
    }
}

/// Real system clock implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix_sec(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before Unix epoch")
            .as_secs()
    }
}

/// Mock clock for testing.
///
/// Clones share the same underlying time, so a test can hand one clone to a
/// store and keep another to move time forward.
#[derive(Debug, Clone)]
pub struct MockClock {
    timestamp: Arc<AtomicU64>,
}

impl MockClock {
    /// Create a mock clock fixed at `timestamp`.
    pub fn new(timestamp: u64) -> Self {
        Self {
            timestamp: Arc::new(AtomicU64::new(timestamp)),
        }
    }

    /// Jump to an absolute timestamp.
    pub fn set(&self, timestamp: u64) {
        self.timestamp.store(timestamp, Ordering::SeqCst);
    }

    /// Move time forward by `secs`.
    pub fn advance(&self, secs: u64) {
        self.timestamp.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for MockClock {
    fn now_unix_sec(&self) -> u64 {
        self.timestamp.load(Ordering::SeqCst)
    }
}

/// Mock clock that auto-advances time on each call.
///
/// Useful for loops that must observe time passing without real sleeps.
#[derive(Debug)]
pub struct AdvancingClock {
    timestamp: AtomicU64,
    increment: u64,
}

impl AdvancingClock {
    /// Create an advancing clock starting at `timestamp` and incrementing by `increment` each call.
    pub fn new(timestamp: u64, increment: u64) -> Self {
        Self {
            timestamp: AtomicU64::new(timestamp),
            increment,
        }
    }
}

impl Clock for AdvancingClock {
    fn now_unix_sec(&self) -> u64 {
        self.timestamp.fetch_add(self.increment, Ordering::SeqCst)
    }
}

/// Format a Unix timestamp as `YYYY-MM-DD HH:MM:SS` (UTC).
pub fn format_timestamp(ts_unix_sec: u64) -> String {
    Utc.timestamp_opt(ts_unix_sec as i64, 0)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ts_unix_sec.to_string())
}

/// Format the time-of-day part of a Unix timestamp as `HH:MM:SS` (UTC).
pub fn format_time_of_day(ts_unix_sec: u64) -> String {
    Utc.timestamp_opt(ts_unix_sec as i64, 0)
        .single()
        .map(|dt| dt.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "00:00:00".to_string())
}
