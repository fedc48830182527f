//! Periodic dashboard refresh.
//!
//! The poller owns its own store connection, separate from the capture
//! thread's. A failed refresh is logged and retried on the next tick with a
//! fresh connection; it never ends the loop.

use netguard_clock::Clock;
use netguard_stats::{dashboard, DashboardSnapshot, TrafficHistory, ViewConfig};
use netguard_store::{RecordReader, Sink, SinkOpener};

use crate::logger::Logger;
use crate::signal::ShutdownCheck;
use crate::sleeper::Sleeper;

/// Default refresh interval in seconds.
pub const DEFAULT_REFRESH_SEC: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    pub interval_sec: u64,
    pub view: ViewConfig,
    /// Stop after this many ticks.
    pub max_ticks: Option<u64>,
    /// Stop once this many seconds have passed on `clock`.
    pub duration_sec: Option<u64>,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_sec: DEFAULT_REFRESH_SEC,
            view: ViewConfig::default(),
            max_ticks: None,
            duration_sec: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollerReport {
    pub ticks: u64,
    /// Ticks that produced no snapshot.
    pub failures: u64,
}

/// Refresh once per `interval_sec` until `shutdown` fires or a budget runs out.
///
/// Every successful tick appends the trailing-window count to the history and
/// hands both to `render`. The interval is slept in one-second steps so a
/// shutdown request is seen within a second.
#[allow(clippy::too_many_arguments)]
pub fn run<O, C, S, H, L, F>(
    opener: &O,
    config: &PollerConfig,
    clock: &C,
    sleeper: &S,
    shutdown: &H,
    logger: &L,
    mut render: F,
) -> PollerReport
where
    O: SinkOpener + ?Sized,
    O::Sink: RecordReader,
    C: Clock + ?Sized,
    S: Sleeper + ?Sized,
    H: ShutdownCheck + ?Sized,
    L: Logger + ?Sized,
    F: FnMut(&DashboardSnapshot, &TrafficHistory),
{
    let mut report = PollerReport::default();
    let mut history = TrafficHistory::default();
    let mut conn: Option<O::Sink> = None;

    let start_ts = clock.now_unix_sec();
    let end_ts = config.duration_sec.map(|d| start_ts + d);

    'outer: loop {
        if shutdown.should_stop() {
            break;
        }

        if conn.is_none() {
            match opener.open() {
                Ok(sink) => conn = Some(sink),
                Err(e) => logger.warn(&format!("dashboard refresh failed: {}", e)),
            }
        }

        let refreshed = match conn.as_ref() {
            Some(reader) => match dashboard(reader, &config.view) {
                Ok(snapshot) => {
                    history.push(clock.now_unix_sec(), snapshot.window_count);
                    render(&snapshot, &history);
                    true
                }
                Err(e) => {
                    logger.warn(&format!("dashboard refresh failed: {}", e));
                    if let Some(mut stale) = conn.take() {
                        stale.close();
                    }
                    false
                }
            },
            None => false,
        };

        report.ticks += 1;
        if !refreshed {
            report.failures += 1;
        }

        if config.max_ticks.map_or(false, |max| report.ticks >= max) {
            break;
        }
        if end_ts.map_or(false, |end| clock.now_unix_sec() >= end) {
            break;
        }

        for _ in 0..config.interval_sec.max(1) {
            if shutdown.should_stop() {
                break 'outer;
            }
            sleeper.sleep_sec(1);
        }
    }

    if let Some(mut sink) = conn.take() {
        sink.close();
    }
    logger.debug(&format!(
        "dashboard stopped after {} ticks ({} failed)",
        report.ticks, report.failures
    ));

    report
}
