//! Monitor command: capture in the background, refresh a dashboard in the
//! foreground, stop on Ctrl+C or after the requested duration.

use std::io::Write;
use std::time::Duration;

use netguard_capture::SourceOpener;
use netguard_clock::Clock;
use netguard_report::{export, ExportOptions, ExportSummary};
use netguard_stats::ViewConfig;
use netguard_store::{Sink, SqliteOpener, SqliteSink, StoreConfig};

use crate::cli::MonitorArgs;
use crate::engine::EngineReport;
use crate::lifecycle::CaptureController;
use crate::logger::Logger;
use crate::poller::{self, PollerConfig};
use crate::render;
use crate::signal::ShutdownCheck;
use crate::sleeper::Sleeper;

use super::CommandResult;

/// Extra time, beyond one capture poll, allowed for the capture thread to exit.
const STOP_GRACE_MS: u64 = 2000;

/// Result of monitor command execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorResult {
    /// Dashboard refreshes.
    pub ticks: u64,
    /// Refreshes that failed.
    pub refresh_failures: u64,
    /// Capture counters, if the capture thread exited within the grace period.
    pub capture: Option<EngineReport>,
    /// Set when the report was exported on exit.
    pub export: Option<ExportSummary>,
    /// True when monitoring ended because of a shutdown request.
    pub interrupted: bool,
}

/// Execute the monitor command.
///
/// Capture runs on its own thread with its own store connection; the
/// dashboard refreshes on the calling thread through another connection.
#[allow(clippy::too_many_arguments)]
pub fn execute_monitor<SO, C, S, H, L, W>(
    args: &MonitorArgs,
    store: &StoreConfig,
    sources: SO,
    clock: &C,
    sleeper: &S,
    shutdown: &H,
    logger: &L,
    out: &mut W,
) -> CommandResult<MonitorResult>
where
    SO: SourceOpener + 'static,
    C: Clock + Clone + 'static,
    S: Sleeper,
    H: ShutdownCheck,
    L: Logger + Clone + 'static,
    W: Write,
{
    args.validate()?;

    let sinks = SqliteOpener::new(store, clock.clone());
    let mut controller = CaptureController::new(sources, sinks.clone(), logger.clone());
    controller.start()?;
    logger.info(&format!(
        "monitoring; store {} (refresh every {}s, Ctrl+C to stop)",
        store.database_path().display(),
        args.refresh_sec
    ));

    let config = PollerConfig {
        interval_sec: args.refresh_sec,
        view: ViewConfig {
            window_secs: args.window_sec,
            top_n: args.top,
            recent_n: args.recent,
        },
        max_ticks: None,
        duration_sec: args.duration_sec,
    };

    let polled = poller::run(&sinks, &config, clock, sleeper, shutdown, logger, |snapshot, history| {
        if let Err(e) = render::write_dashboard(out, snapshot, history) {
            logger.warn(&format!("cannot write dashboard: {}", e));
        }
    });
    let interrupted = shutdown.should_stop();

    controller.stop();
    let grace = Duration::from_millis(args.poll_timeout_ms.max(0) as u64 + STOP_GRACE_MS);
    let capture = if controller.wait_stopped(grace) {
        controller.last_report()
    } else {
        logger.warn("capture thread still running; exiting without waiting");
        None
    };

    let exported = match &args.export {
        Some(path) => {
            let mut reader = SqliteSink::connect(store, clock.clone())?;
            let options = ExportOptions {
                top_n: args.top,
                ..ExportOptions::default()
            };
            let result = export(&reader, clock, path, &options);
            reader.close();
            let summary = result?;
            logger.info(&format!(
                "report written to {} ({} records)",
                summary.path.display(),
                summary.records
            ));
            Some(summary)
        }
        None => None,
    };

    Ok(MonitorResult {
        ticks: polled.ticks,
        refresh_failures: polled.failures,
        capture,
        export: exported,
        interrupted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::CommandError;
    use crate::lifecycle::LifecycleError;
    use crate::logger::{MockLogger, NullLogger};
    use crate::signal::{AlwaysShutdown, NeverShutdown};
    use crate::sleeper::MockSleeper;
    use netguard_capture::synth::{self, SYN};
    use netguard_capture::{ScriptedOpener, ScriptedSource};
    use netguard_clock::{AdvancingClock, MockClock};
    use netguard_stats::summary;
    use std::path::PathBuf;
    use std::sync::Arc;
    use tempfile::TempDir;

    /// Sleeps briefly so the capture thread gets to drain its script.
    struct ShortSleeper;

    impl Sleeper for ShortSleeper {
        fn sleep_sec(&self, _seconds: u64) {
            std::thread::sleep(std::time::Duration::from_millis(20));
        }
    }

    fn args() -> MonitorArgs {
        MonitorArgs {
            iface: None,
            duration_sec: Some(10),
            refresh_sec: 5,
            window_sec: 10,
            top: 5,
            recent: 5,
            export: None,
            snaplen: 65535,
            poll_timeout_ms: 10,
        }
    }

    fn store(dir: &TempDir) -> StoreConfig {
        StoreConfig {
            data_dir: dir.path().to_path_buf(),
            ..StoreConfig::default()
        }
    }

    fn frames() -> ScriptedOpener {
        ScriptedOpener::new(ScriptedSource::from_frames(vec![
            synth::tcp_frame("10.0.0.1", "10.0.0.9", SYN),
            synth::tcp_frame("10.0.0.1", "10.0.0.9", SYN),
            synth::udp_frame("10.0.0.2", "10.0.0.9"),
        ]))
    }

    #[test]
    fn test_monitor_captures_and_refreshes() {
        let dir = TempDir::new().expect("tempdir");
        let config = store(&dir);
        let clock = Arc::new(AdvancingClock::new(1_704_067_200, 1));
        let mut out = Vec::new();

        let result = execute_monitor(
            &args(),
            &config,
            frames(),
            &clock,
            &ShortSleeper,
            &NeverShutdown,
            &NullLogger,
            &mut out,
        )
        .expect("monitor");

        assert!(result.ticks >= 1);
        assert!(!result.interrupted);
        let capture = result.capture.expect("capture report");
        assert_eq!(capture.records_written, 3);

        let reader = SqliteSink::connect(&config, MockClock::new(0)).expect("reader");
        let counts = summary(&reader).expect("summary");
        assert_eq!(counts.tcp, 2);
        assert_eq!(counts.udp, 1);

        let text = String::from_utf8(out).expect("utf8");
        assert!(text.contains("| last 10s:"));
    }

    #[test]
    fn test_monitor_exports_on_exit() {
        let dir = TempDir::new().expect("tempdir");
        let config = store(&dir);
        let report = dir.path().join("report.html");
        let monitor = MonitorArgs {
            export: Some(report.clone()),
            ..args()
        };

        let result = execute_monitor(
            &monitor,
            &config,
            frames(),
            &MockClock::new(1_704_067_200),
            &MockSleeper::new(),
            &AlwaysShutdown,
            &NullLogger,
            &mut Vec::new(),
        )
        .expect("monitor");

        assert!(result.interrupted);
        assert_eq!(result.ticks, 0);
        let summary = result.export.expect("export summary");
        assert_eq!(summary.path, report);
        assert!(report.exists());
    }

    #[test]
    fn test_monitor_start_failure() {
        let dir = TempDir::new().expect("tempdir");
        let logger = MockLogger::new();

        let err = execute_monitor(
            &args(),
            &store(&dir),
            ScriptedOpener::failing("no such device"),
            &MockClock::new(0),
            &MockSleeper::new(),
            &NeverShutdown,
            &logger,
            &mut Vec::new(),
        )
        .unwrap_err();

        assert!(matches!(err, CommandError::Start(LifecycleError::Start(_))));
        assert!(logger.contains("no such device"));
    }

    #[test]
    fn test_monitor_unreachable_store() {
        let config = StoreConfig {
            data_dir: PathBuf::from("/nonexistent/netguard/monitor"),
            ..StoreConfig::default()
        };

        let err = execute_monitor(
            &args(),
            &config,
            frames(),
            &MockClock::new(0),
            &MockSleeper::new(),
            &NeverShutdown,
            &NullLogger,
            &mut Vec::new(),
        )
        .unwrap_err();

        assert!(matches!(err, CommandError::Start(LifecycleError::Store(_))));
    }

    #[test]
    fn test_monitor_invalid_args() {
        let dir = TempDir::new().expect("tempdir");
        let err = execute_monitor(
            &MonitorArgs {
                refresh_sec: 0,
                ..args()
            },
            &store(&dir),
            frames(),
            &MockClock::new(0),
            &MockSleeper::new(),
            &NeverShutdown,
            &NullLogger,
            &mut Vec::new(),
        )
        .unwrap_err();
        assert!(matches!(err, CommandError::InvalidArgument(_)));
    }
}
