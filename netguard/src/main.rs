//! NetGuard CLI binary.
//!
//! Entry point for the `netguard` command-line tool.

use std::io::{self, Write};
use std::process::ExitCode;

use clap::Parser;
use netguard::exit::{codes, exit_code};
use netguard::logger::{init_tracing, TracingLogger, Verbosity};
use netguard::{
    config, execute_clear, execute_export, execute_logs, execute_query, execute_stats, Cli,
    Command, CommandError,
};
use netguard_clock::SystemClock;
use netguard_store::{Sink, SqliteSink, StoreConfig};

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(Verbosity::from_count(cli.verbose));
    let logger = TracingLogger;

    let store = config::resolve_logged(&cli.store, &logger);

    let result = match cli.command {
        Command::Monitor(args) => run_monitor(args, &store, &logger),
        Command::Stats(args) => with_store(&store, |sink, out| {
            execute_stats(&args, &*sink, out).map(|_| codes::SUCCESS)
        }),
        Command::Logs(args) => with_store(&store, |sink, out| {
            execute_logs(&args, &*sink, out).map(|_| codes::SUCCESS)
        }),
        Command::Query(args) => with_store(&store, |sink, out| {
            execute_query(&args, &*sink, out).map(|_| codes::SUCCESS)
        }),
        Command::Export(args) => with_store(&store, |sink, out| {
            let summary = execute_export(&args, &*sink, &SystemClock, &logger)?;
            writeln!(
                out,
                "Report: {} ({} records, {} pages)",
                summary.path.display(),
                summary.records,
                summary.pages
            )?;
            Ok(codes::SUCCESS)
        }),
        Command::Clear(args) => with_store(&store, |sink, out| {
            let deleted = execute_clear(&args, sink, &logger)?;
            writeln!(out, "Deleted {} records", deleted)?;
            Ok(codes::SUCCESS)
        }),
    };

    match result {
        Ok(code) => ExitCode::from(code as u8),
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::from(exit_code(&e) as u8)
        }
    }
}

/// Open the store, run one command against it with stdout, close it.
fn with_store<F>(store: &StoreConfig, f: F) -> Result<i32, CommandError>
where
    F: FnOnce(&mut SqliteSink<SystemClock>, &mut io::StdoutLock<'static>) -> Result<i32, CommandError>,
{
    let mut sink = SqliteSink::connect(store, SystemClock)?;
    let mut out = io::stdout().lock();
    let result = f(&mut sink, &mut out);
    sink.close();
    result
}

/// Run the monitor command against the live capture device.
#[cfg(feature = "pcap")]
fn run_monitor(
    args: netguard::MonitorArgs,
    store: &StoreConfig,
    logger: &TracingLogger,
) -> Result<i32, CommandError> {
    use netguard::{execute_monitor, resolve_interface, RealSleeper, ShutdownFlag};
    use netguard_capture::PcapOpener;

    let sources = PcapOpener {
        device: resolve_interface(args.iface.as_deref()),
        snaplen: args.snaplen,
        poll_timeout_ms: args.poll_timeout_ms,
        promiscuous: true,
    };
    let shutdown = ShutdownFlag::with_ctrlc_or_warn(logger);
    let mut out = io::stdout().lock();

    let result = execute_monitor(
        &args,
        store,
        sources,
        &SystemClock,
        &RealSleeper,
        &shutdown,
        logger,
        &mut out,
    )?;

    if let Some(capture) = result.capture {
        writeln!(
            out,
            "Captured {} frames, stored {} records ({} dropped, {} non-IP)",
            capture.frames_seen, capture.records_written, capture.writes_dropped, capture.non_ip_skipped
        )?;
    }
    if let Some(summary) = &result.export {
        writeln!(out, "Report: {}", summary.path.display())?;
    }

    Ok(if result.interrupted {
        codes::SIGINT
    } else {
        codes::SUCCESS
    })
}

/// Without libpcap there is no capture device to open.
#[cfg(not(feature = "pcap"))]
fn run_monitor(
    _args: netguard::MonitorArgs,
    _store: &StoreConfig,
    _logger: &TracingLogger,
) -> Result<i32, CommandError> {
    Err(CommandError::CaptureUnavailable)
}
