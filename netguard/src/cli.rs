//! CLI argument parsing for NetGuard.
//!
//! One `netguard` binary with monitor, stats, logs, export, clear and query
//! subcommands. Store connection options are global and fall back to the
//! `DB_*` environment variables, then to defaults.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};
use netguard_capture::{DEFAULT_POLL_TIMEOUT_MS, DEFAULT_SNAPLEN};
use netguard_stats::{
    DEFAULT_DASHBOARD_RECENT, DEFAULT_LOGS_LIMIT, DEFAULT_REPORT_RECENT, DEFAULT_TOP_N,
    DEFAULT_WINDOW_SECS,
};
use netguard_store::config::{DEFAULT_HOST, DEFAULT_USER};
use netguard_store::{DEFAULT_BUSY_TIMEOUT_MS, DEFAULT_DATABASE};
use thiserror::Error;

use crate::poller::DEFAULT_REFRESH_SEC;

/// Version string with the embedded git revision.
pub const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_HASH"),
    ", built ",
    env!("BUILD_UNIX"),
    ")"
);

/// Errors from CLI argument validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CliError {
    #[error("refresh-sec must be at least 1, got {0}")]
    InvalidRefreshSec(u64),

    #[error("window-sec must be at least 1, got {0}")]
    InvalidWindowSec(u64),

    #[error("duration-sec must be at least 1, got {0}")]
    InvalidDurationSec(u64),

    #[error("{name} must be at least 1, got {value}")]
    InvalidLimit { name: &'static str, value: usize },

    #[error("snaplen must be between 64 and 262144, got {0}")]
    InvalidSnaplen(i32),

    #[error("poll-timeout-ms must be at least 1, got {0}")]
    InvalidPollTimeout(i32),

    #[error("query must not be empty")]
    EmptyQuery,
}

fn check_limit(name: &'static str, value: usize) -> Result<(), CliError> {
    if value == 0 {
        return Err(CliError::InvalidLimit { name, value });
    }
    Ok(())
}

fn check_window(window_sec: u64) -> Result<(), CliError> {
    if window_sec == 0 {
        return Err(CliError::InvalidWindowSec(window_sec));
    }
    Ok(())
}

/// NetGuard - live traffic capture into a local store, with dashboards and reports.
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "netguard")]
#[command(version, long_version = LONG_VERSION, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Store connection options.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct StoreArgs {
    /// Database host. The embedded store only accepts a local host.
    #[arg(long = "db-host", env = "DB_HOST", default_value = DEFAULT_HOST, global = true)]
    pub host: String,

    /// Database user.
    #[arg(long = "db-user", env = "DB_USER", default_value = DEFAULT_USER, global = true)]
    pub user: String,

    /// Database password.
    #[arg(
        long = "db-pass",
        env = "DB_PASS",
        default_value = "",
        hide_env_values = true,
        hide_default_value = true,
        global = true
    )]
    pub password: String,

    /// Database name; the store file is <data-dir>/<name>.sqlite3.
    #[arg(long = "db-name", env = "DB_NAME", default_value = DEFAULT_DATABASE, global = true)]
    pub database: String,

    /// Directory holding the store file.
    #[arg(long, env = "NETGUARD_DATA_DIR", default_value = ".", global = true)]
    pub data_dir: PathBuf,

    /// How long a connection waits on a locked store, in milliseconds.
    #[arg(long, default_value_t = DEFAULT_BUSY_TIMEOUT_MS, global = true)]
    pub busy_timeout_ms: u64,
}

/// Available commands.
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Capture live traffic and show a refreshing dashboard until Ctrl+C.
    Monitor(MonitorArgs),
    /// Print counts, protocol mix, top sources and recent records.
    Stats(StatsArgs),
    /// Print the most recent records.
    Logs(LogsArgs),
    /// Write the HTML security report.
    Export(ExportArgs),
    /// Delete every stored record.
    Clear(ClearArgs),
    /// Run a read-only SQL query against the store.
    Query(QueryArgs),
}

/// Arguments for the monitor command.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct MonitorArgs {
    /// Network interface to capture on.
    /// If not specified, uses the interface with the default route.
    #[arg(short, long)]
    pub iface: Option<String>,

    /// Stop after this many seconds. If not specified, runs until Ctrl+C.
    #[arg(long)]
    pub duration_sec: Option<u64>,

    /// Dashboard refresh interval in seconds.
    #[arg(long, default_value_t = DEFAULT_REFRESH_SEC)]
    pub refresh_sec: u64,

    /// Trailing window for the live rate, in seconds.
    #[arg(long, default_value_t = DEFAULT_WINDOW_SECS)]
    pub window_sec: u64,

    /// Number of top source addresses to show.
    #[arg(long, default_value_t = DEFAULT_TOP_N)]
    pub top: usize,

    /// Number of recent records to show.
    #[arg(long, default_value_t = DEFAULT_DASHBOARD_RECENT)]
    pub recent: usize,

    /// Write a report to this path when monitoring ends.
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Capture snap length in bytes.
    #[arg(long, default_value_t = DEFAULT_SNAPLEN)]
    pub snaplen: i32,

    /// Capture poll timeout in milliseconds; bounds how long stop takes.
    #[arg(long, default_value_t = DEFAULT_POLL_TIMEOUT_MS)]
    pub poll_timeout_ms: i32,
}

impl MonitorArgs {
    /// Validate the arguments.
    pub fn validate(&self) -> Result<(), CliError> {
        if self.refresh_sec == 0 {
            return Err(CliError::InvalidRefreshSec(self.refresh_sec));
        }
        if let Some(0) = self.duration_sec {
            return Err(CliError::InvalidDurationSec(0));
        }
        check_window(self.window_sec)?;
        check_limit("top", self.top)?;
        check_limit("recent", self.recent)?;
        if !(64..=262_144).contains(&self.snaplen) {
            return Err(CliError::InvalidSnaplen(self.snaplen));
        }
        if self.poll_timeout_ms < 1 {
            return Err(CliError::InvalidPollTimeout(self.poll_timeout_ms));
        }
        Ok(())
    }
}

/// Arguments for the stats command.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct StatsArgs {
    /// Trailing window in seconds.
    #[arg(long, default_value_t = DEFAULT_WINDOW_SECS)]
    pub window_sec: u64,

    /// Number of top source addresses.
    #[arg(long, default_value_t = DEFAULT_TOP_N)]
    pub top: usize,

    /// Number of recent records.
    #[arg(long, default_value_t = DEFAULT_DASHBOARD_RECENT)]
    pub recent: usize,

    /// Print JSON instead of text.
    #[arg(long)]
    pub json: bool,
}

impl StatsArgs {
    /// Validate the arguments.
    pub fn validate(&self) -> Result<(), CliError> {
        check_window(self.window_sec)?;
        check_limit("top", self.top)?;
        check_limit("recent", self.recent)
    }
}

/// Arguments for the logs command.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct LogsArgs {
    /// Number of records to print.
    #[arg(short = 'n', long, default_value_t = DEFAULT_LOGS_LIMIT)]
    pub limit: usize,

    /// Print one JSON object per line.
    #[arg(long)]
    pub json: bool,
}

impl LogsArgs {
    /// Validate the arguments.
    pub fn validate(&self) -> Result<(), CliError> {
        check_limit("limit", self.limit)
    }
}

/// Arguments for the export command.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct ExportArgs {
    /// Report destination (required).
    #[arg(short, long = "out")]
    pub out: PathBuf,

    /// Number of source addresses in the chart.
    #[arg(long, default_value_t = DEFAULT_TOP_N)]
    pub top: usize,

    /// Number of recent records in the report table.
    #[arg(long, default_value_t = DEFAULT_REPORT_RECENT)]
    pub recent: usize,
}

impl ExportArgs {
    /// Validate the arguments.
    pub fn validate(&self) -> Result<(), CliError> {
        check_limit("top", self.top)?;
        check_limit("recent", self.recent)
    }
}

/// Arguments for the clear command.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct ClearArgs {
    /// Confirm deletion of every record.
    #[arg(long)]
    pub yes: bool,
}

/// Arguments for the query command.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct QueryArgs {
    /// A single read-only SQL statement.
    pub sql: String,

    /// Print one JSON object per row.
    #[arg(long)]
    pub json: bool,
}

impl QueryArgs {
    /// Validate the arguments.
    pub fn validate(&self) -> Result<(), CliError> {
        if self.sql.trim().is_empty() {
            return Err(CliError::EmptyQuery);
        }
        Ok(())
    }
}

/// Parse CLI arguments from an iterator of strings.
/// Useful for testing.
pub fn parse_from<I, T>(iter: I) -> Result<Cli, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    Cli::try_parse_from(iter)
}

/// Get the default network interface (the one with the default route).
/// Returns None if no default interface can be determined.
pub fn default_interface() -> Option<String> {
    let route_content = std::fs::read_to_string("/proc/net/route").ok()?;
    parse_route_table(&route_content)
}

/// Parse /proc/net/route content to find the default interface.
pub fn parse_route_table(content: &str) -> Option<String> {
    content.lines().skip(1).find_map(|line| {
        let mut fields = line.split_whitespace();
        let iface = fields.next()?;
        // Default route has destination 00000000
        (fields.next()? == "00000000").then(|| iface.to_string())
    })
}

/// Resolve the interface to use: explicit argument or auto-detected default.
pub fn resolve_interface(explicit: Option<&str>) -> Option<String> {
    explicit.map(String::from).or_else(default_interface)
}
