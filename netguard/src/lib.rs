//! NetGuard pipeline and CLI.
//!
//! The capture engine, its lifecycle controller, the periodic dashboard
//! consumer and the command-line surface. Storage, aggregation, capture
//! sources and reporting live in the sibling `netguard-*` crates.

pub mod cli;
pub mod commands;
pub mod config;
pub mod engine;
pub mod exit;
pub mod lifecycle;
pub mod logger;
pub mod poller;
pub mod render;
pub mod signal;
pub mod sleeper;

pub use cli::{
    default_interface, parse_from, parse_route_table, resolve_interface, ClearArgs, Cli, CliError,
    Command, ExportArgs, LogsArgs, MonitorArgs, QueryArgs, StatsArgs, StoreArgs,
};
pub use commands::{
    execute_clear, execute_export, execute_logs, execute_monitor, execute_query, execute_stats,
    CommandError, CommandResult, MonitorResult,
};
pub use config::{resolve, resolve_logged, ConfigError};
pub use engine::{run as run_engine, EngineReport, MAX_CONSECUTIVE_READ_ERRORS};
pub use lifecycle::{CaptureController, LifecycleError, SessionState, StartOutcome, StopOutcome};
pub use logger::{init_tracing, Level, LogEntry, Logger, MockLogger, NullLogger, TracingLogger, Verbosity};
pub use poller::{PollerConfig, PollerReport, DEFAULT_REFRESH_SEC};
pub use signal::{AlwaysShutdown, NeverShutdown, ShutdownCheck, ShutdownFlag};
pub use sleeper::{MockSleeper, RealSleeper, Sleeper};
