//! Command orchestration for CLI subcommands.
//!
//! Provides execute functions for:
//! - `monitor` - capture with a refreshing dashboard
//! - `stats` - one-shot aggregate views
//! - `logs` - most recent records
//! - `export` - HTML report
//! - `clear` - delete all records
//! - `query` - read-only SQL

pub mod clear;
pub mod export;
pub mod logs;
pub mod monitor;
pub mod query;
pub mod stats;

pub use clear::execute_clear;
pub use export::execute_export;
pub use logs::execute_logs;
pub use monitor::{execute_monitor, MonitorResult};
pub use query::execute_query;
pub use stats::execute_stats;

use std::io;

use netguard_report::ExportError;
use netguard_stats::QueryError;
use netguard_store::SinkError;
use thiserror::Error;

use crate::cli::CliError;
use crate::lifecycle::LifecycleError;

/// Errors from command execution.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("invalid argument: {0}")]
    InvalidArgument(#[from] CliError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("{0}")]
    Start(#[from] LifecycleError),

    #[error("store error: {0}")]
    Store(#[source] SinkError),

    #[error("query error: {0}")]
    Query(#[from] QueryError),

    #[error("export error: {0}")]
    Export(#[from] ExportError),

    #[error("refusing to delete every record without --yes")]
    ConfirmationRequired,

    #[error("live capture is not available in this build (rebuild with --features pcap)")]
    CaptureUnavailable,
}

impl From<SinkError> for CommandError {
    /// Connection failures are store errors; everything else happened while
    /// running a query against a working store.
    fn from(e: SinkError) -> Self {
        match e {
            SinkError::Connection { .. } => CommandError::Store(e),
            other => CommandError::Query(QueryError::Sink(other)),
        }
    }
}

/// Result of command execution.
pub type CommandResult<T> = Result<T, CommandError>;
