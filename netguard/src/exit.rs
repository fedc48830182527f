//! Exit codes for the NetGuard CLI.
//!
//! Following Unix conventions for exit codes.

use crate::commands::CommandError;

/// Exit code constants.
pub mod codes {
    /// Successful execution.
    pub const SUCCESS: i32 = 0;
    /// Invalid arguments.
    pub const INVALID_ARGS: i32 = 1;
    /// IO error.
    pub const IO_ERROR: i32 = 2;
    /// Capture could not start.
    pub const START_FAILURE: i32 = 3;
    /// Store unreachable.
    pub const STORE_ERROR: i32 = 4;
    /// Query failed.
    pub const QUERY_ERROR: i32 = 5;
    /// Report export failed.
    pub const EXPORT_ERROR: i32 = 6;
    /// Destructive command run without confirmation.
    pub const CONFIRMATION_REQUIRED: i32 = 7;
    /// Interrupted by signal (128 + signal number).
    pub const SIGINT: i32 = 130;
}

/// Map a CommandError to an exit code.
pub fn exit_code(error: &CommandError) -> i32 {
    match error {
        CommandError::InvalidArgument(_) => codes::INVALID_ARGS,
        CommandError::Io(_) => codes::IO_ERROR,
        CommandError::Start(_) | CommandError::CaptureUnavailable => codes::START_FAILURE,
        CommandError::Store(_) => codes::STORE_ERROR,
        CommandError::Query(_) => codes::QUERY_ERROR,
        CommandError::Export(_) => codes::EXPORT_ERROR,
        CommandError::ConfirmationRequired => codes::CONFIRMATION_REQUIRED,
    }
}
