//! Logs command: most recent records, newest first.

use std::io::Write;

use netguard_stats::recent;
use netguard_store::RecordReader;

use crate::cli::LogsArgs;
use crate::render;

use super::CommandResult;

/// Execute the logs command. Returns the number of records printed.
pub fn execute_logs<R, W>(args: &LogsArgs, reader: &R, out: &mut W) -> CommandResult<usize>
where
    R: RecordReader + ?Sized,
    W: Write,
{
    args.validate()?;
    let records = recent(reader, args.limit)?;

    if args.json {
        for record in &records {
            writeln!(out, "{}", record.to_json())?;
        }
    } else {
        render::write_records(out, &records)?;
    }

    Ok(records.len())
}
