//! Clear command: delete every record.
//!
//! The sink itself never asks; the confirmation lives here.

use netguard_store::Sink;

use crate::cli::ClearArgs;
use crate::logger::Logger;

use super::{CommandError, CommandResult};

/// Execute the clear command. Returns the number of records deleted.
pub fn execute_clear<K, L>(args: &ClearArgs, sink: &mut K, logger: &L) -> CommandResult<u64>
where
    K: Sink + ?Sized,
    L: Logger + ?Sized,
{
    if !args.yes {
        return Err(CommandError::ConfirmationRequired);
    }
    let deleted = sink.clear()?;
    logger.info(&format!("deleted {} records", deleted));
    Ok(deleted)
}
