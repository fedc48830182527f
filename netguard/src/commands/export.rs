//! Export command: write the HTML report.

use netguard_clock::Clock;
use netguard_report::{export, ExportOptions, ExportSummary};
use netguard_store::RecordReader;

use crate::cli::ExportArgs;
use crate::logger::Logger;

use super::CommandResult;

/// Execute the export command.
pub fn execute_export<R, C, L>(
    args: &ExportArgs,
    reader: &R,
    clock: &C,
    logger: &L,
) -> CommandResult<ExportSummary>
where
    R: RecordReader + ?Sized,
    C: Clock + ?Sized,
    L: Logger + ?Sized,
{
    args.validate()?;
    let options = ExportOptions {
        top_n: args.top,
        recent_n: args.recent,
    };

    match export(reader, clock, &args.out, &options) {
        Ok(summary) => {
            logger.info(&format!(
                "report written to {} ({} records, {} pages)",
                summary.path.display(),
                summary.records,
                summary.pages
            ));
            Ok(summary)
        }
        Err(e) => {
            logger.error(&format!("export to {} failed: {}", args.out.display(), e));
            Err(e.into())
        }
    }
}
