//! Query command: run one read-only SQL statement.

use std::io::Write;

use netguard_store::RecordReader;
use serde_json::{Map, Value};

use crate::cli::QueryArgs;
use crate::render;

use super::CommandResult;

/// Execute the query command. Returns the number of rows printed.
pub fn execute_query<R, W>(args: &QueryArgs, reader: &R, out: &mut W) -> CommandResult<usize>
where
    R: RecordReader + ?Sized,
    W: Write,
{
    args.validate()?;
    let rows = reader.query(&args.sql)?;

    if args.json {
        for row in &rows.rows {
            let object: Map<String, Value> = rows
                .columns
                .iter()
                .cloned()
                .zip(row.iter().map(|cell| serde_json::to_value(cell).unwrap_or(Value::Null)))
                .collect();
            writeln!(out, "{}", Value::Object(object))?;
        }
    } else {
        render::write_query_rows(out, &rows)?;
    }

    Ok(rows.rows.len())
}
