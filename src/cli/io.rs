//! JSON I/O handling for CLI
//!
//! - Input: one query document via stdin
//! - Output: one JSON object via stdout
//! - UTF-8 only

use std::io::{self, Read, Write};

use serde_json::Value;

use crate::query::AbstractQuery;

use super::errors::{CliError, CliResult};

/// Read a query document from stdin
pub fn read_query() -> CliResult<AbstractQuery> {
    read_query_from(io::stdin().lock())
}

pub(crate) fn read_query_from(mut reader: impl Read) -> CliResult<AbstractQuery> {
    let mut input = String::new();
    reader.read_to_string(&mut input)?;

    if input.trim().is_empty() {
        return Err(CliError::InvalidQuery("empty input".to_string()));
    }

    AbstractQuery::from_json(&input).map_err(|e| CliError::InvalidQuery(e.to_string()))
}

/// Write a success response to stdout
pub fn write_response(data: Value) -> CliResult<()> {
    let response = serde_json::json!({
        "status": "ok",
        "data": data
    });
    write_line(&response)
}

fn write_line(value: &Value) -> CliResult<()> {
    let mut stdout = io::stdout();
    serde_json::to_writer(&mut stdout, value)?;
    writeln!(stdout)?;
    stdout.flush()?;
    Ok(())
}
