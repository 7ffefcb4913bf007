//! JSON I/O handling for CLI
//!
//! - Input: single JSON object on one stdin line
//! - Output: single JSON object on stdout
//! - UTF-8 only

use std::io::{self, BufRead, Write};

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::errors::{CliError, CliResult};

/// Read one JSON request line from stdin
pub fn read_request<T: DeserializeOwned>() -> CliResult<T> {
    let stdin = io::stdin();
    let mut line = String::new();

    stdin.lock().read_line(&mut line)?;
    parse_request(&line)
}

fn parse_request<T: DeserializeOwned>(line: &str) -> CliResult<T> {
    if line.trim().is_empty() {
        return Err(CliError::io_error("Empty input"));
    }
    serde_json::from_str(line)
        .map_err(|e| CliError::invalid_request(format!("Invalid request JSON: {}", e)))
}

/// The `{"status":"ok","data":..}` envelope
pub fn ok_envelope(data: Value) -> Value {
    serde_json::json!({
        "status": "ok",
        "data": data
    })
}

/// The `{"status":"error","code":..,"message":..}` envelope
pub fn error_envelope(code: &str, message: &str) -> Value {
    serde_json::json!({
        "status": "error",
        "code": code,
        "message": message
    })
}

fn write_line(value: &Value) -> CliResult<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, value)?;
    writeln!(stdout)?;
    stdout.flush()?;
    Ok(())
}

/// Write a success response to stdout
pub fn write_response(data: Value) -> CliResult<()> {
    write_line(&ok_envelope(data))
}

/// Write an error response to stdout
pub fn write_error(code: &str, message: &str) -> CliResult<()> {
    write_line(&error_envelope(code, message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::errors::CliErrorCode;
    use crate::planner::QueryDescription;

    #[test]
    fn test_parse_request() {
        let query: QueryDescription =
            parse_request(r#"{"from": [{"table": "people"}], "limit": 2}"#).unwrap();
        assert_eq!(query.limit, Some(2));

        let err = parse_request::<QueryDescription>("{oops").unwrap_err();
        assert_eq!(err.code(), &CliErrorCode::InvalidRequest);

        let err = parse_request::<QueryDescription>("  \n").unwrap_err();
        assert_eq!(err.code(), &CliErrorCode::IoError);
    }

    #[test]
    fn test_envelopes() {
        let ok = ok_envelope(serde_json::json!({"tables": []}));
        assert_eq!(ok["status"], "ok");

        let err = error_envelope("SHEETS_TABLE_NOT_FOUND", "Table 'x' not found");
        assert_eq!(err["status"], "error");
        assert_eq!(err["code"], "SHEETS_TABLE_NOT_FOUND");
    }
}
