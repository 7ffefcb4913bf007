//! CLI module for sheetsdb
//!
//! Provides command-line interface for:
//! - query: One-shot query execution (description on stdin)
//! - tables: List table names
//! - describe: Show one table's fields

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{build_cache, describe, query, run_command, tables, CliCache, Config};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{error_envelope, ok_envelope, read_request, write_error, write_response};

/// Parses arguments, runs the command and reports failures as a JSON
/// error envelope on stdout.
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    run_command(cli.command).map_err(|e| {
        // Best effort: the error is also returned to the caller
        let _ = write_error(e.code_str(), e.message());
        e
    })
}
