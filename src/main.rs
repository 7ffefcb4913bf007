//! sheetsdb CLI entry point
//!
//! Installs logging, then delegates everything to `cli::run`.
//! Exits non-zero on failure.

use sheetsdb::{cli, observability};

fn main() {
    observability::init_logging("warn");

    if let Err(e) = cli::run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
