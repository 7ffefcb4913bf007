//! CLI argument definitions using clap
//!
//! Commands:
//! - sheetsdb query --config <path>
//! - sheetsdb tables --config <path>
//! - sheetsdb describe --config <path> --table <name>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// sheetsdb - relational queries over spreadsheet pages
#[derive(Parser, Debug)]
#[command(name = "sheetsdb")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Read one query description from stdin, execute it and exit
    Query {
        /// Path to configuration file
        #[arg(long, default_value = "./sheetsdb.json")]
        config: PathBuf,
    },

    /// List the tables of the configured source
    Tables {
        /// Path to configuration file
        #[arg(long, default_value = "./sheetsdb.json")]
        config: PathBuf,
    },

    /// Show the field names of one table
    Describe {
        /// Path to configuration file
        #[arg(long, default_value = "./sheetsdb.json")]
        config: PathBuf,

        /// Table name (case-insensitive)
        #[arg(long)]
        table: String,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
