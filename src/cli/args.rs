//! CLI argument definitions using clap
//!
//! Commands:
//! - aeroquery check-config --config <path> [--data <path>]
//! - aeroquery validate --config <path>
//! - aeroquery run --config <path> --data <path> [--audit-log <path>]

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// aeroquery - Whitelisted, projection-first query execution
#[derive(Parser, Debug)]
#[command(name = "aeroquery")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load a policy file and print its entities and limits
    CheckConfig {
        /// Path to the policy file
        #[arg(long, default_value = "./aeroquery.json")]
        config: PathBuf,

        /// Data file to cross-check the policy against
        #[arg(long)]
        data: Option<PathBuf>,
    },

    /// Validate a query read from stdin without executing it
    Validate {
        /// Path to the policy file
        #[arg(long, default_value = "./aeroquery.json")]
        config: PathBuf,
    },

    /// Execute a query read from stdin and print one page
    Run {
        /// Path to the policy file
        #[arg(long, default_value = "./aeroquery.json")]
        config: PathBuf,

        /// JSON data file loaded into memory
        #[arg(long)]
        data: PathBuf,

        /// Append audit records to this file
        #[arg(long)]
        audit_log: Option<PathBuf>,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
