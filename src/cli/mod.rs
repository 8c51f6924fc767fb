//! CLI module for aeroquery
//!
//! Provides operator tooling for:
//! - check-config: Load a policy file and report what it whitelists
//! - validate: Validate a query read from stdin
//! - run: Execute a query from stdin against a JSON data file

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{check_config, projection_registry, run, run_command, run_query, validate};
pub use errors::{CliError, CliResult};
pub use io::{read_query, write_response};
