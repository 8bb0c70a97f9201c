//! Command-line front end for schema-constrained HTML extraction.
//!
//! The binary `webai-extract` wires the extractor to a local model command
//! discovered on the host. Everything except argument parsing and process
//! setup lives here so it can be tested without spawning the binary.

/// Command-line arguments.
pub mod args;
/// Subcommand implementations.
pub mod commands;
/// Error types for the front end.
pub mod errors;

pub use args::{Cli, Commands};
pub use errors::CliError;
