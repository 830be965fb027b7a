//! Command-line interface
//!
//! Argument parsing and the handlers behind each subcommand.

pub mod commands;
pub mod handlers;

pub use commands::{Command, Opt};
pub use handlers::run_command;
