//! CLI module
//!
//! This module provides the command-line interface for dbmeta:
//! argument parsing and command handlers.

pub mod commands;

// Re-exports
pub use commands::{handle_command, Command, CommandType};
