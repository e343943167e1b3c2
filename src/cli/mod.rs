//! CLI module for the gallery ingest tool
//!
//! This module contains all command-line interface related code including
//! argument parsing, command handlers, and the interactive duplicate prompt.
//!
//! # Submodules
//!
//! - `args` - Command-line argument definitions using clap
//! - `commands` - Command handler implementations
//! - `prompt` - Interactive duplicate resolution prompt

pub mod args;
pub mod commands;
pub mod prompt;

// Re-export commonly used types for convenience
pub use args::{Args, Commands};
pub use commands::run_command;
pub use prompt::CliPrompt;
