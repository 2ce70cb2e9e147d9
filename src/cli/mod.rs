//! CLI module for the canopy tool.
//!
//! This module provides the command-line interface for validating,
//! planning and applying stack files.

mod commands;
mod output;

pub use commands::{Cli, Commands, OutputFormat, StateCommands};
pub use output::OutputFormatter;
