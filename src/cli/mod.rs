//! CLI module for the ecs-ship deployment tool.
//!
//! This module provides the command-line interface and the console
//! presentation of deployment progress.

mod commands;
mod output;

pub use commands::{Cli, OutputFormat};
pub use output::ConsoleReporter;
