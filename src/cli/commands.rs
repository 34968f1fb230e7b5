//! CLI argument definitions.
//!
//! This module defines the command line using clap.

use clap::Parser;
use std::time::Duration;

use crate::config::{TaskPatch, STDIN_SOURCE};
use crate::deployer::DeployRequest;
use crate::ecs::DEFAULT_FAILURE_MARKER;

/// ecs-ship - Deploy your AWS ECS services.
#[derive(Parser, Debug)]
#[command(name = "ecs-ship")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Cluster the service runs in.
    pub cluster: String,

    /// Service to update.
    pub service: String,

    /// File describing the service updates (`-` reads standard input).
    #[arg(short, long, value_name = "FILE", default_value = STDIN_SOURCE, env = "ECS_SHIP_UPDATES")]
    pub updates: String,

    /// Wait this long for the service to be correctly updated.
    #[arg(
        short,
        long,
        value_name = "DURATION",
        default_value = "5m",
        env = "ECS_SHIP_TIMEOUT",
        value_parser = humantime::parse_duration
    )]
    pub timeout: Duration,

    /// Disable colored output.
    #[arg(short, long)]
    pub no_color: bool,

    /// Don't wait for the updates to be completed.
    #[arg(short = 'w', long)]
    pub no_wait: bool,

    /// Don't deploy, just show what would change in the remote service.
    #[arg(short, long)]
    pub dry: bool,

    /// Time between two health checks while waiting.
    #[arg(
        long,
        value_name = "DURATION",
        default_value = "5s",
        value_parser = humantime::parse_duration
    )]
    pub poll_interval: Duration,

    /// Service events containing this text are reported as errors.
    #[arg(long, value_name = "TEXT", default_value = DEFAULT_FAILURE_MARKER)]
    pub failure_marker: String,

    /// AWS region (defaults to the environment's configuration).
    #[arg(long, env = "AWS_REGION")]
    pub region: Option<String>,

    /// Enable verbose output.
    #[arg(short, long)]
    pub verbose: bool,

    /// Output format (text, json, log).
    #[arg(long, default_value = "text")]
    pub output: OutputFormat,
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
    /// Progress as log records, without dots or colors.
    Log,
}

impl Cli {
    /// Parses CLI arguments from the command line.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Builds the deployment request for `patch`.
    #[must_use]
    pub fn deploy_request(&self, patch: TaskPatch) -> DeployRequest {
        DeployRequest::new(&self.cluster, &self.service, patch)
            .with_timeout(self.timeout)
            .with_dry_run(self.dry)
            .with_no_wait(self.no_wait)
    }
}
