//! ecs-ship CLI entrypoint.
//!
//! This is the main entrypoint for the ecs-ship command-line tool.

use std::process::ExitCode;

use ecs_ship::cli::{Cli, ConsoleReporter, OutputFormat};
use ecs_ship::config::{PatchParser, PatchValidator, TaskPatch};
use ecs_ship::deployer::{DeployOutcome, Deployer};
use ecs_ship::ecs::{AwsEcsClient, MarkerMatcher};
use ecs_ship::error::Result;
use ecs_ship::progress::{ProgressReporter, TracingReporter};

use colored::Colorize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

/// Exit code when the updates payload cannot be used.
const EXIT_BAD_PAYLOAD: u8 = 3;

/// Exit code when interrupted.
const EXIT_INTERRUPTED: u8 = 130;

/// Main entrypoint.
fn main() -> ExitCode {
    let parser = PatchParser::new();

    // Before parsing, so .env can provide defaults for the flags
    let dotenv = parser.load_dotenv();

    let cli = Cli::parse_args();

    init_logging(cli.verbose, cli.output);

    if cli.no_color {
        colored::control::set_override(false);
    }

    if let Err(e) = dotenv {
        warn!("{e}");
    }

    let patch = match load_patch(&parser, &cli.updates) {
        Ok(patch) => patch,
        Err(e) => {
            eprintln!("{}", format!("Unable to read input file: {e}").red());
            return ExitCode::from(EXIT_BAD_PAYLOAD);
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(&cli, patch)) {
        Ok(outcome) => {
            debug!("Deployment finished: {outcome:?}");
            ExitCode::SUCCESS
        }
        Err(e) if e.is_cancelled() => {
            eprintln!("{}", "Interrupted".red());
            ExitCode::from(EXIT_INTERRUPTED)
        }
        Err(e) => {
            eprintln!("{}", e.to_string().red());
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
fn init_logging(verbose: bool, output: OutputFormat) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match output {
        OutputFormat::Json => builder.json().init(),
        OutputFormat::Text | OutputFormat::Log => builder.init(),
    }
}

/// Reads and validates the updates payload.
fn load_patch(parser: &PatchParser, source: &str) -> Result<TaskPatch> {
    let patch = parser.load(source)?;
    PatchValidator::new().validate(&patch)?;
    Ok(patch)
}

/// Main async entry point.
async fn run(cli: &Cli, patch: TaskPatch) -> Result<DeployOutcome> {
    let client = AwsEcsClient::new(cli.region.as_deref()).await;
    let matcher = MarkerMatcher::new(&cli.failure_marker);
    let reporter: Box<dyn ProgressReporter> = match cli.output {
        OutputFormat::Log => Box::new(TracingReporter),
        format => Box::new(ConsoleReporter::stderr(format)),
    };

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping the wait (press ctrl-c again to exit now)");
            trigger.cancel();
        }
        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(i32::from(EXIT_INTERRUPTED));
        }
    });

    let deployer = Deployer::new(&client, &matcher, reporter.as_ref())
        .with_poll_interval(cli.poll_interval);

    deployer.deploy(&cli.deploy_request(patch), &cancel).await
}
