//! Headless structure simulation runner.
//!
//! This binary runs a scenario without graphics and prints a JSON summary.
//! Designed for CI testing and determinism checks.
//!
//! # Usage
//!
//! ```bash
//! # Run the built-in scenario
//! cargo run -p outpost_headless -- run
//!
//! # Run a scenario file for two minutes of game time
//! cargo run -p outpost_headless -- run --scenario wall_line.ron --seconds 120
//!
//! # Validate a scenario file
//! cargo run -p outpost_headless -- validate --scenario wall_line.ron
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use outpost_headless::{run_scenario, Scenario, ScenarioError};

#[derive(Parser)]
#[command(name = "outpost_headless")]
#[command(about = "Headless structure simulation runner for testing and CI")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scenario and print the summary
    Run {
        /// Scenario file to load (built-in skirmish when absent)
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Simulated seconds to run
        #[arg(long, default_value = "60")]
        seconds: u32,

        /// Print compact JSON
        #[arg(long)]
        compact: bool,
    },

    /// Load and check a scenario without running it
    Validate {
        /// Scenario file to check
        #[arg(short, long)]
        scenario: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries the JSON summary.
    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(filter)
        .init();

    let result = match cli.command {
        Commands::Run {
            scenario,
            seconds,
            compact,
        } => cmd_run(scenario, seconds, compact),
        Commands::Validate { scenario } => cmd_validate(&scenario),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "headless run failed");
            ExitCode::FAILURE
        }
    }
}

fn load(path: Option<PathBuf>) -> Result<Scenario, ScenarioError> {
    match path {
        Some(path) => Scenario::load(path),
        None => Ok(Scenario::default()),
    }
}

fn cmd_run(path: Option<PathBuf>, seconds: u32, compact: bool) -> Result<(), ScenarioError> {
    let scenario = load(path)?;
    let summary = run_scenario(scenario, seconds)?;

    let json = if compact {
        serde_json::to_string(&summary)
    } else {
        serde_json::to_string_pretty(&summary)
    };
    match json {
        Ok(json) => println!("{json}"),
        Err(err) => error!(%err, "failed to encode summary"),
    }
    Ok(())
}

fn cmd_validate(path: &Path) -> Result<(), ScenarioError> {
    let scenario = Scenario::load(path)?;
    let blueprints = scenario.validate()?;
    println!(
        "{}: {} blueprints, {} placements, {} attacks",
        scenario.name,
        blueprints.len(),
        scenario.placements.len(),
        scenario.attacks.len()
    );
    Ok(())
}
