//! regsim - closed-loop simulation of the power converter regulation manager
//!
//! Loads a run description from YAML, optionally arms a reference function
//! and drives the manager against its simulated voltage source and load.

#![deny(static_mut_refs)]
#![deny(unused_must_use)]
#![deny(clippy::unwrap_used)]

mod error;
mod output;
mod run;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::SimError;
use crate::run::{RunConfig, Summary};

#[derive(Parser, Debug)]
#[command(name = "regsim")]
#[command(about = "Simulate the power converter regulation manager in closed loop")]
#[command(version)]
struct Cli {
    /// Run description (YAML)
    #[arg(short, long, env = "REGSIM_CONFIG")]
    config: PathBuf,

    /// Function to play, overriding the run description
    #[arg(short, long)]
    function: Option<String>,

    /// Iterations to simulate, overriding the run description
    #[arg(short = 'n', long)]
    iterations: Option<u32>,

    /// Output in JSON format for machine parsing
    #[arg(long)]
    json: bool,

    /// Verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("regsim={log_level},powerconv={log_level}").into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    match execute(&cli) {
        Ok(summary) => output::print_summary(&summary, cli.json),
        Err(e) => {
            let exit_code = e.downcast_ref::<SimError>().map_or(1, SimError::exit_code);
            if cli.json {
                output::print_error_json(&e, exit_code);
            } else {
                output::print_error_human(&e);
            }
            std::process::exit(exit_code);
        }
    }
}

fn execute(cli: &Cli) -> Result<Summary> {
    let mut config = RunConfig::load(&cli.config)?;
    if let Some(function) = &cli.function {
        config.function = Some(function.clone());
    }
    if let Some(iterations) = cli.iterations {
        config.iterations = iterations;
    }
    let summary = run::run(&config).with_context(|| {
        format!(
            "{} run of {} iterations failed",
            config.mode,
            config.iterations
        )
    })?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn parse_defaults() -> TestResult {
        let cli = Cli::try_parse_from(["regsim", "--config", "run.yaml"])?;
        assert_eq!(cli.config, PathBuf::from("run.yaml"));
        assert!(cli.function.is_none());
        assert!(cli.iterations.is_none());
        assert!(!cli.json);
        assert_eq!(cli.verbose, 0);
        Ok(())
    }

    #[test]
    fn parse_overrides_and_verbosity() -> TestResult {
        let cli = Cli::try_parse_from(["regsim", "-c", "run.yaml", "-f", "SINE", "-n", "500", "--json", "-vv"])?;
        assert_eq!(cli.function.as_deref(), Some("SINE"));
        assert_eq!(cli.iterations, Some(500));
        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
        Ok(())
    }

    #[test]
    fn parse_requires_config() {
        assert!(Cli::try_parse_from(["regsim"]).is_err());
    }
}
