//! CLI entry point for the uploader tool.

use std::io::IsTerminal;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, error, info};
use uploader_core::{Pipeline, RunOutcome, SystemClock};

mod cli;

use cli::Args;

/// How the process ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProcessExit {
    /// A job was published, or there was nothing to do.
    Success,
    /// A fatal error stopped the run.
    Failure,
    /// Credentials were not supplied.
    MissingCredentials,
}

impl ProcessExit {
    fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Failure => 1,
            Self::MissingCredentials => 2,
        }
    }
}

impl From<ProcessExit> for ExitCode {
    fn from(exit: ProcessExit) -> Self {
        ExitCode::from(exit.code())
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_env_filter(filter)
        .init();

    match run(&args).await {
        Ok(exit) => exit.into(),
        Err(e) => {
            error!("{e:#}");
            ProcessExit::Failure.into()
        }
    }
}

async fn run(args: &Args) -> Result<ProcessExit> {
    let config = args.pipeline_config();
    debug!(?config, "configuration resolved");
    config.validate()?;

    let credentials = match args.credentials() {
        Ok(credentials) => credentials,
        Err(e) => {
            error!("{e}");
            return Ok(ProcessExit::MissingCredentials);
        }
    };

    info!(store = %config.store_path.display(), "Uploader starting");
    let pipeline = Pipeline::with_credentials(config, credentials, Arc::new(SystemClock))
        .context("failed to build HTTP clients")?;

    match pipeline.run_once().await? {
        RunOutcome::NothingToDo => {}
        RunOutcome::Published {
            position,
            external_id,
            state,
        } => {
            info!(position, external_id = %external_id, state = %state, "Run complete");
        }
    }
    Ok(ProcessExit::Success)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(ProcessExit::Success.code(), 0);
        assert_eq!(ProcessExit::Failure.code(), 1);
        assert_eq!(ProcessExit::MissingCredentials.code(), 2);
    }
}
