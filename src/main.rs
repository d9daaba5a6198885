use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use status_watch::{console, Cli, CheckOutcome, MonitorConfig};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let ansi = console::prepare_stdout();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cli.log_level.as_str().to_lowercase())),
        )
        .with_ansi(ansi)
        .init();

    match execute(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn execute(cli: Cli) -> Result<()> {
    let config = MonitorConfig::from_command(cli.command).context("Invalid arguments")?;

    let outcome = status_watch::run(&config)
        .await
        .with_context(|| format!("Status check for {} failed", config.target))?;

    match outcome {
        CheckOutcome::Unchanged(status) => info!("{} is still {}", config.target, status),
        CheckOutcome::Changed {
            previous, current, ..
        } => info!("{} went {} -> {}", config.target, previous, current),
    }
    Ok(())
}
