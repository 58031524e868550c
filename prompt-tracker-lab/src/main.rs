use anyhow::{Context as _, Result};
use clap::Parser;
use prompt_tracker_core::TrackerConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod commands;

use cli::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => TrackerConfig::from_file(path),
        None => TrackerConfig::load(),
    }
    .context("Failed to load tracker configuration")?;

    // Logs go to stderr so JSON output stays clean.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("prompt_tracker={}", config.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::debug!("Judge mode: {:?}", config.judge_mode());

    match cli.command {
        Command::Evaluate {
            provider,
            api,
            input,
            evaluators,
            strict,
        } => {
            commands::evaluate(&config, &provider, &api, &input, &evaluators, strict, cli.output).await
        }
        Command::Evaluators { provider, api } => {
            commands::list_evaluators(provider.as_deref(), api.as_deref(), cli.output)
        }
        Command::Capabilities { provider, api } => commands::show_capabilities(&provider, &api, cli.output),
    }
}
