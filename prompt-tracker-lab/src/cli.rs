use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand, ValueEnum};
use prompt_tracker_core::ApiTarget;

/// Evaluate LLM responses and conversations from the command line
#[derive(Debug, Parser)]
#[command(name = "prompt-tracker", version, about)]
pub struct Cli {
    /// Tracker config file (defaults to config/default and config/local)
    #[arg(short, long, global = true, env = "PROMPT_TRACKER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, Default, ValueEnum, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// Pretty-printed JSON
    Json,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Normalize a raw provider payload and run evaluators against it
    Evaluate {
        /// Provider that produced the payload (openai, anthropic, google)
        #[arg(short, long)]
        provider: String,

        /// API the payload came from (chat_completions, responses, assistants, messages)
        #[arg(short, long)]
        api: String,

        /// Raw provider JSON: a single response or a conversation
        #[arg(short, long)]
        input: PathBuf,

        /// JSON array of evaluator configs
        #[arg(short, long)]
        evaluators: PathBuf,

        /// Exit with an error when any evaluator fails or does not pass
        #[arg(long)]
        strict: bool,
    },

    /// List evaluators, optionally only those compatible with an API
    Evaluators {
        /// Provider to filter by
        #[arg(short, long, requires = "api")]
        provider: Option<String>,

        /// API to filter by
        #[arg(short, long, requires = "provider")]
        api: Option<String>,
    },

    /// Show built-in tools, features and playground panels for an API
    Capabilities {
        /// Provider (openai, anthropic, google)
        #[arg(short, long)]
        provider: String,

        /// API (chat_completions, responses, assistants, messages)
        #[arg(short, long)]
        api: String,
    },
}

pub fn parse_target(provider: &str, api: &str) -> Result<ApiTarget> {
    ApiTarget::parse(provider, api).ok_or_else(|| anyhow!("unknown provider/api: {}/{}", provider, api))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_evaluate() {
        let cli = Cli::try_parse_from([
            "prompt-tracker",
            "evaluate",
            "-p",
            "openai",
            "-a",
            "responses",
            "-i",
            "payload.json",
            "-e",
            "evaluators.json",
            "--output",
            "json",
        ])
        .unwrap();

        assert_eq!(cli.output, OutputFormat::Json);
        assert!(matches!(cli.command, Command::Evaluate { strict: false, .. }));
    }

    #[test]
    fn test_evaluators_filter_needs_both_sides() {
        assert!(Cli::try_parse_from(["prompt-tracker", "evaluators", "-p", "openai"]).is_err());
    }

    #[test]
    fn test_parse_target() {
        assert_eq!(parse_target("OpenAI", "assistants").unwrap(), ApiTarget::OPENAI_ASSISTANTS);
        assert!(parse_target("cohere", "chat").is_err());
    }
}
