//! The `webai-extract` binary.

use anyhow::Context;
use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use webai_extractor::extraction::ExtractionResult;
use webai_extractor_cli::commands::{model_client, run_extract, run_schema, run_text};
use webai_extractor_cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays machine-readable.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Extract(args) => {
            let result = run_extract(&args, || model_client(&args)).await?;
            println!(
                "{}",
                serde_json::to_string_pretty(&result).context("Failed to serialize result")?
            );
            Ok(match result {
                ExtractionResult::Success { .. } => ExitCode::SUCCESS,
                ExtractionResult::Failure { .. } => ExitCode::FAILURE,
            })
        }
        Commands::Text(args) => {
            println!("{}", run_text(&args)?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Schema(args) => {
            let out = run_schema(&args)?;
            println!(
                "{}",
                serde_json::to_string_pretty(&out).context("Failed to serialize schema")?
            );
            Ok(ExitCode::SUCCESS)
        }
    }
}
