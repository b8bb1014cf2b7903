//! # Proplet Proxy CLI
//!
//! Command-line entry point.
//!
//! Provides:
//! - Configuration resolution and validation
//! - Proxy lifecycle orchestration
//! - Graceful shutdown on Ctrl+C / SIGTERM

mod cli;
mod commands;
mod error;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Commands};
use commands::{run_proxy, run_validate};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = match &cli.command {
        Commands::Run(args) => run_proxy(&cli, args).await,
        Commands::Validate(args) => run_validate(&cli, args),
    };

    if let Err(ref e) = result {
        tracing::error!(error = %e, "Command failed");
    }

    result
}
