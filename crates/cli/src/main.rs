//! # Collar Steps CLI
//!
//! Command-line entry point for the collar step counter.
//!
//! Commands:
//! - `process` / `replay`: feed chunk files or a split recording to the engine
//! - `synth`: write a synthetic recording for trials
//! - `params`: show or patch a session's algorithm params
//! - `validate` / `info`: inspect configuration and stored sessions

mod cli;
mod commands;
mod error;
mod pipeline;
mod settings;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use cli::{Cli, Commands};
use commands::{run_info, run_params, run_process, run_replay, run_synth, run_validate};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    observability::init_with_config(&cli.observability_settings())?;

    info!(version = env!("CARGO_PKG_VERSION"), "collar-steps starting");

    let result = match &cli.command {
        Commands::Process(args) => run_process(args).await,
        Commands::Replay(args) => run_replay(args).await,
        Commands::Synth(args) => run_synth(args),
        Commands::Params(args) => run_params(args).await,
        Commands::Validate(args) => run_validate(args),
        Commands::Info(args) => run_info(args).await,
    };

    if let Err(e) = &result {
        error!(error = %e, "command failed");
    }
    result
}
