// SPDX-FileCopyrightText: 2026 Steward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Steward - an LLM-driven DevOps agent with gated, audited tool execution.
//!
//! This is the binary entry point for the Steward server.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod doctor;
mod serve;

/// Steward - an LLM-driven DevOps agent with gated, audited tool execution.
#[derive(Parser, Debug)]
#[command(name = "steward", version, about, long_about = None)]
struct Cli {
    /// Path to an explicit config file (defaults to the XDG hierarchy).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the Steward agent server.
    Serve,
    /// Run diagnostic checks against the environment.
    Doctor,
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<steward_config::StewardConfig> {
    let config = match path {
        Some(path) => steward_config::load_config_from_path(path)?,
        None => steward_config::load_config()?,
    };
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Serve => serve::run_serve(config).await?,
        Commands::Doctor => doctor::run_doctor(&config).await?,
    }
    Ok(())
}
