// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod ask;
pub mod index;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::AppConfig;

/// medibot CLI
#[derive(Parser, Debug)]
#[command(name = "medibot-cli")]
#[command(version)]
#[command(about = "Ask questions against a medical document index", long_about = None)]
pub struct Cli {
    /// TOML configuration file
    #[arg(long, global = true, env = "MEDIBOT_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Answer a single question and exit
    Ask(ask::AskArgs),

    /// Interactive session reading questions from stdin
    Chat,

    /// Build the vector index from a directory of text files
    BuildIndex(index::BuildIndexArgs),
}

/// Execute CLI command
pub async fn execute(cli: Cli) -> Result<()> {
    let config = AppConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Ask(args) => ask::ask(&config, args).await,
        Commands::Chat => ask::chat(&config).await,
        Commands::BuildIndex(args) => index::build_index(&config, args).await,
    }
}
