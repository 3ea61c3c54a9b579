// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 trainflow contributors

//! trainflow - Training pipeline orchestrator
//!
//! Publish and submit the train/evaluate pipeline on Azure Machine Learning.

use clap::Parser;
use miette::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use trainflow::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let default_filter = if cli.verbose {
        "trainflow=debug"
    } else {
        "trainflow=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    // Change to specified directory if provided
    if let Some(ref dir) = cli.directory {
        std::env::set_current_dir(dir).map_err(|e| {
            miette::miette!("Failed to change to directory '{}': {}", dir.display(), e)
        })?;
    }

    let env_file = cli.env_file.as_deref();

    // Dispatch to command handlers
    match cli.command {
        Commands::Run => trainflow::cli::run::run(env_file, cli.verbose).await,
        Commands::Validate => trainflow::cli::validate::run(env_file, cli.verbose).await,
        Commands::Graph { format } => {
            trainflow::cli::graph::run(env_file, format, cli.verbose).await
        }
    }
}
