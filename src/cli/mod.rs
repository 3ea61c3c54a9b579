// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 trainflow contributors

//! CLI command definitions and handlers
//!
//! Defines the command-line interface for trainflow.

pub mod graph;
pub mod run;
pub mod validate;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

use crate::config::{self, Settings};

/// Training pipeline orchestrator
///
/// Builds, publishes and submits the train/evaluate pipeline on an Azure
/// Machine Learning workspace.
#[derive(Parser, Debug)]
#[clap(
    name = "trainflow",
    version,
    about = "Training pipeline orchestrator for Azure Machine Learning",
    long_about = None,
    after_help = "Examples:\n\
        trainflow validate                 Check settings and the pipeline definition\n\
        trainflow graph --format mermaid   Show the step graph\n\
        trainflow run                      Publish the pipeline and submit a run\n\n\
        Settings are read from the environment; a .env file is loaded when present."
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[clap(short, long, global = true)]
    pub verbose: bool,

    /// Change to directory before executing
    #[clap(short = 'C', long, global = true, value_name = "DIR")]
    pub directory: Option<PathBuf>,

    /// Load settings from this dotenv file instead of ./.env
    #[clap(long, global = true, value_name = "PATH")]
    pub env_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Publish the training pipeline and submit one run
    Run,

    /// Validate settings and the pipeline definition without contacting the platform
    Validate,

    /// Show the pipeline as a graph
    Graph {
        /// Output format
        #[clap(short, long, value_enum, default_value_t = GraphFormat::Text)]
        format: GraphFormat,
    },
}

/// Graph output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum GraphFormat {
    /// Execution order listing
    Text,
    /// Graphviz DOT
    Dot,
    /// Mermaid flowchart
    Mermaid,
    /// Publish payload as YAML
    Yaml,
}

/// Load the dotenv file (if any) and read settings from the environment
pub(crate) fn load_settings(env_file: Option<&Path>) -> miette::Result<Settings> {
    if let Some(path) = config::load_env_file(env_file)? {
        tracing::debug!(path = %path.display(), "loaded env file");
    }
    Ok(Settings::from_env()?)
}
