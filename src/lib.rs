// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 trainflow contributors

//! # trainflow - Training Pipeline Orchestrator
//!
//! `trainflow` assembles a two-step train/evaluate pipeline and submits it to
//! an Azure Machine Learning workspace.
//!
//! ## Features
//!
//! - **Environment configuration** - Every setting read once, all gaps reported together
//! - **Pipeline model** - Parameters, steps and `run_after` edges with transitive discovery
//! - **Local validation** - Cycles, missing steps and naming problems caught before publishing
//! - **Platform seams** - Narrow async traits with a Resource Manager REST implementation
//!
//! ## Quick Start
//!
//! ```bash
//! # Check settings and the pipeline definition
//! trainflow validate
//!
//! # Render the step graph
//! trainflow graph --format mermaid
//!
//! # Publish and submit
//! trainflow run
//! ```

pub mod cli;
pub mod config;
pub mod errors;
pub mod pipeline;
pub mod platform;
pub mod training;
pub mod utils;

// Re-export commonly used types
pub use config::Settings;
pub use errors::{TrainflowError, TrainflowResult};
pub use pipeline::{Pipeline, PipelineStep};
pub use platform::Platform;
pub use training::{TrainingOutcome, TrainingPipelineBuilder};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
