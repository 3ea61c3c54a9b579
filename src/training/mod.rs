// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 trainflow contributors

//! The train/evaluate pipeline
//!
//! [`definition`] declares the parameters and steps, [`assets`] holds the
//! fixed datastore, dataset and environment, and [`builder`] walks the
//! platform through a submission.

pub mod assets;
pub mod builder;
pub mod definition;

pub use builder::{TrainingOutcome, TrainingPipelineBuilder};
pub use definition::{
    offline_pipeline, training_pipeline, TrainingParameters, EVALUATE_STEP_NAME,
    PIPELINE_DESCRIPTION, TRAIN_STEP_NAME,
};
