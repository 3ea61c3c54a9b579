// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 trainflow contributors

//! Pipeline definitions and types
//!
//! This module defines the platform-independent pipeline model: parameters,
//! steps, the dependency graph, validation and the published specification.

mod dag;
mod definition;
mod fingerprint;
mod spec;
mod validation;

pub use dag::DagBuilder;
pub use definition::*;
pub use fingerprint::StepFingerprint;
pub use spec::{
    job_key, ordering_input, CondaDependency, CondaFile, DataInputSpec, EnvironmentSpec, JobInput,
    JobOutput, JobSpec, ParameterSpec, PipelineSpec, COMPLETION_OUTPUT,
};
pub use validation::{is_valid_resource_name, PipelineValidator, ValidationResult};
