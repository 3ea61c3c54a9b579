// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 trainflow contributors

//! Pipeline validation
//!
//! Structural checks run before anything is published.

use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use crate::errors::TrainflowError;
use crate::pipeline::{DagBuilder, Pipeline, PipelineStep};

/// Names accepted by the platform for pipelines and experiments
fn resource_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.-]{0,254}$").expect("valid resource name pattern")
    })
}

/// Check a pipeline or experiment name against the platform naming rule
pub fn is_valid_resource_name(name: &str) -> bool {
    resource_name_pattern().is_match(name)
}

/// Pipeline validator
pub struct PipelineValidator;

impl PipelineValidator {
    /// Validate a pipeline definition
    pub fn validate(pipeline: &Pipeline) -> ValidationResult {
        let mut result = ValidationResult::new();

        if pipeline.steps.is_empty() {
            result.add_error("Pipeline has no steps defined");
        }

        if !is_valid_resource_name(&pipeline.name) {
            result.add_warning(&format!(
                "Pipeline name '{}' does not match the platform naming rule",
                pipeline.name
            ));
        }

        let mut seen_names = HashSet::new();
        for step in &pipeline.steps {
            if !seen_names.insert(&step.name) {
                result.add_error(&format!("Duplicate step name: '{}'", step.name));
            }
        }

        // Checks for cycles and steps that were never added to the pipeline
        match DagBuilder::build(pipeline) {
            Ok(_) => {}
            Err(TrainflowError::CircularDependency { steps }) => {
                result.add_error(&format!("Circular dependency: {}", steps.join(" → ")));
            }
            Err(TrainflowError::UnknownDependency { step, dependency }) => {
                result.add_error(&format!(
                    "Step '{}' runs after '{}', which is not part of the pipeline",
                    step, dependency
                ));
            }
            Err(TrainflowError::DuplicateStep { .. }) => {}
            Err(e) => {
                result.add_error(&format!("DAG validation error: {}", e));
            }
        }

        for step in &pipeline.steps {
            Self::validate_step(step, &mut result);
        }

        Self::validate_parameter_defaults(pipeline, &mut result);

        result
    }

    /// Parameters are shared by name; only the first default reaches the platform
    fn validate_parameter_defaults(pipeline: &Pipeline, result: &mut ValidationResult) {
        let mut first_default = HashMap::new();
        let mut reported = HashSet::new();

        for step in &pipeline.steps {
            for param in step.parameters() {
                let first = first_default
                    .entry(param.name())
                    .or_insert_with(|| param.default_value());
                if *first != param.default_value() && reported.insert(param.name()) {
                    result.add_warning(&format!(
                        "Parameter '{}' has conflicting defaults ({} and {}); the pipeline uses {}",
                        param.name(),
                        first,
                        param.default_value(),
                        first
                    ));
                }
            }
        }
    }

    /// Validate a single step
    fn validate_step(step: &PipelineStep, result: &mut ValidationResult) {
        if step.name.trim().is_empty() {
            result.add_error("Step with an empty name");
        }

        if step.script_name.trim().is_empty() {
            result.add_error(&format!("Step '{}': script path is empty", step.name));
        }

        if step.source_directory.as_os_str().is_empty() {
            result.add_error(&format!("Step '{}': source directory is empty", step.name));
        }

        match &step.compute_target {
            None => result.add_warning(&format!(
                "Step '{}': no compute target bound, the run will fail unless the platform supplies a default",
                step.name
            )),
            Some(target) if !target.is_active() => result.add_warning(&format!(
                "Step '{}': compute target '{}' is {}",
                step.name, target.name, target.state
            )),
            Some(_) => {}
        }

        let mut seen_params = HashSet::new();
        for param in step.parameters() {
            if !seen_params.insert(param.name()) {
                result.add_warning(&format!(
                    "Step '{}': parameter '{}' is passed more than once",
                    step.name,
                    param.name()
                ));
            }
        }
    }

    /// Validate and turn the first error into a fatal [`TrainflowError`]
    pub fn ensure_valid(pipeline: &Pipeline) -> Result<ValidationResult, TrainflowError> {
        let result = Self::validate(pipeline);
        if result.is_valid() {
            Ok(result)
        } else {
            Err(TrainflowError::InvalidPipeline {
                reason: result.errors.join("; "),
                help: Some("Fix the step definitions before publishing".into()),
            })
        }
    }
}

/// Result of pipeline validation
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, msg: &str) {
        self.errors.push(msg.to_string());
    }

    pub fn add_warning(&mut self, msg: &str) {
        self.warnings.push(msg.to_string());
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}
