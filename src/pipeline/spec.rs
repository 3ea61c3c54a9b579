// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 trainflow contributors

//! Serializable pipeline specification
//!
//! The pipeline component document sent when a pipeline is published, also
//! rendered by `trainflow graph --format yaml`. Keys follow the platform's
//! component schema.
//!
//! Every job binds the pipeline parameters it uses as its own inputs, and
//! each `run_after` edge becomes a data binding: the earlier job exposes a
//! [`COMPLETION_OUTPUT`] folder that the later job takes as an input, so the
//! platform cannot start the later job first.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::errors::TrainflowResult;
use crate::pipeline::{ParameterValue, Pipeline, PipelineStep, RunConfiguration, StepFingerprint};

/// Output every upstream job exposes for ordering
pub const COMPLETION_OUTPUT: &str = "completed";

/// Base image the conda environment is layered on
pub const ENVIRONMENT_IMAGE: &str = "mcr.microsoft.com/azureml/openmpi4.1.0-ubuntu20.04";

/// Published form of a [`Pipeline`]
#[derive(Debug, Clone, Serialize)]
pub struct PipelineSpec {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub name: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Pipeline parameters with their defaults
    pub inputs: BTreeMap<String, ParameterSpec>,
    /// Steps keyed by job key
    pub jobs: BTreeMap<String, JobSpec>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParameterSpec {
    #[serde(rename = "type")]
    pub kind: String,
    pub default: ParameterValue,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobSpec {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub display_name: String,
    pub code: String,
    pub command: String,
    pub environment: EnvironmentSpec,
    /// `azureml:<cluster>`; absent when no compute target was resolved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compute: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub inputs: BTreeMap<String, JobInput>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub outputs: BTreeMap<String, JobOutput>,
    /// Reuse of earlier identical executions is allowed
    pub is_deterministic: bool,
    pub tags: BTreeMap<String, String>,
}

/// A job input: a binding expression or a data asset
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum JobInput {
    Binding(String),
    Data(DataInputSpec),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataInputSpec {
    #[serde(rename = "type")]
    pub kind: String,
    pub path: String,
    pub mode: String,
    pub path_on_compute: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobOutput {
    #[serde(rename = "type")]
    pub kind: String,
}

/// Inline environment: a base image plus a conda file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnvironmentSpec {
    pub image: String,
    pub conda_file: CondaFile,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CondaFile {
    pub name: String,
    pub channels: Vec<String>,
    pub dependencies: Vec<CondaDependency>,
}

/// Entry of a conda `dependencies` list
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CondaDependency {
    Package(String),
    Pip { pip: Vec<String> },
}

impl EnvironmentSpec {
    pub fn from_run_config(run_config: &RunConfiguration) -> Self {
        let mut dependencies: Vec<CondaDependency> = run_config
            .conda_packages
            .iter()
            .cloned()
            .map(CondaDependency::Package)
            .collect();

        if !run_config.pip_packages.is_empty() {
            dependencies.push(CondaDependency::Package("pip".into()));
            dependencies.push(CondaDependency::Pip {
                pip: run_config.pip_packages.clone(),
            });
        }

        Self {
            image: ENVIRONMENT_IMAGE.to_string(),
            conda_file: CondaFile {
                name: "trainflow".into(),
                channels: vec!["conda-forge".into()],
                dependencies,
            },
        }
    }
}

/// Job key for a step name: lowercase, alphanumerics and underscores
pub fn job_key(step_name: &str) -> String {
    let key: String = step_name
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    key.trim_matches('_').to_string()
}

/// Input name a job uses to wait on `upstream`
pub fn ordering_input(upstream: &str) -> String {
    format!("after_{}", job_key(upstream))
}

impl PipelineSpec {
    /// Build the published document for `pipeline` at `version`
    pub fn from_pipeline(pipeline: &Pipeline, version: &str) -> Self {
        let inputs = pipeline
            .parameters()
            .iter()
            .map(|p| {
                (
                    p.name().to_string(),
                    ParameterSpec {
                        kind: p.default_value().type_name().to_string(),
                        default: p.default_value().clone(),
                    },
                )
            })
            .collect();

        let jobs = pipeline
            .steps
            .iter()
            .map(|step| {
                let has_dependents = pipeline
                    .steps
                    .iter()
                    .any(|s| s.dependency_names().contains(&step.name.as_str()));
                (job_key(&step.name), Self::job(step, has_dependents))
            })
            .collect();

        Self {
            kind: "pipeline",
            name: pipeline.name.clone(),
            version: version.to_string(),
            description: pipeline.description.clone(),
            inputs,
            jobs,
        }
    }

    fn job(step: &PipelineStep, has_dependents: bool) -> JobSpec {
        let mut inputs = BTreeMap::new();

        for param in step.parameters() {
            inputs.insert(
                param.name().to_string(),
                JobInput::Binding(format!("${{{{parent.inputs.{}}}}}", param.name())),
            );
        }

        for input in step.inputs() {
            inputs.insert(
                input.input_name.clone(),
                JobInput::Data(DataInputSpec {
                    kind: "uri_folder".into(),
                    path: input.dataset_id.clone(),
                    mode: "ro_mount".into(),
                    path_on_compute: input.mount_path.clone(),
                }),
            );
        }

        for upstream in step.dependency_names() {
            inputs.insert(
                ordering_input(upstream),
                JobInput::Binding(format!(
                    "${{{{parent.jobs.{}.outputs.{}}}}}",
                    job_key(upstream),
                    COMPLETION_OUTPUT
                )),
            );
        }

        let mut outputs = BTreeMap::new();
        if has_dependents {
            outputs.insert(
                COMPLETION_OUTPUT.to_string(),
                JobOutput {
                    kind: "uri_folder".into(),
                },
            );
        }

        JobSpec {
            kind: "command",
            display_name: step.name.clone(),
            code: step.source_directory.to_string_lossy().into_owned(),
            command: step.command_line(),
            environment: EnvironmentSpec::from_run_config(&step.run_config),
            compute: step
                .compute_target
                .as_ref()
                .map(|t| format!("azureml:{}", t.name)),
            inputs,
            outputs,
            is_deterministic: step.allow_reuse,
            tags: BTreeMap::from([("fingerprint".to_string(), StepFingerprint::of(step))]),
        }
    }

    pub fn to_yaml(&self) -> TrainflowResult<String> {
        serde_yaml::to_string(self).map_err(Into::into)
    }

    pub fn to_json(&self) -> TrainflowResult<serde_json::Value> {
        serde_json::to_value(self).map_err(Into::into)
    }
}
