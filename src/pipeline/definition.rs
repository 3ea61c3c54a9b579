// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 trainflow contributors

//! Pipeline definition structures
//!
//! Parameters, steps and the pipeline that groups them. Steps reference the
//! steps they run after directly, so a pipeline can be assembled from its
//! final steps alone and the rest is discovered by walking those edges.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::errors::{TrainflowError, TrainflowResult};
use crate::platform::ComputeTarget;

/// Typed default value of a pipeline parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Int(i64),
    Float(f64),
    Str(String),
}

impl ParameterValue {
    /// Platform type name for the value
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Int(_) => "integer",
            Self::Float(_) => "number",
            Self::Str(_) => "string",
        }
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{:e}", v),
            Self::Str(v) => write!(f, "{}", v),
        }
    }
}

impl From<i64> for ParameterValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for ParameterValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for ParameterValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for ParameterValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

/// A named, defaulted value resolved when a run is submitted
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineParameter {
    name: String,
    default: ParameterValue,
}

impl PipelineParameter {
    pub fn new(name: impl Into<String>, default: impl Into<ParameterValue>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            default: default.into(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn default_value(&self) -> &ParameterValue {
        &self.default
    }
}

/// A dataset mounted into a step's environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetInput {
    /// Name the step sees the input under
    pub input_name: String,
    /// Platform id of the registered dataset version
    pub dataset_id: String,
    /// Local mount point inside the step
    pub mount_path: String,
}

/// One entry of a step's argument list
#[derive(Debug, Clone, PartialEq)]
pub enum StepArgument {
    Literal(String),
    Parameter(Arc<PipelineParameter>),
    Input(DatasetInput),
}

impl StepArgument {
    pub fn literal(value: impl Into<String>) -> Self {
        Self::Literal(value.into())
    }

    /// Render the argument as it appears on the step's command line
    pub fn render(&self) -> String {
        match self {
            Self::Literal(v) => v.clone(),
            Self::Parameter(p) => format!("${{{{inputs.{}}}}}", p.name()),
            Self::Input(i) => format!("${{{{inputs.{}}}}}", i.input_name),
        }
    }
}

impl From<&Arc<PipelineParameter>> for StepArgument {
    fn from(p: &Arc<PipelineParameter>) -> Self {
        Self::Parameter(Arc::clone(p))
    }
}

impl From<&str> for StepArgument {
    fn from(v: &str) -> Self {
        Self::Literal(v.to_string())
    }
}

/// Conda/pip environment a step executes under
///
/// Published as an [`EnvironmentSpec`](crate::pipeline::EnvironmentSpec).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunConfiguration {
    pub conda_packages: Vec<String>,
    pub pip_packages: Vec<String>,
}

impl RunConfiguration {
    /// Build a run configuration, dropping repeated package entries
    pub fn new<C, P>(conda_packages: C, pip_packages: P) -> Self
    where
        C: IntoIterator,
        C::Item: Into<String>,
        P: IntoIterator,
        P::Item: Into<String>,
    {
        Self {
            conda_packages: dedup(conda_packages),
            pip_packages: dedup(pip_packages),
        }
    }
}

fn dedup<I>(items: I) -> Vec<String>
where
    I: IntoIterator,
    I::Item: Into<String>,
{
    let mut seen = HashSet::new();
    items
        .into_iter()
        .map(Into::into)
        .filter(|item: &String| seen.insert(item.clone()))
        .collect()
}

/// A single executable unit of a pipeline
#[derive(Debug, Clone)]
pub struct PipelineStep {
    /// Step name (must be unique within pipeline)
    pub name: String,
    /// Script to run, relative to the source directory
    pub script_name: String,
    /// Directory uploaded as the step's code snapshot
    pub source_directory: PathBuf,
    pub arguments: Vec<StepArgument>,
    /// `None` when the compute target could not be resolved
    pub compute_target: Option<ComputeTarget>,
    pub run_config: RunConfiguration,
    /// Whether an earlier execution with identical inputs may be reused
    pub allow_reuse: bool,
    run_after: Vec<Arc<PipelineStep>>,
}

impl PipelineStep {
    pub fn new(
        name: impl Into<String>,
        script_name: impl Into<String>,
        source_directory: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            script_name: script_name.into(),
            source_directory: source_directory.into(),
            arguments: Vec::new(),
            compute_target: None,
            run_config: RunConfiguration::default(),
            allow_reuse: true,
            run_after: Vec::new(),
        }
    }

    pub fn with_arguments(mut self, arguments: Vec<StepArgument>) -> Self {
        self.arguments = arguments;
        self
    }

    pub fn with_compute(mut self, compute_target: Option<ComputeTarget>) -> Self {
        self.compute_target = compute_target;
        self
    }

    pub fn with_run_config(mut self, run_config: RunConfiguration) -> Self {
        self.run_config = run_config;
        self
    }

    pub fn with_allow_reuse(mut self, allow_reuse: bool) -> Self {
        self.allow_reuse = allow_reuse;
        self
    }

    /// Declare that this step must not start before `step` completes
    pub fn run_after(&mut self, step: &Arc<PipelineStep>) {
        if !self.run_after.iter().any(|s| Arc::ptr_eq(s, step)) {
            self.run_after.push(Arc::clone(step));
        }
    }

    /// Steps this one runs after
    pub fn predecessors(&self) -> &[Arc<PipelineStep>] {
        &self.run_after
    }

    /// Names of the steps this one runs after
    pub fn dependency_names(&self) -> Vec<&str> {
        self.run_after.iter().map(|s| s.name.as_str()).collect()
    }

    /// Parameters referenced in the argument list
    pub fn parameters(&self) -> impl Iterator<Item = &Arc<PipelineParameter>> {
        self.arguments.iter().filter_map(|a| match a {
            StepArgument::Parameter(p) => Some(p),
            _ => None,
        })
    }

    /// Dataset inputs referenced in the argument list
    pub fn inputs(&self) -> impl Iterator<Item = &DatasetInput> {
        self.arguments.iter().filter_map(|a| match a {
            StepArgument::Input(i) => Some(i),
            _ => None,
        })
    }

    /// Full command line for the step
    pub fn command_line(&self) -> String {
        let mut parts = vec!["python".to_string(), self.script_name.clone()];
        parts.extend(self.arguments.iter().map(StepArgument::render));
        parts.join(" ")
    }

    /// Same definition, ignoring identity of predecessor handles
    fn same_definition(&self, other: &PipelineStep) -> bool {
        self.script_name == other.script_name
            && self.source_directory == other.source_directory
            && self.arguments == other.arguments
            && self.compute_target == other.compute_target
            && self.run_config == other.run_config
            && self.allow_reuse == other.allow_reuse
            && self.dependency_names() == other.dependency_names()
    }
}

/// An assembled pipeline, steps listed dependencies-first
#[derive(Debug, Clone)]
pub struct Pipeline {
    pub name: String,
    pub description: Option<String>,
    pub steps: Vec<Arc<PipelineStep>>,
}

impl Pipeline {
    /// Assemble a pipeline from its final steps
    ///
    /// Every step reachable through `run_after` edges is included, ordered so
    /// each step appears after the steps it runs after.
    pub fn from_steps(
        name: impl Into<String>,
        steps: Vec<Arc<PipelineStep>>,
    ) -> TrainflowResult<Self> {
        let mut collected: Vec<Arc<PipelineStep>> = Vec::new();
        let mut by_name: HashMap<String, Arc<PipelineStep>> = HashMap::new();

        for step in &steps {
            Self::discover(step, &mut collected, &mut by_name)?;
        }

        Ok(Self {
            name: name.into(),
            description: None,
            steps: collected,
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    fn discover(
        step: &Arc<PipelineStep>,
        collected: &mut Vec<Arc<PipelineStep>>,
        by_name: &mut HashMap<String, Arc<PipelineStep>>,
    ) -> TrainflowResult<()> {
        if let Some(existing) = by_name.get(&step.name) {
            if Arc::ptr_eq(existing, step) || existing.same_definition(step) {
                return Ok(());
            }
            return Err(TrainflowError::DuplicateStep {
                step: step.name.clone(),
            });
        }

        // Registered before recursing so a step is never entered twice
        by_name.insert(step.name.clone(), Arc::clone(step));

        for predecessor in step.predecessors() {
            Self::discover(predecessor, collected, by_name)?;
        }

        collected.push(Arc::clone(step));
        Ok(())
    }

    /// Get a step by name
    pub fn get_step(&self, name: &str) -> Option<&Arc<PipelineStep>> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// Get all step names
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name.as_str()).collect()
    }

    /// Every parameter used by any step, first use wins
    pub fn parameters(&self) -> Vec<Arc<PipelineParameter>> {
        let mut seen = HashSet::new();
        self.steps
            .iter()
            .flat_map(|s| s.parameters())
            .filter(|p| seen.insert(p.name().to_string()))
            .cloned()
            .collect()
    }
}
