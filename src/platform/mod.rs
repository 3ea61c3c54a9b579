// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 trainflow contributors

//! Managed ML platform seams
//!
//! The orchestration code only talks to the platform through the traits in
//! this module. [`azure`] provides the REST-backed implementation; tests
//! substitute fakes.

pub mod azure;

#[cfg(test)]
pub(crate) mod fake;

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

use crate::config::{Secret, Settings, WorkspaceIdentity};
use crate::errors::TrainflowResult;
use crate::pipeline::{DatasetInput, Pipeline};

/// Handle to a resolved workspace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    /// Fully qualified resource id
    pub id: String,
    pub name: String,
    pub resource_group: String,
    pub subscription_id: String,
    pub location: Option<String>,
}

impl fmt::Display for Workspace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Workspace(name={}, subscription={}, resource_group={}",
            self.name, self.subscription_id, self.resource_group
        )?;
        if let Some(ref location) = self.location {
            write!(f, ", location={}", location)?;
        }
        write!(f, ")")
    }
}

/// Provisioning state reported for a compute target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisioningState {
    Succeeded,
    Creating,
    Updating,
    Failed,
    Deleting,
    Canceled,
    Unknown,
}

impl ProvisioningState {
    /// Parse the platform's state string, case-insensitively
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "succeeded" => Self::Succeeded,
            "creating" => Self::Creating,
            "updating" => Self::Updating,
            "failed" => Self::Failed,
            "deleting" => Self::Deleting,
            "canceled" | "cancelled" => Self::Canceled,
            _ => Self::Unknown,
        }
    }

    /// Whether a target in this state can accept work
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Failed | Self::Deleting | Self::Canceled)
    }
}

impl fmt::Display for ProvisioningState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Succeeded => "Succeeded",
            Self::Creating => "Creating",
            Self::Updating => "Updating",
            Self::Failed => "Failed",
            Self::Deleting => "Deleting",
            Self::Canceled => "Canceled",
            Self::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// Handle to a compute cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputeTarget {
    pub id: String,
    pub name: String,
    pub vm_size: Option<String>,
    pub state: ProvisioningState,
}

impl ComputeTarget {
    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }
}

impl fmt::Display for ComputeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ComputeTarget(name={}, vm_size={}, state={})",
            self.name,
            self.vm_size.as_deref().unwrap_or("?"),
            self.state
        )
    }
}

/// Blob container to register as a datastore
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobContainerSpec {
    pub datastore_name: String,
    pub container_name: String,
    pub account_name: String,
    pub sas_token: Secret,
}

/// Handle to a registered datastore
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datastore {
    pub id: String,
    pub name: String,
    pub container_name: Option<String>,
    pub account_name: Option<String>,
}

/// File dataset to register over a datastore path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDatasetSpec {
    pub name: String,
    pub description: String,
    /// Path inside the datastore
    pub path: String,
}

/// Handle to one registered dataset version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredDataset {
    pub id: String,
    pub name: String,
    pub version: u32,
}

impl RegisteredDataset {
    /// Versioned asset reference steps use to consume the dataset
    pub fn asset_reference(&self) -> String {
        format!("azureml:{}:{}", self.name, self.version)
    }

    /// Mount this dataset into a step under `input_name` at `mount_path`
    pub fn as_mount(&self, input_name: &str, mount_path: &str) -> DatasetInput {
        DatasetInput {
            input_name: input_name.to_string(),
            dataset_id: self.asset_reference(),
            mount_path: mount_path.to_string(),
        }
    }
}

/// Name, description and version to publish a pipeline under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishRequest {
    pub name: String,
    pub description: String,
    pub version: String,
}

/// Handle to a published pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedPipeline {
    pub id: String,
    pub name: String,
    pub version: String,
}

/// Handle to a submitted run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineRun {
    pub id: String,
    pub experiment_name: String,
    pub status: String,
    pub portal_url: Option<String>,
}

/// Resolves a workspace from its identity
#[async_trait]
pub trait WorkspaceResolver: Send + Sync {
    async fn resolve(&self, identity: &WorkspaceIdentity) -> TrainflowResult<Workspace>;
}

/// Finds or provisions compute targets
#[async_trait]
pub trait ComputeProvider: Send + Sync {
    /// `Ok(None)` when the target is absent or inactive
    async fn get_or_create(
        &self,
        workspace: &Workspace,
        name: &str,
        vm_size: &str,
    ) -> TrainflowResult<Option<ComputeTarget>>;
}

/// Looks up and registers blob-backed datastores
#[async_trait]
pub trait DatastoreRegistry: Send + Sync {
    /// `Ok(None)` when no datastore of that name exists
    async fn find(&self, workspace: &Workspace, name: &str) -> TrainflowResult<Option<Datastore>>;

    async fn register_blob_container(
        &self,
        workspace: &Workspace,
        spec: &BlobContainerSpec,
        overwrite: bool,
    ) -> TrainflowResult<Datastore>;
}

/// Registers versioned file datasets
#[async_trait]
pub trait DatasetRegistry: Send + Sync {
    async fn register_files(
        &self,
        workspace: &Workspace,
        datastore: &Datastore,
        spec: &FileDatasetSpec,
        create_new_version: bool,
    ) -> TrainflowResult<RegisteredDataset>;
}

/// Publishes pipelines and submits runs
#[async_trait]
pub trait PipelineService: Send + Sync {
    async fn publish(
        &self,
        workspace: &Workspace,
        pipeline: &Pipeline,
        request: &PublishRequest,
    ) -> TrainflowResult<PublishedPipeline>;

    async fn submit(
        &self,
        workspace: &Workspace,
        pipeline: &PublishedPipeline,
        experiment_name: &str,
    ) -> TrainflowResult<PipelineRun>;
}

/// One implementation of every platform capability
#[derive(Clone)]
pub struct Platform {
    pub workspaces: Arc<dyn WorkspaceResolver>,
    pub compute: Arc<dyn ComputeProvider>,
    pub datastores: Arc<dyn DatastoreRegistry>,
    pub datasets: Arc<dyn DatasetRegistry>,
    pub pipelines: Arc<dyn PipelineService>,
}

impl Platform {
    /// Platform backed by the Azure Resource Manager REST API
    pub fn azure(settings: &Settings) -> TrainflowResult<Self> {
        let client = Arc::new(azure::AzureMlClient::new(
            &settings.identity,
            &settings.endpoints,
        )?);

        Ok(Self {
            workspaces: client.clone(),
            compute: client.clone(),
            datastores: client.clone(),
            datasets: client.clone(),
            pipelines: client,
        })
    }
}
