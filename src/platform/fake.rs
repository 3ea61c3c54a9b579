// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 trainflow contributors

//! In-memory platform that records every call

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use super::*;
use crate::errors::TrainflowError;

/// What a datastore lookup should answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LookupOutcome {
    Found,
    Missing,
    Fails,
}

#[derive(Debug, Default)]
pub(crate) struct Recorded {
    /// Operation names in call order
    pub calls: Vec<&'static str>,
    pub identities: Vec<WorkspaceIdentity>,
    pub compute_requests: Vec<(String, String)>,
    pub registrations: Vec<(BlobContainerSpec, bool)>,
    pub dataset_specs: Vec<(FileDatasetSpec, bool)>,
    pub published: Vec<(Pipeline, PublishRequest)>,
    pub experiments: Vec<String>,
}

pub(crate) struct FakePlatform {
    pub compute_available: bool,
    pub datastore_lookup: LookupOutcome,
    /// Operation that returns an error instead of succeeding
    pub fail_on: Option<&'static str>,
    recorded: Mutex<Recorded>,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self {
            compute_available: true,
            datastore_lookup: LookupOutcome::Found,
            fail_on: None,
            recorded: Mutex::new(Recorded::default()),
        }
    }

    pub fn without_compute(mut self) -> Self {
        self.compute_available = false;
        self
    }

    pub fn with_datastore_lookup(mut self, outcome: LookupOutcome) -> Self {
        self.datastore_lookup = outcome;
        self
    }

    pub fn failing_on(mut self, operation: &'static str) -> Self {
        self.fail_on = Some(operation);
        self
    }

    pub fn platform(self: &Arc<Self>) -> Platform {
        Platform {
            workspaces: self.clone(),
            compute: self.clone(),
            datastores: self.clone(),
            datasets: self.clone(),
            pipelines: self.clone(),
        }
    }

    pub fn recorded(&self) -> std::sync::MutexGuard<'_, Recorded> {
        self.recorded.lock().unwrap()
    }

    fn enter(&self, operation: &'static str) -> TrainflowResult<()> {
        self.recorded().calls.push(operation);
        if self.fail_on == Some(operation) {
            return Err(TrainflowError::Platform {
                operation: operation.to_string(),
                status: 500,
                message: "injected failure".into(),
            });
        }
        Ok(())
    }
}

pub(crate) fn workspace() -> Workspace {
    Workspace {
        id: "/subscriptions/s/resourceGroups/rg/providers/Microsoft.MachineLearningServices/workspaces/ws".into(),
        name: "ws".into(),
        resource_group: "rg".into(),
        subscription_id: "s".into(),
        location: Some("westus2".into()),
    }
}

fn datastore(name: &str) -> Datastore {
    Datastore {
        id: format!("{}/datastores/{}", workspace().id, name),
        name: name.to_string(),
        container_name: Some("azure-service-classifier".into()),
        account_name: Some("mtcseattle".into()),
    }
}

#[async_trait]
impl WorkspaceResolver for FakePlatform {
    async fn resolve(&self, identity: &WorkspaceIdentity) -> TrainflowResult<Workspace> {
        self.enter("resolve_workspace")?;
        self.recorded().identities.push(identity.clone());
        Ok(Workspace {
            name: identity.workspace_name.clone(),
            resource_group: identity.resource_group.clone(),
            subscription_id: identity.subscription_id.clone(),
            ..workspace()
        })
    }
}

#[async_trait]
impl ComputeProvider for FakePlatform {
    async fn get_or_create(
        &self,
        workspace: &Workspace,
        name: &str,
        vm_size: &str,
    ) -> TrainflowResult<Option<ComputeTarget>> {
        self.enter("get_or_create_compute")?;
        self.recorded()
            .compute_requests
            .push((name.to_string(), vm_size.to_string()));

        Ok(self.compute_available.then(|| ComputeTarget {
            id: format!("{}/computes/{}", workspace.id, name),
            name: name.to_string(),
            vm_size: Some(vm_size.to_string()),
            state: ProvisioningState::Succeeded,
        }))
    }
}

#[async_trait]
impl DatastoreRegistry for FakePlatform {
    async fn find(&self, _workspace: &Workspace, name: &str) -> TrainflowResult<Option<Datastore>> {
        self.enter("find_datastore")?;
        match self.datastore_lookup {
            LookupOutcome::Found => Ok(Some(datastore(name))),
            LookupOutcome::Missing => Ok(None),
            LookupOutcome::Fails => Err(TrainflowError::Platform {
                operation: "get datastore".into(),
                status: 403,
                message: "lookup denied".into(),
            }),
        }
    }

    async fn register_blob_container(
        &self,
        _workspace: &Workspace,
        spec: &BlobContainerSpec,
        overwrite: bool,
    ) -> TrainflowResult<Datastore> {
        self.enter("register_datastore")?;
        self.recorded().registrations.push((spec.clone(), overwrite));
        Ok(datastore(&spec.datastore_name))
    }
}

#[async_trait]
impl DatasetRegistry for FakePlatform {
    async fn register_files(
        &self,
        workspace: &Workspace,
        _datastore: &Datastore,
        spec: &FileDatasetSpec,
        create_new_version: bool,
    ) -> TrainflowResult<RegisteredDataset> {
        self.enter("register_dataset")?;
        self.recorded()
            .dataset_specs
            .push((spec.clone(), create_new_version));
        Ok(RegisteredDataset {
            id: format!("{}/data/{}/versions/2", workspace.id, spec.name),
            name: spec.name.clone(),
            version: 2,
        })
    }
}

#[async_trait]
impl PipelineService for FakePlatform {
    async fn publish(
        &self,
        workspace: &Workspace,
        pipeline: &Pipeline,
        request: &PublishRequest,
    ) -> TrainflowResult<PublishedPipeline> {
        self.enter("publish")?;
        self.recorded()
            .published
            .push((pipeline.clone(), request.clone()));
        Ok(PublishedPipeline {
            id: format!(
                "{}/components/{}/versions/{}",
                workspace.id, request.name, request.version
            ),
            name: request.name.clone(),
            version: request.version.clone(),
        })
    }

    async fn submit(
        &self,
        _workspace: &Workspace,
        _pipeline: &PublishedPipeline,
        experiment_name: &str,
    ) -> TrainflowResult<PipelineRun> {
        self.enter("submit")?;
        self.recorded().experiments.push(experiment_name.to_string());
        Ok(PipelineRun {
            id: "run-1".into(),
            experiment_name: experiment_name.to_string(),
            status: "NotStarted".into(),
            portal_url: Some("https://ml.azure.com/runs/run-1".into()),
        })
    }
}
