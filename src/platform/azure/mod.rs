// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 trainflow contributors

//! Azure Machine Learning over the Resource Manager REST API
//!
//! A single [`AzureMlClient`] implements every platform trait. Each call is
//! one request (compute creation additionally polls until provisioning
//! settles); nothing is retried.

mod auth;
mod models;

pub use auth::ServicePrincipalAuth;

use async_trait::async_trait;
use reqwest::header::IF_NONE_MATCH;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::{Duration, Instant};

use crate::config::{PlatformEndpoints, WorkspaceIdentity};
use crate::errors::{TrainflowError, TrainflowResult};
use crate::pipeline::{Pipeline, PipelineSpec};
use crate::platform::{
    BlobContainerSpec, ComputeProvider, ComputeTarget, Datastore, DatasetRegistry,
    DatastoreRegistry, FileDatasetSpec, PipelineRun, PipelineService, ProvisioningState,
    PublishRequest, PublishedPipeline, RegisteredDataset, Workspace, WorkspaceResolver,
};

use models::*;

const API_VERSION: &str = "2023-10-01";
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// REST client for one service principal
pub struct AzureMlClient {
    http: Client,
    management: Url,
    auth: ServicePrincipalAuth,
    compute_max_nodes: u32,
    provisioning_timeout: Duration,
    poll_interval: Duration,
}

impl AzureMlClient {
    pub fn new(identity: &WorkspaceIdentity, endpoints: &PlatformEndpoints) -> TrainflowResult<Self> {
        let http = Client::builder()
            .timeout(endpoints.timeout)
            .build()
            .map_err(|e| TrainflowError::http("build HTTP client", e))?;

        let management = Url::parse(&endpoints.management_endpoint).map_err(|e| {
            TrainflowError::InvalidConfiguration {
                key: "AML_MANAGEMENT_ENDPOINT".into(),
                reason: e.to_string(),
            }
        })?;

        if management.cannot_be_a_base() {
            return Err(TrainflowError::InvalidConfiguration {
                key: "AML_MANAGEMENT_ENDPOINT".into(),
                reason: "not a base URL".into(),
            });
        }

        Ok(Self {
            http,
            management,
            auth: ServicePrincipalAuth::new(
                &endpoints.authority_host,
                &endpoints.management_endpoint,
                &identity.tenant_id,
                identity.service_principal.clone(),
            ),
            compute_max_nodes: endpoints.compute_max_nodes,
            provisioning_timeout: endpoints.timeout,
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    /// Override how often compute provisioning is polled
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Resource id of a workspace
    fn workspace_id(identity: &WorkspaceIdentity) -> String {
        format!(
            "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.MachineLearningServices/workspaces/{}",
            identity.subscription_id, identity.resource_group, identity.workspace_name
        )
    }

    /// URL for `resource_id` followed by extra (percent-encoded) path segments
    fn url(&self, resource_id: &str, segments: &[&str]) -> Url {
        let mut url = self.management.clone();
        {
            // Checked in `new`
            if let Ok(mut path) = url.path_segments_mut() {
                path.pop_if_empty();
                path.extend(resource_id.split('/').filter(|s| !s.is_empty()));
                path.extend(segments);
            }
        }
        url.query_pairs_mut().append_pair("api-version", API_VERSION);
        url
    }

    async fn send(&self, operation: &str, request: RequestBuilder) -> TrainflowResult<Response> {
        let token = self.auth.token(&self.http).await?;
        request
            .bearer_auth(token.expose())
            .send()
            .await
            .map_err(|e| TrainflowError::http(operation, e))
    }

    async fn check(operation: &str, response: Response) -> TrainflowResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(TrainflowError::platform(operation, status.as_u16(), &body))
    }

    async fn decode<T: DeserializeOwned>(operation: &str, response: Response) -> TrainflowResult<T> {
        response
            .json::<T>()
            .await
            .map_err(|e| TrainflowError::http(operation, e))
    }

    /// GET a resource, `None` on 404
    async fn get_optional<T: DeserializeOwned>(
        &self,
        operation: &str,
        url: Url,
    ) -> TrainflowResult<Option<T>> {
        let response = self.send(operation, self.http.get(url)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = Self::check(operation, response).await?;
        Self::decode(operation, response).await.map(Some)
    }

    async fn put<B: Serialize, T: DeserializeOwned>(
        &self,
        operation: &str,
        request: RequestBuilder,
        body: &B,
    ) -> TrainflowResult<T> {
        let response = self.send(operation, request.json(body)).await?;
        let response = Self::check(operation, response).await?;
        Self::decode(operation, response).await
    }

    fn compute_target(resource: ArmResource<ComputeProperties>) -> ComputeTarget {
        let state = resource
            .properties
            .provisioning_state
            .as_deref()
            .map(ProvisioningState::parse)
            .unwrap_or(ProvisioningState::Unknown);

        ComputeTarget {
            id: resource.id,
            name: resource.name,
            vm_size: resource.properties.properties.and_then(|p| p.vm_size),
            state,
        }
    }

    /// Poll a compute target until it leaves the transitional states
    async fn wait_for_provisioning(
        &self,
        workspace: &Workspace,
        mut target: ComputeTarget,
    ) -> TrainflowResult<ComputeTarget> {
        let deadline = Instant::now() + self.provisioning_timeout;

        while matches!(
            target.state,
            ProvisioningState::Creating | ProvisioningState::Updating
        ) && Instant::now() < deadline
        {
            tracing::debug!(compute = %target.name, state = %target.state, "waiting for provisioning");
            tokio::time::sleep(self.poll_interval).await;

            let url = self.url(&workspace.id, &["computes", &target.name]);
            match self
                .get_optional::<ArmResource<ComputeProperties>>("get compute", url)
                .await?
            {
                Some(resource) => target = Self::compute_target(resource),
                None => {
                    target.state = ProvisioningState::Deleting;
                    break;
                }
            }
        }

        Ok(target)
    }

    /// Highest numeric version registered for a data asset
    ///
    /// Follows `nextLink` through every page. Versions exist but none is
    /// numeric: an error, since numbering cannot continue from them.
    async fn latest_data_version(
        &self,
        workspace: &Workspace,
        name: &str,
    ) -> TrainflowResult<Option<u32>> {
        let operation = "list dataset versions";
        let mut next = Some(self.url(&workspace.id, &["data", name, "versions"]));
        let mut latest: Option<u32> = None;
        let mut listed = 0usize;

        while let Some(url) = next.take() {
            let Some(page) = self
                .get_optional::<ArmList<ArmResource<Empty>>>(operation, url)
                .await?
            else {
                break;
            };

            listed += page.value.len();
            latest = page
                .value
                .iter()
                .filter_map(|v| v.name.parse::<u32>().ok())
                .chain(latest)
                .max();

            next = match page.next_link {
                Some(link) => Some(Url::parse(&link).map_err(|e| {
                    TrainflowError::platform(operation, 200, &format!("invalid nextLink '{link}': {e}"))
                })?),
                None => None,
            };
        }

        if latest.is_none() && listed > 0 {
            return Err(TrainflowError::Platform {
                operation: operation.to_string(),
                status: 409,
                message: format!(
                    "data asset '{name}' has {listed} version(s) but none is numeric; cannot choose the next version"
                ),
            });
        }

        Ok(latest)
    }
}

#[async_trait]
impl WorkspaceResolver for AzureMlClient {
    async fn resolve(&self, identity: &WorkspaceIdentity) -> TrainflowResult<Workspace> {
        let operation = "resolve workspace";
        let url = self.url(&Self::workspace_id(identity), &[]);

        let resource = self
            .get_optional::<ArmResource<Empty>>(operation, url)
            .await?
            .ok_or_else(|| TrainflowError::Platform {
                operation: operation.to_string(),
                status: StatusCode::NOT_FOUND.as_u16(),
                message: format!(
                    "workspace '{}' not found in resource group '{}'",
                    identity.workspace_name, identity.resource_group
                ),
            })?;

        Ok(Workspace {
            id: resource.id,
            name: resource.name,
            resource_group: identity.resource_group.clone(),
            subscription_id: identity.subscription_id.clone(),
            location: resource.location,
        })
    }
}

#[async_trait]
impl ComputeProvider for AzureMlClient {
    async fn get_or_create(
        &self,
        workspace: &Workspace,
        name: &str,
        vm_size: &str,
    ) -> TrainflowResult<Option<ComputeTarget>> {
        let url = self.url(&workspace.id, &["computes", name]);

        let target = match self
            .get_optional::<ArmResource<ComputeProperties>>("get compute", url.clone())
            .await?
        {
            Some(resource) => {
                tracing::debug!(compute = %name, "found existing compute target");
                Self::compute_target(resource)
            }
            None => {
                tracing::info!(compute = %name, vm_size = %vm_size, "creating compute target");
                let body = LocatedBody {
                    location: workspace.location.clone(),
                    properties: ComputeRequest {
                        compute_type: "AmlCompute",
                        properties: AmlComputeRequest {
                            vm_size: vm_size.to_string(),
                            scale_settings: ScaleSettings {
                                min_node_count: 0,
                                max_node_count: self.compute_max_nodes,
                            },
                        },
                    },
                };
                let resource: ArmResource<ComputeProperties> = self
                    .put("create compute", self.http.put(url), &body)
                    .await?;
                self.wait_for_provisioning(workspace, Self::compute_target(resource))
                    .await?
            }
        };

        Ok(target.is_active().then_some(target))
    }
}

#[async_trait]
impl DatastoreRegistry for AzureMlClient {
    async fn find(&self, workspace: &Workspace, name: &str) -> TrainflowResult<Option<Datastore>> {
        let url = self.url(&workspace.id, &["datastores", name]);

        Ok(self
            .get_optional::<ArmResource<DatastoreProperties>>("get datastore", url)
            .await?
            .map(|resource| Datastore {
                id: resource.id,
                name: resource.name,
                container_name: resource.properties.container_name,
                account_name: resource.properties.account_name,
            }))
    }

    async fn register_blob_container(
        &self,
        workspace: &Workspace,
        spec: &BlobContainerSpec,
        overwrite: bool,
    ) -> TrainflowResult<Datastore> {
        let url = self.url(&workspace.id, &["datastores", &spec.datastore_name]);
        let body = PropertiesBody {
            properties: BlobDatastoreRequest {
                datastore_type: "AzureBlob",
                account_name: spec.account_name.clone(),
                container_name: spec.container_name.clone(),
                endpoint: "core.windows.net",
                protocol: "https",
                credentials: SasCredentials {
                    credentials_type: "Sas",
                    secrets: SasSecrets {
                        secrets_type: "Sas",
                        sas_token: spec.sas_token.expose().to_string(),
                    },
                },
            },
        };

        let mut request = self.http.put(url);
        if !overwrite {
            request = request.header(IF_NONE_MATCH, "*");
        }

        let resource: ArmResource<DatastoreProperties> =
            self.put("register datastore", request, &body).await?;

        Ok(Datastore {
            id: resource.id,
            name: resource.name,
            container_name: resource
                .properties
                .container_name
                .or_else(|| Some(spec.container_name.clone())),
            account_name: resource
                .properties
                .account_name
                .or_else(|| Some(spec.account_name.clone())),
        })
    }
}

#[async_trait]
impl DatasetRegistry for AzureMlClient {
    async fn register_files(
        &self,
        workspace: &Workspace,
        datastore: &Datastore,
        spec: &FileDatasetSpec,
        create_new_version: bool,
    ) -> TrainflowResult<RegisteredDataset> {
        let latest = self.latest_data_version(workspace, &spec.name).await?;

        let version = match (latest, create_new_version) {
            (Some(v), false) => {
                return Ok(RegisteredDataset {
                    id: format!("{}/data/{}/versions/{}", workspace.id, spec.name, v),
                    name: spec.name.clone(),
                    version: v,
                });
            }
            (Some(v), true) => v + 1,
            (None, _) => 1,
        };

        let version_segment = version.to_string();
        let url = self.url(&workspace.id, &["data", &spec.name, "versions", &version_segment]);
        let body = PropertiesBody {
            properties: DataVersionRequest {
                data_type: "uri_folder",
                data_uri: format!(
                    "azureml://datastores/{}/paths/{}",
                    datastore.name,
                    spec.path.trim_matches('/')
                ),
                description: spec.description.clone(),
            },
        };

        let resource: ArmResource<Empty> = self
            .put("register dataset", self.http.put(url), &body)
            .await?;

        Ok(RegisteredDataset {
            id: resource.id,
            name: spec.name.clone(),
            version,
        })
    }
}

#[async_trait]
impl PipelineService for AzureMlClient {
    async fn publish(
        &self,
        workspace: &Workspace,
        pipeline: &Pipeline,
        request: &PublishRequest,
    ) -> TrainflowResult<PublishedPipeline> {
        let mut spec = PipelineSpec::from_pipeline(pipeline, &request.version);
        spec.name = request.name.clone();
        spec.description = Some(request.description.clone());
        let component_spec = spec.to_json()?;

        let url = self.url(
            &workspace.id,
            &["components", &request.name, "versions", &request.version],
        );
        let body = PropertiesBody {
            properties: ComponentVersionRequest {
                description: request.description.clone(),
                is_anonymous: false,
                component_spec,
            },
        };

        let resource: ArmResource<Empty> = self
            .put("publish pipeline", self.http.put(url), &body)
            .await?;

        Ok(PublishedPipeline {
            id: resource.id,
            name: request.name.clone(),
            version: request.version.clone(),
        })
    }

    async fn submit(
        &self,
        workspace: &Workspace,
        pipeline: &PublishedPipeline,
        experiment_name: &str,
    ) -> TrainflowResult<PipelineRun> {
        let job_name = uuid::Uuid::new_v4().simple().to_string();
        let url = self.url(&workspace.id, &["jobs", &job_name]);
        let body = PropertiesBody {
            properties: PipelineJobRequest {
                job_type: "Pipeline",
                experiment_name: experiment_name.to_string(),
                display_name: format!("{} {}", pipeline.name, pipeline.version),
                component_id: pipeline.id.clone(),
            },
        };

        let resource: ArmResource<JobProperties> = self
            .put("submit pipeline run", self.http.put(url), &body)
            .await?;

        Ok(PipelineRun {
            id: resource.name,
            experiment_name: experiment_name.to_string(),
            status: resource
                .properties
                .status
                .unwrap_or_else(|| "NotStarted".to_string()),
            portal_url: resource
                .properties
                .services
                .and_then(|s| s.studio)
                .and_then(|s| s.endpoint),
        })
    }
}
