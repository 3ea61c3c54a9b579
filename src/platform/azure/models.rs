// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 trainflow contributors

//! Resource Manager wire types
//!
//! Only the fields trainflow reads are modelled; everything else in the
//! responses is ignored.

use serde::{Deserialize, Serialize};

/// Standard ARM resource envelope
#[derive(Debug, Deserialize)]
pub struct ArmResource<P> {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub location: Option<String>,
    pub properties: P,
}

/// Paged list envelope
#[derive(Debug, Deserialize)]
pub struct ArmList<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
    #[serde(rename = "nextLink", default)]
    pub next_link: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Empty {}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputeProperties {
    #[serde(default)]
    pub provisioning_state: Option<String>,
    #[serde(default)]
    pub properties: Option<AmlComputeProperties>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmlComputeProperties {
    #[serde(default)]
    pub vm_size: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatastoreProperties {
    #[serde(default)]
    pub account_name: Option<String>,
    #[serde(default)]
    pub container_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobProperties {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub services: Option<JobServices>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct JobServices {
    #[serde(default)]
    pub studio: Option<JobService>,
}

#[derive(Debug, Default, Deserialize)]
pub struct JobService {
    #[serde(default)]
    pub endpoint: Option<String>,
}

/// Request body wrapper: `{"properties": ...}`
#[derive(Debug, Serialize)]
pub struct PropertiesBody<T> {
    pub properties: T,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputeRequest {
    pub compute_type: &'static str,
    pub properties: AmlComputeRequest,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AmlComputeRequest {
    pub vm_size: String,
    pub scale_settings: ScaleSettings,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScaleSettings {
    pub min_node_count: u32,
    pub max_node_count: u32,
}

/// Compute creation also needs the workspace location at the top level
#[derive(Debug, Serialize)]
pub struct LocatedBody<T> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub properties: T,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobDatastoreRequest {
    pub datastore_type: &'static str,
    pub account_name: String,
    pub container_name: String,
    pub endpoint: &'static str,
    pub protocol: &'static str,
    pub credentials: SasCredentials,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SasCredentials {
    pub credentials_type: &'static str,
    pub secrets: SasSecrets,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SasSecrets {
    pub secrets_type: &'static str,
    pub sas_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataVersionRequest {
    pub data_type: &'static str,
    pub data_uri: String,
    pub description: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentVersionRequest {
    pub description: String,
    pub is_anonymous: bool,
    pub component_spec: serde_json::Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineJobRequest {
    pub job_type: &'static str,
    pub experiment_name: String,
    pub display_name: String,
    pub component_id: String,
}
