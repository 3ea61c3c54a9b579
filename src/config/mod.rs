// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 trainflow contributors

//! Environment-sourced configuration
//!
//! All settings are read once at startup into [`Settings`] and passed by
//! reference from there on.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::{TrainflowError, TrainflowResult};

const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";
const DEFAULT_MANAGEMENT_ENDPOINT: &str = "https://management.azure.com";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 300;
const DEFAULT_COMPUTE_MAX_NODES: u32 = 4;

/// Variables that must be present for any command
pub const REQUIRED_KEYS: [&str; 16] = [
    "WS_NAME",
    "RG_NAME",
    "SUBSCRIPTION_ID",
    "TENANT_ID",
    "SP_APP_ID",
    "SP_APP_SECRET",
    "SOURCES_DIR_TRAIN",
    "TRAIN_SCRIPT_PATH",
    "EVALUATE_SCRIPT_PATH",
    "AML_COMPUTE_CLUSTER_SKU",
    "AML_COMPUTE_CLUSTER_NAME",
    "AKS_CLUSTER_NAME",
    "MODEL_NAME",
    "BUILD_BUILDID",
    "TRAINING_PIPELINE_NAME",
    "EXPERIMENT_NAME",
];

/// A string that never prints its contents
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Access the underlying value
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

/// Service principal credentials
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServicePrincipal {
    pub app_id: String,
    pub secret: Secret,
}

/// Everything needed to locate and authenticate against a workspace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceIdentity {
    pub workspace_name: String,
    pub resource_group: String,
    pub subscription_id: String,
    pub tenant_id: String,
    pub service_principal: ServicePrincipal,
}

/// REST endpoint tuning, all optional
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformEndpoints {
    pub authority_host: String,
    pub management_endpoint: String,
    pub timeout: Duration,
    pub compute_max_nodes: u32,
}

impl Default for PlatformEndpoints {
    fn default() -> Self {
        Self {
            authority_host: DEFAULT_AUTHORITY_HOST.to_string(),
            management_endpoint: DEFAULT_MANAGEMENT_ENDPOINT.to_string(),
            timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            compute_max_nodes: DEFAULT_COMPUTE_MAX_NODES,
        }
    }
}

/// Process-wide settings, loaded once
#[derive(Debug, Clone)]
pub struct Settings {
    pub identity: WorkspaceIdentity,
    pub sources_dir_train: PathBuf,
    pub train_script_path: String,
    pub evaluate_script_path: String,
    pub compute_sku: String,
    pub compute_name: String,
    /// Read for completeness; deployment to AKS is not part of the training run
    pub aks_cluster_name: String,
    pub model_name: String,
    pub build_id: String,
    pub pipeline_name: String,
    pub experiment_name: String,
    /// Overrides the built-in datastore SAS token when set
    pub datastore_sas_token: Option<Secret>,
    pub endpoints: PlatformEndpoints,
}

impl Settings {
    /// Load settings from the process environment
    pub fn from_env() -> TrainflowResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings through an arbitrary key lookup
    ///
    /// Blank values count as missing. Every missing key is reported in one
    /// error rather than failing on the first.
    pub fn from_lookup<F>(lookup: F) -> TrainflowResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let missing: Vec<String> = REQUIRED_KEYS
            .iter()
            .copied()
            .filter(|&key| get(key).is_none())
            .map(str::to_string)
            .collect();

        if !missing.is_empty() {
            return Err(TrainflowError::MissingConfiguration { keys: missing });
        }

        let required = |key: &str| get(key).unwrap_or_default();

        let endpoints = PlatformEndpoints {
            authority_host: get("AML_AUTHORITY_HOST")
                .unwrap_or_else(|| DEFAULT_AUTHORITY_HOST.to_string()),
            management_endpoint: get("AML_MANAGEMENT_ENDPOINT")
                .unwrap_or_else(|| DEFAULT_MANAGEMENT_ENDPOINT.to_string()),
            timeout: Duration::from_secs(parse_or(
                "AML_HTTP_TIMEOUT_SECS",
                get("AML_HTTP_TIMEOUT_SECS"),
                DEFAULT_HTTP_TIMEOUT_SECS,
            )?),
            compute_max_nodes: parse_or(
                "AML_COMPUTE_MAX_NODES",
                get("AML_COMPUTE_MAX_NODES"),
                DEFAULT_COMPUTE_MAX_NODES,
            )?,
        };

        if endpoints.timeout.is_zero() {
            return Err(TrainflowError::InvalidConfiguration {
                key: "AML_HTTP_TIMEOUT_SECS".into(),
                reason: "must be greater than zero".into(),
            });
        }

        Ok(Self {
            identity: WorkspaceIdentity {
                workspace_name: required("WS_NAME"),
                resource_group: required("RG_NAME"),
                subscription_id: required("SUBSCRIPTION_ID"),
                tenant_id: required("TENANT_ID"),
                service_principal: ServicePrincipal {
                    app_id: required("SP_APP_ID"),
                    secret: Secret::new(required("SP_APP_SECRET")),
                },
            },
            sources_dir_train: PathBuf::from(required("SOURCES_DIR_TRAIN")),
            train_script_path: required("TRAIN_SCRIPT_PATH"),
            evaluate_script_path: required("EVALUATE_SCRIPT_PATH"),
            compute_sku: required("AML_COMPUTE_CLUSTER_SKU"),
            compute_name: required("AML_COMPUTE_CLUSTER_NAME"),
            aks_cluster_name: required("AKS_CLUSTER_NAME"),
            model_name: required("MODEL_NAME"),
            build_id: required("BUILD_BUILDID"),
            pipeline_name: required("TRAINING_PIPELINE_NAME"),
            experiment_name: required("EXPERIMENT_NAME"),
            datastore_sas_token: get("DATASTORE_SAS_TOKEN").map(Secret::new),
            endpoints,
        })
    }

    /// Key/value pairs for display, with secrets redacted
    pub fn summary(&self) -> Vec<(&'static str, String)> {
        vec![
            ("WS_NAME", self.identity.workspace_name.clone()),
            ("RG_NAME", self.identity.resource_group.clone()),
            ("SUBSCRIPTION_ID", self.identity.subscription_id.clone()),
            ("TENANT_ID", self.identity.tenant_id.clone()),
            ("SP_APP_ID", self.identity.service_principal.app_id.clone()),
            ("SP_APP_SECRET", self.identity.service_principal.secret.to_string()),
            ("SOURCES_DIR_TRAIN", self.sources_dir_train.display().to_string()),
            ("TRAIN_SCRIPT_PATH", self.train_script_path.clone()),
            ("EVALUATE_SCRIPT_PATH", self.evaluate_script_path.clone()),
            ("AML_COMPUTE_CLUSTER_SKU", self.compute_sku.clone()),
            ("AML_COMPUTE_CLUSTER_NAME", self.compute_name.clone()),
            ("AKS_CLUSTER_NAME", self.aks_cluster_name.clone()),
            ("MODEL_NAME", self.model_name.clone()),
            ("BUILD_BUILDID", self.build_id.clone()),
            ("TRAINING_PIPELINE_NAME", self.pipeline_name.clone()),
            ("EXPERIMENT_NAME", self.experiment_name.clone()),
        ]
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, raw: Option<String>, default: T) -> TrainflowResult<T>
where
    T::Err: fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|e: T::Err| TrainflowError::InvalidConfiguration {
                key: key.to_string(),
                reason: format!("'{}': {}", value, e),
            }),
    }
}

/// Load a dotenv file into the process environment
///
/// Variables already present in the environment win. With no explicit path a
/// `.env` in the current directory (or a parent) is loaded when it exists.
pub fn load_env_file(path: Option<&Path>) -> TrainflowResult<Option<PathBuf>> {
    match path {
        Some(path) => {
            dotenvy::from_path(path).map_err(|e| TrainflowError::EnvFile {
                path: path.to_path_buf(),
                error: e.to_string(),
            })?;
            Ok(Some(path.to_path_buf()))
        }
        None => Ok(dotenvy::dotenv().ok()),
    }
}
