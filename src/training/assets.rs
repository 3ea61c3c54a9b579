// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 trainflow contributors

//! Fixed data assets and environment of the training pipeline

use chrono::{DateTime, Utc};
use reqwest::Url;

use crate::config::{Secret, Settings};
use crate::pipeline::RunConfiguration;
use crate::platform::{BlobContainerSpec, FileDatasetSpec};

pub const DATASTORE_NAME: &str = "mtcseattle";
pub const CONTAINER_NAME: &str = "azure-service-classifier";
pub const ACCOUNT_NAME: &str = "mtcseattle";

/// Read/list token for the public sample container
pub const DEFAULT_SAS_TOKEN: &str = "?sv=2020-04-08&st=2021-05-26T04%3A39%3A46Z&se=2022-05-27T04%3A39%3A00Z&sr=c&sp=rl&sig=CTFMEu24bo2X06G%2B%2F2aKiiPZBzvlWHELe15rNFqULUk%3D";

pub const DATASET_NAME: &str = "Azure Services Dataset";
pub const DATASET_DESCRIPTION: &str = "Dataset containing azure related posts on Stackoverflow";
pub const DATASET_PATH: &str = "data";

pub const DATASET_INPUT_NAME: &str = "azureservicedata";
pub const DATASET_MOUNT_PATH: &str = "/tmp/data";

const CONDA_PACKAGES: &[&str] = &["numpy", "pandas", "scikit-learn", "keras"];

const PIP_PACKAGES: &[&str] = &[
    "azureml-core==1.25.0",
    "azureml-defaults==1.25.0",
    "azureml-telemetry==1.25.0",
    "azureml-train-restclients-hyperdrive==1.25.0",
    "azureml-train-core==1.25.0",
    "azureml-dataprep",
    "tensorflow-gpu==2.0.0",
    "transformers==2.0.0",
    "absl-py",
    "azureml-dataprep",
    "h5py<3.0.0",
];

/// Blob container the training data lives in
pub fn datastore_spec(settings: &Settings) -> BlobContainerSpec {
    BlobContainerSpec {
        datastore_name: DATASTORE_NAME.to_string(),
        container_name: CONTAINER_NAME.to_string(),
        account_name: ACCOUNT_NAME.to_string(),
        sas_token: settings
            .datastore_sas_token
            .clone()
            .unwrap_or_else(|| Secret::new(DEFAULT_SAS_TOKEN)),
    }
}

pub fn dataset_spec() -> FileDatasetSpec {
    FileDatasetSpec {
        name: DATASET_NAME.to_string(),
        description: DATASET_DESCRIPTION.to_string(),
        path: DATASET_PATH.to_string(),
    }
}

/// Environment shared by both steps
pub fn run_configuration() -> RunConfiguration {
    RunConfiguration::new(CONDA_PACKAGES.iter().copied(), PIP_PACKAGES.iter().copied())
}

/// Validity window encoded in a shared access signature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SasWindow {
    /// `st`
    pub starts: Option<DateTime<Utc>>,
    /// `se`
    pub expires: Option<DateTime<Utc>>,
}

impl SasWindow {
    /// Read `st` and `se` from a token; unparseable fields are left empty
    pub fn parse(token: &str) -> Self {
        let query = token.trim_start_matches('?');
        let Ok(url) = Url::parse(&format!("https://sas.invalid/?{}", query)) else {
            return Self::default();
        };

        let mut window = Self::default();
        for (key, value) in url.query_pairs() {
            let parsed = DateTime::parse_from_rfc3339(&value)
                .ok()
                .map(|t| t.with_timezone(&Utc));
            match key.as_ref() {
                "st" => window.starts = parsed,
                "se" => window.expires = parsed,
                _ => {}
            }
        }
        window
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires.is_some_and(|expires| expires <= now)
    }

    pub fn is_pending_at(&self, now: DateTime<Utc>) -> bool {
        self.starts.is_some_and(|starts| starts > now)
    }
}
