// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 trainflow contributors

//! Training pipeline orchestration
//!
//! Drives the platform through one training submission: workspace, compute,
//! datastore, dataset, definition, validation, publish, submit. Every call is
//! awaited in order and nothing is retried.

use chrono::Utc;

use crate::config::Settings;
use crate::errors::TrainflowResult;
use crate::pipeline::{is_valid_resource_name, Pipeline, PipelineValidator, ValidationResult};
use crate::platform::{
    ComputeTarget, Datastore, Platform, PipelineRun, PublishRequest, PublishedPipeline,
    RegisteredDataset, Workspace,
};
use crate::training::assets::{self, SasWindow};
use crate::training::definition::{training_pipeline, TrainingParameters, PIPELINE_DESCRIPTION};

/// Everything produced by one submission
#[derive(Debug)]
pub struct TrainingOutcome {
    pub workspace: Workspace,
    pub compute: Option<ComputeTarget>,
    pub datastore: Datastore,
    pub dataset: RegisteredDataset,
    pub pipeline: Pipeline,
    pub validation: ValidationResult,
    pub published: PublishedPipeline,
    /// Submitted run; never polled
    pub run: PipelineRun,
}

/// Builds, publishes and submits the training pipeline
pub struct TrainingPipelineBuilder {
    platform: Platform,
}

impl TrainingPipelineBuilder {
    pub fn new(platform: Platform) -> Self {
        Self { platform }
    }

    /// Run the full submission against the platform
    pub async fn run(&self, settings: &Settings) -> TrainflowResult<TrainingOutcome> {
        let workspace = self.platform.workspaces.resolve(&settings.identity).await?;
        tracing::info!(%workspace, "workspace resolved");

        let compute = self
            .platform
            .compute
            .get_or_create(&workspace, &settings.compute_name, &settings.compute_sku)
            .await?;
        match compute {
            Some(ref target) => tracing::info!(compute = %target, "compute target ready"),
            None => tracing::warn!(
                compute = %settings.compute_name,
                sku = %settings.compute_sku,
                "compute target not found or not active, steps will have no compute bound"
            ),
        }

        let datastore = self.resolve_datastore(&workspace, settings).await?;

        let dataset = self
            .platform
            .datasets
            .register_files(&workspace, &datastore, &assets::dataset_spec(), true)
            .await?;
        tracing::info!(
            dataset = %dataset.name,
            version = dataset.version,
            "dataset registered"
        );
        let input = dataset.as_mount(assets::DATASET_INPUT_NAME, assets::DATASET_MOUNT_PATH);

        let params = TrainingParameters::declare(settings);
        let pipeline = training_pipeline(settings, &params, compute.clone(), input)?;

        let validation = PipelineValidator::ensure_valid(&pipeline)?;
        for warning in &validation.warnings {
            tracing::warn!(pipeline = %pipeline.name, "{}", warning);
        }
        if !is_valid_resource_name(&settings.experiment_name) {
            tracing::warn!(
                experiment = %settings.experiment_name,
                "experiment name does not match the platform naming rule"
            );
        }

        let request = PublishRequest {
            name: settings.pipeline_name.clone(),
            description: PIPELINE_DESCRIPTION.to_string(),
            version: settings.build_id.clone(),
        };
        let published = self
            .platform
            .pipelines
            .publish(&workspace, &pipeline, &request)
            .await?;
        tracing::info!(
            pipeline = %published.name,
            version = %published.version,
            "published pipeline"
        );

        let run = self
            .platform
            .pipelines
            .submit(&workspace, &published, &settings.experiment_name)
            .await?;
        tracing::info!(
            run = %run.id,
            experiment = %run.experiment_name,
            status = %run.status,
            "pipeline run submitted"
        );

        Ok(TrainingOutcome {
            workspace,
            compute,
            datastore,
            dataset,
            pipeline,
            validation,
            published,
            run,
        })
    }

    /// Look the datastore up once, registering it when absent or when the lookup fails
    async fn resolve_datastore(
        &self,
        workspace: &Workspace,
        settings: &Settings,
    ) -> TrainflowResult<Datastore> {
        let spec = assets::datastore_spec(settings);

        match self.platform.datastores.find(workspace, &spec.datastore_name).await {
            Ok(Some(existing)) => {
                tracing::info!(datastore = %existing.name, "using existing datastore");
                return Ok(existing);
            }
            Ok(None) => {
                tracing::info!(datastore = %spec.datastore_name, "datastore not found, registering");
            }
            Err(e) => {
                tracing::warn!(
                    datastore = %spec.datastore_name,
                    error = %e,
                    "datastore lookup failed, registering"
                );
            }
        }

        let window = SasWindow::parse(spec.sas_token.expose());
        let now = Utc::now();
        if window.is_expired_at(now) {
            tracing::warn!(
                datastore = %spec.datastore_name,
                expires = ?window.expires,
                "datastore SAS token has expired"
            );
        } else if window.is_pending_at(now) {
            tracing::warn!(
                datastore = %spec.datastore_name,
                starts = ?window.starts,
                "datastore SAS token is not valid yet"
            );
        }

        let datastore = self
            .platform
            .datastores
            .register_blob_container(workspace, &spec, true)
            .await?;
        tracing::info!(datastore = %datastore.name, "datastore registered");
        Ok(datastore)
    }
}
