// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 trainflow contributors

//! Train/evaluate pipeline definition
//!
//! Pure construction: nothing here talks to the platform, so the same
//! definition backs `run`, `validate` and `graph`.

use std::sync::Arc;

use crate::config::Settings;
use crate::errors::TrainflowResult;
use crate::pipeline::{DatasetInput, Pipeline, PipelineParameter, PipelineStep, StepArgument};
use crate::platform::{ComputeTarget, ProvisioningState};
use crate::training::assets;

pub const TRAIN_STEP_NAME: &str = "Train Model";
pub const EVALUATE_STEP_NAME: &str = "Evaluate Model";
pub const PIPELINE_DESCRIPTION: &str = "Model training/retraining pipeline.";

/// The seven parameters a training run can override
#[derive(Debug, Clone)]
pub struct TrainingParameters {
    pub model_name: Arc<PipelineParameter>,
    pub max_seq_length: Arc<PipelineParameter>,
    pub learning_rate: Arc<PipelineParameter>,
    pub num_epochs: Arc<PipelineParameter>,
    pub export_dir: Arc<PipelineParameter>,
    pub batch_size: Arc<PipelineParameter>,
    pub steps_per_epoch: Arc<PipelineParameter>,
}

impl TrainingParameters {
    pub fn declare(settings: &Settings) -> Self {
        Self {
            model_name: PipelineParameter::new("model_name", settings.model_name.as_str()),
            max_seq_length: PipelineParameter::new("max_seq_length", 128_i64),
            learning_rate: PipelineParameter::new("learning_rate", 3e-5),
            num_epochs: PipelineParameter::new("num_epochs", 1_i64),
            export_dir: PipelineParameter::new("export_dir", "./outputs/exports"),
            batch_size: PipelineParameter::new("batch_size", 32_i64),
            steps_per_epoch: PipelineParameter::new("steps_per_epoch", 1_i64),
        }
    }

    /// All parameters in declaration order
    pub fn all(&self) -> [&Arc<PipelineParameter>; 7] {
        [
            &self.model_name,
            &self.max_seq_length,
            &self.learning_rate,
            &self.num_epochs,
            &self.export_dir,
            &self.batch_size,
            &self.steps_per_epoch,
        ]
    }
}

/// Assemble the two-step pipeline
///
/// Evaluate runs after Train; the pipeline is built from Evaluate alone and
/// Train is picked up through that edge.
pub fn training_pipeline(
    settings: &Settings,
    params: &TrainingParameters,
    compute: Option<ComputeTarget>,
    input: DatasetInput,
) -> TrainflowResult<Pipeline> {
    let run_config = assets::run_configuration();

    let train = Arc::new(
        PipelineStep::new(
            TRAIN_STEP_NAME,
            settings.train_script_path.as_str(),
            settings.sources_dir_train.clone(),
        )
        .with_arguments(vec![
            "--data_dir".into(),
            StepArgument::Input(input),
            "--max_seq_length".into(),
            (&params.max_seq_length).into(),
            "--batch_size".into(),
            (&params.batch_size).into(),
            "--learning_rate".into(),
            (&params.learning_rate).into(),
            "--steps_per_epoch".into(),
            (&params.steps_per_epoch).into(),
            "--num_epochs".into(),
            (&params.num_epochs).into(),
            "--export_dir".into(),
            (&params.export_dir).into(),
        ])
        .with_compute(compute.clone())
        .with_run_config(run_config.clone())
        .with_allow_reuse(true),
    );
    tracing::debug!(step = TRAIN_STEP_NAME, "step created");

    let mut evaluate = PipelineStep::new(
        EVALUATE_STEP_NAME,
        settings.evaluate_script_path.as_str(),
        settings.sources_dir_train.clone(),
    )
    .with_arguments(vec![
        "--model_name".into(),
        (&params.model_name).into(),
        "--build_id".into(),
        StepArgument::literal(settings.build_id.as_str()),
    ])
    .with_compute(compute)
    .with_run_config(run_config)
    .with_allow_reuse(false);
    tracing::debug!(step = EVALUATE_STEP_NAME, "step created");

    evaluate.run_after(&train);

    Ok(
        Pipeline::from_steps(settings.pipeline_name.as_str(), vec![Arc::new(evaluate)])?
            .with_description(PIPELINE_DESCRIPTION),
    )
}

/// Definition built without contacting the platform
///
/// Compute and dataset handles are placeholders named after the configured
/// cluster and the fixed dataset, for validation and rendering only.
pub fn offline_pipeline(settings: &Settings) -> TrainflowResult<Pipeline> {
    let compute = ComputeTarget {
        id: format!("computes/{}", settings.compute_name),
        name: settings.compute_name.clone(),
        vm_size: Some(settings.compute_sku.clone()),
        state: ProvisioningState::Unknown,
    };
    let input = DatasetInput {
        input_name: assets::DATASET_INPUT_NAME.to_string(),
        dataset_id: format!("azureml:{}:latest", assets::DATASET_NAME),
        mount_path: assets::DATASET_MOUNT_PATH.to_string(),
    };

    let params = TrainingParameters::declare(settings);
    training_pipeline(settings, &params, Some(compute), input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::sample_settings;
    use crate::pipeline::{DagBuilder, ParameterValue, PipelineValidator};

    fn input() -> DatasetInput {
        DatasetInput {
            input_name: assets::DATASET_INPUT_NAME.into(),
            dataset_id: "azureml:Azure Services Dataset:2".into(),
            mount_path: assets::DATASET_MOUNT_PATH.into(),
        }
    }

    fn compute() -> ComputeTarget {
        ComputeTarget {
            id: "/computes/train-cluster".into(),
            name: "train-cluster".into(),
            vm_size: Some("STANDARD_NC6".into()),
            state: ProvisioningState::Succeeded,
        }
    }

    fn build(settings: &Settings, compute: Option<ComputeTarget>) -> Pipeline {
        let params = TrainingParameters::declare(settings);
        training_pipeline(settings, &params, compute, input()).unwrap()
    }

    #[test]
    fn test_parameter_defaults() {
        let params = TrainingParameters::declare(&sample_settings());

        let defaults: Vec<(&str, ParameterValue)> = params
            .all()
            .iter()
            .map(|p| (p.name(), p.default_value().clone()))
            .collect();

        assert_eq!(
            defaults,
            vec![
                ("model_name", ParameterValue::from("azure-service-classifier")),
                ("max_seq_length", ParameterValue::Int(128)),
                ("learning_rate", ParameterValue::Float(3e-5)),
                ("num_epochs", ParameterValue::Int(1)),
                ("export_dir", ParameterValue::from("./outputs/exports")),
                ("batch_size", ParameterValue::Int(32)),
                ("steps_per_epoch", ParameterValue::Int(1)),
            ]
        );
    }

    #[test]
    fn test_train_is_discovered_through_evaluate() {
        let pipeline = build(&sample_settings(), Some(compute()));

        assert_eq!(pipeline.step_names(), vec![TRAIN_STEP_NAME, EVALUATE_STEP_NAME]);
        assert_eq!(pipeline.description.as_deref(), Some(PIPELINE_DESCRIPTION));
        assert_eq!(pipeline.name, "training-pipeline");

        let dag = DagBuilder::build(&pipeline).unwrap();
        assert!(dag.depends_on(EVALUATE_STEP_NAME, TRAIN_STEP_NAME));
        assert!(!dag.depends_on(TRAIN_STEP_NAME, EVALUATE_STEP_NAME));
    }

    #[test]
    fn test_evaluate_depends_on_train_for_any_configuration() {
        let mut settings = sample_settings();
        for (model, build_id) in [("m", "1"), ("other-model", "2025.10.19"), ("x y", "")] {
            settings.model_name = model.into();
            settings.build_id = build_id.into();

            for compute in [Some(compute()), None] {
                let pipeline = build(&settings, compute);
                let evaluate = pipeline.get_step(EVALUATE_STEP_NAME).unwrap();
                assert_eq!(evaluate.dependency_names(), vec![TRAIN_STEP_NAME]);
                assert!(pipeline
                    .get_step(TRAIN_STEP_NAME)
                    .unwrap()
                    .dependency_names()
                    .is_empty());
            }
        }
    }

    #[test]
    fn test_reuse_flags() {
        let pipeline = build(&sample_settings(), Some(compute()));
        assert!(pipeline.get_step(TRAIN_STEP_NAME).unwrap().allow_reuse);
        assert!(!pipeline.get_step(EVALUATE_STEP_NAME).unwrap().allow_reuse);
    }

    #[test]
    fn test_step_command_lines() {
        let pipeline = build(&sample_settings(), Some(compute()));

        let train = pipeline.get_step(TRAIN_STEP_NAME).unwrap();
        assert_eq!(
            train.command_line(),
            "python training/train.py --data_dir ${{inputs.azureservicedata}} \
             --max_seq_length ${{inputs.max_seq_length}} \
             --batch_size ${{inputs.batch_size}} \
             --learning_rate ${{inputs.learning_rate}} \
             --steps_per_epoch ${{inputs.steps_per_epoch}} \
             --num_epochs ${{inputs.num_epochs}} \
             --export_dir ${{inputs.export_dir}}"
        );
        assert_eq!(train.source_directory, std::path::PathBuf::from("code"));

        let evaluate = pipeline.get_step(EVALUATE_STEP_NAME).unwrap();
        assert_eq!(
            evaluate.command_line(),
            "python evaluate/evaluate_model.py --model_name ${{inputs.model_name}} --build_id 20251019.3"
        );
    }

    #[test]
    fn test_steps_share_compute_and_environment() {
        let pipeline = build(&sample_settings(), Some(compute()));
        let train = pipeline.get_step(TRAIN_STEP_NAME).unwrap();
        let evaluate = pipeline.get_step(EVALUATE_STEP_NAME).unwrap();

        assert_eq!(train.compute_target, Some(compute()));
        assert_eq!(train.compute_target, evaluate.compute_target);
        assert_eq!(train.run_config, evaluate.run_config);
        assert_eq!(pipeline.parameters().len(), 7);
    }

    #[test]
    fn test_offline_pipeline_is_valid() {
        let pipeline = offline_pipeline(&sample_settings()).unwrap();
        let result = PipelineValidator::validate(&pipeline);

        assert!(result.is_valid());
        assert!(!result.has_warnings());

        let train = pipeline.get_step(TRAIN_STEP_NAME).unwrap();
        let compute = train.compute_target.as_ref().unwrap();
        assert_eq!(compute.name, "train-cluster");
        assert_eq!(
            train.inputs().next().map(|i| i.dataset_id.as_str()),
            Some("azureml:Azure Services Dataset:latest")
        );
    }

    #[test]
    fn test_missing_compute_only_warns() {
        let pipeline = build(&sample_settings(), None);
        let result = PipelineValidator::validate(&pipeline);

        assert!(result.is_valid());
        assert!(result
            .warnings
            .iter()
            .any(|w| w.contains("no compute target")));
    }
}
