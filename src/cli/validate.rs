// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 trainflow contributors

//! Validate command - check settings and the pipeline definition

use colored::Colorize;
use miette::Result;
use std::path::Path;

use super::load_settings;
use crate::pipeline::{is_valid_resource_name, PipelineValidator, StepFingerprint};
use crate::training::offline_pipeline;

/// Run the validate command
pub async fn run(env_file: Option<&Path>, verbose: bool) -> Result<()> {
    println!("{}", "Validating pipeline...".bold());
    println!();

    let settings = match load_settings(env_file) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("  {} Settings are incomplete", "✗".red());
            eprintln!();
            return Err(e);
        }
    };
    println!("  {} All required settings are present", "✓".green());

    let pipeline = offline_pipeline(&settings)?;
    println!(
        "  {} Pipeline definition built ({} steps)",
        "✓".green(),
        pipeline.steps.len()
    );

    let mut validation = PipelineValidator::validate(&pipeline);
    if !is_valid_resource_name(&settings.experiment_name) {
        validation.add_warning(&format!(
            "Experiment name '{}' does not match the platform naming rule",
            settings.experiment_name
        ));
    }

    if !validation.errors.is_empty() {
        println!();
        println!("{}:", "Errors".red().bold());
        for error in &validation.errors {
            println!("  {} {}", "✗".red(), error);
        }
    }

    if !validation.warnings.is_empty() {
        println!();
        println!("{}:", "Warnings".yellow().bold());
        for warning in &validation.warnings {
            println!("  {} {}", "⚠".yellow(), warning);
        }
    }

    if verbose {
        println!();
        println!("{}:", "Settings".bold());
        for (key, value) in settings.summary() {
            println!("  {} = {}", key, value);
        }

        println!();
        println!("{}:", "Pipeline summary".bold());
        println!("  Name: {}", pipeline.name);
        println!("  Version: {}", settings.build_id);
        println!("  Parameters: {}", pipeline.parameters().len());
        println!("  Steps: {}", pipeline.steps.len());
        for step in &pipeline.steps {
            let deps = if step.dependency_names().is_empty() {
                String::new()
            } else {
                format!(" [after: {}]", step.dependency_names().join(", "))
            };
            let fingerprint = StepFingerprint::of(step);
            println!(
                "    - {} ({}){} {}",
                step.name,
                step.script_name,
                deps.dimmed(),
                fingerprint[..12].dimmed()
            );
        }
    }

    println!();

    if !validation.is_valid() {
        Err(miette::miette!("Pipeline validation failed"))
    } else if validation.has_warnings() {
        println!("{}", "Pipeline is valid but has warnings.".yellow().bold());
        Ok(())
    } else {
        println!("{}", "Pipeline is valid!".green().bold());
        Ok(())
    }
}
