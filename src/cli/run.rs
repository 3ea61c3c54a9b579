// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 trainflow contributors

//! Run command - publish the pipeline and submit a run

use colored::Colorize;
use miette::Result;
use std::path::Path;

use super::load_settings;
use crate::platform::Platform;
use crate::training::{TrainingOutcome, TrainingPipelineBuilder};
use crate::utils::{create_spinner, print_success, print_warning};

/// Run the run command
pub async fn run(env_file: Option<&Path>, verbose: bool) -> Result<()> {
    let settings = load_settings(env_file)?;
    let platform = Platform::azure(&settings)?;

    println!(
        "{} {} {}",
        "Submitting".bold(),
        settings.pipeline_name.cyan(),
        format!("(build {})", settings.build_id).dimmed()
    );

    let spinner = create_spinner(&format!(
        "Working in workspace {}...",
        settings.identity.workspace_name
    ));
    let result = TrainingPipelineBuilder::new(platform).run(&settings).await;
    spinner.finish_and_clear();

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!("  {} {}", "✗".red(), "Submission failed".red().bold());
            return Err(e.into());
        }
    };

    print_outcome(&outcome, verbose);
    Ok(())
}

fn print_outcome(outcome: &TrainingOutcome, verbose: bool) {
    print_success(&format!("Workspace {}", outcome.workspace.name));

    match outcome.compute {
        Some(ref compute) => print_success(&format!("Compute {} ({})", compute.name, compute.state)),
        None => print_warning("Compute target unavailable, steps run without one"),
    }

    print_success(&format!("Datastore {}", outcome.datastore.name));
    print_success(&format!(
        "Dataset {} version {}",
        outcome.dataset.name, outcome.dataset.version
    ));

    for step in &outcome.pipeline.steps {
        print_success(&format!("Step {} created", step.name));
    }

    if verbose {
        for warning in &outcome.validation.warnings {
            print_warning(warning);
        }
    }

    print_success(&format!(
        "Published pipeline {} for build {}",
        outcome.published.name, outcome.published.version
    ));

    println!();
    println!(
        "{} {} {}",
        "Submitted run".green().bold(),
        outcome.run.id.bold(),
        format!("[{}] in experiment {}", outcome.run.status, outcome.run.experiment_name).dimmed()
    );
    if let Some(ref url) = outcome.run.portal_url {
        println!("  {}", url.cyan());
    }
}
