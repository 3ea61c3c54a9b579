// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 trainflow contributors

//! Graph command - visualize pipeline as a graph

use miette::Result;
use std::path::Path;

use super::{load_settings, GraphFormat};
use crate::pipeline::{DagBuilder, PipelineSpec};
use crate::training::offline_pipeline;

/// Run the graph command
pub async fn run(env_file: Option<&Path>, format: GraphFormat, _verbose: bool) -> Result<()> {
    let settings = load_settings(env_file)?;
    let pipeline = offline_pipeline(&settings)?;

    // Build DAG
    let dag = DagBuilder::build(&pipeline)?;

    // Output in requested format
    let output = match format {
        GraphFormat::Text => dag.to_text(&pipeline)?,
        GraphFormat::Dot => dag.to_dot(),
        GraphFormat::Mermaid => dag.to_mermaid(),
        GraphFormat::Yaml => PipelineSpec::from_pipeline(&pipeline, &settings.build_id).to_yaml()?,
    };

    println!("{}", output);

    Ok(())
}
