// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 trainflow contributors

//! DAG (Directed Acyclic Graph) builder for step dependencies
//!
//! Builds and validates the `run_after` graph of a pipeline, ensuring
//! every referenced step is present and no cycle exists.

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

use crate::errors::TrainflowError;
use crate::pipeline::Pipeline;

/// Builder for step dependency DAGs
pub struct DagBuilder {
    graph: DiGraph<usize, ()>,
    name_to_index: HashMap<String, NodeIndex>,
    index_to_name: HashMap<NodeIndex, String>,
}

impl DagBuilder {
    /// Create a new DAG builder
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            name_to_index: HashMap::new(),
            index_to_name: HashMap::new(),
        }
    }

    /// Build a DAG from a pipeline
    pub fn build(pipeline: &Pipeline) -> Result<Self, TrainflowError> {
        Self::from_dependencies(
            pipeline
                .steps
                .iter()
                .map(|s| (s.name.as_str(), s.dependency_names())),
        )
    }

    /// Build a DAG from `(step, steps it runs after)` pairs
    ///
    /// Node payloads are the position of each step in the input.
    pub fn from_dependencies<'a, I>(steps: I) -> Result<Self, TrainflowError>
    where
        I: IntoIterator<Item = (&'a str, Vec<&'a str>)>,
    {
        let mut builder = Self::new();
        let steps: Vec<_> = steps.into_iter().collect();

        for (idx, (name, _)) in steps.iter().enumerate() {
            if builder.name_to_index.contains_key(*name) {
                return Err(TrainflowError::DuplicateStep {
                    step: name.to_string(),
                });
            }
            let node = builder.graph.add_node(idx);
            builder.name_to_index.insert(name.to_string(), node);
            builder.index_to_name.insert(node, name.to_string());
        }

        for (name, deps) in &steps {
            let step_node = builder.name_to_index[*name];

            for dep_name in deps {
                let dep_node = builder.name_to_index.get(*dep_name).ok_or_else(|| {
                    TrainflowError::UnknownDependency {
                        step: name.to_string(),
                        dependency: dep_name.to_string(),
                    }
                })?;

                if !builder.graph.contains_edge(*dep_node, step_node) {
                    builder.graph.add_edge(*dep_node, step_node, ());
                }
            }
        }

        builder.validate_acyclic()?;

        Ok(builder)
    }

    /// Validate that the graph is acyclic
    fn validate_acyclic(&self) -> Result<(), TrainflowError> {
        toposort(&self.graph, None).map(|_| ()).map_err(|cycle| {
            TrainflowError::CircularDependency {
                steps: self.find_cycle_members(cycle.node_id()),
            }
        })
    }

    /// Find the steps on the cycle through `start`
    fn find_cycle_members(&self, start: NodeIndex) -> Vec<String> {
        let sccs = petgraph::algo::kosaraju_scc(&self.graph);
        let mut members: Vec<String> = sccs
            .into_iter()
            .find(|scc| scc.contains(&start))
            .unwrap_or_else(|| vec![start])
            .into_iter()
            .map(|n| self.index_to_name[&n].clone())
            .collect();
        members.sort();
        members
    }

    /// Get topologically sorted step positions
    pub fn topological_order(&self) -> Result<Vec<usize>, TrainflowError> {
        toposort(&self.graph, None)
            .map(|nodes| nodes.into_iter().map(|n| self.graph[n]).collect())
            .map_err(|cycle| TrainflowError::CircularDependency {
                steps: self.find_cycle_members(cycle.node_id()),
            })
    }

    /// Get topologically sorted step names
    pub fn topological_order_names(&self) -> Result<Vec<String>, TrainflowError> {
        toposort(&self.graph, None)
            .map(|nodes| {
                nodes
                    .into_iter()
                    .map(|n| self.index_to_name[&n].clone())
                    .collect()
            })
            .map_err(|cycle| TrainflowError::CircularDependency {
                steps: self.find_cycle_members(cycle.node_id()),
            })
    }

    /// Get dependencies for a step (steps that must complete before it)
    pub fn dependencies(&self, step_name: &str) -> Option<Vec<String>> {
        let node = self.name_to_index.get(step_name)?;
        let mut deps: Vec<String> = self
            .graph
            .neighbors_directed(*node, petgraph::Direction::Incoming)
            .map(|n| self.index_to_name[&n].clone())
            .collect();
        deps.sort();
        Some(deps)
    }

    /// Check if step A depends (directly or transitively) on step B
    pub fn depends_on(&self, step_a: &str, step_b: &str) -> bool {
        let Some(node_a) = self.name_to_index.get(step_a) else {
            return false;
        };
        let Some(node_b) = self.name_to_index.get(step_b) else {
            return false;
        };

        node_a != node_b
            && petgraph::algo::has_path_connecting(&self.graph, *node_b, *node_a, None)
    }

    /// Sorted edges as `(from, to)` name pairs
    fn edges(&self) -> Vec<(&str, &str)> {
        let mut edges: Vec<(&str, &str)> = self
            .graph
            .edge_indices()
            .filter_map(|e| self.graph.edge_endpoints(e))
            .map(|(from, to)| {
                (
                    self.index_to_name[&from].as_str(),
                    self.index_to_name[&to].as_str(),
                )
            })
            .collect();
        edges.sort();
        edges
    }

    /// Generate Mermaid diagram of the DAG
    ///
    /// Step names may contain spaces, so nodes get positional ids.
    pub fn to_mermaid(&self) -> String {
        let mut out = String::from("graph TD\n");
        let mut nodes: Vec<_> = self.graph.node_indices().collect();
        nodes.sort_by_key(|n| self.graph[*n]);

        for node in &nodes {
            out.push_str(&format!(
                "    s{}[\"{}\"]\n",
                self.graph[*node],
                self.index_to_name[node]
            ));
        }

        for (from, to) in self.edges() {
            out.push_str(&format!(
                "    s{} --> s{}\n",
                self.graph[self.name_to_index[from]],
                self.graph[self.name_to_index[to]]
            ));
        }

        out
    }

    /// Generate DOT diagram of the DAG
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph pipeline {\n");
        out.push_str("    rankdir=TB;\n");
        out.push_str("    node [shape=box, style=rounded];\n\n");

        for (from, to) in self.edges() {
            out.push_str(&format!("    \"{}\" -> \"{}\";\n", from, to));
        }

        let mut isolated: Vec<&str> = self
            .name_to_index
            .iter()
            .filter(|(_, node)| self.graph.neighbors_undirected(**node).count() == 0)
            .map(|(name, _)| name.as_str())
            .collect();
        isolated.sort();
        for name in isolated {
            out.push_str(&format!("    \"{}\";\n", name));
        }

        out.push_str("}\n");
        out
    }

    /// Generate text representation of execution order
    pub fn to_text(&self, pipeline: &Pipeline) -> Result<String, TrainflowError> {
        let order = self.topological_order()?;
        let mut out = String::new();

        for (i, idx) in order.iter().enumerate() {
            let step = &pipeline.steps[*idx];
            let deps = self.dependencies(&step.name).unwrap_or_default();
            let reuse = if step.allow_reuse { "reuse" } else { "always run" };

            out.push_str(&format!("{}. {} ({})", i + 1, step.name, reuse));

            if !deps.is_empty() {
                out.push_str(&format!(" [after: {}]", deps.join(", ")));
            }

            out.push('\n');
        }

        Ok(out)
    }
}

impl Default for DagBuilder {
    fn default() -> Self {
        Self::new()
    }
}
