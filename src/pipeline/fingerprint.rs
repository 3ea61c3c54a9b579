// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 trainflow contributors

//! Content fingerprints for reusable steps
//!
//! Uses BLAKE3 over everything that determines what a step executes, so two
//! definitions with the same fingerprint are interchangeable for reuse.

use blake3::Hasher;

use crate::pipeline::{PipelineStep, StepArgument};

/// Content hasher for step definitions
pub struct StepFingerprint {
    hasher: Hasher,
}

impl StepFingerprint {
    pub fn new() -> Self {
        Self {
            hasher: Hasher::new(),
        }
    }

    /// Fingerprint a single step
    pub fn of(step: &PipelineStep) -> String {
        let mut fp = Self::new();
        fp.update_step(step);
        fp.finish()
    }

    fn field(&mut self, bytes: &[u8]) {
        // Length prefix keeps adjacent fields from running together
        self.hasher.update(&(bytes.len() as u64).to_le_bytes());
        self.hasher.update(bytes);
    }

    /// Feed a step definition into the hash
    pub fn update_step(&mut self, step: &PipelineStep) {
        self.field(step.name.as_bytes());
        self.field(step.script_name.as_bytes());
        self.field(step.source_directory.to_string_lossy().as_bytes());

        for arg in &step.arguments {
            match arg {
                StepArgument::Literal(v) => {
                    self.field(b"lit");
                    self.field(v.as_bytes());
                }
                StepArgument::Parameter(p) => {
                    self.field(b"param");
                    self.field(p.name().as_bytes());
                }
                StepArgument::Input(i) => {
                    self.field(b"input");
                    self.field(i.dataset_id.as_bytes());
                    self.field(i.mount_path.as_bytes());
                }
            }
        }

        if let Some(ref target) = step.compute_target {
            self.field(target.name.as_bytes());
        }

        for package in &step.run_config.conda_packages {
            self.field(b"conda");
            self.field(package.as_bytes());
        }
        for package in &step.run_config.pip_packages {
            self.field(b"pip");
            self.field(package.as_bytes());
        }
    }

    /// Hex digest of everything fed so far
    pub fn finish(&self) -> String {
        self.hasher.finalize().to_hex().to_string()
    }
}

impl Default for StepFingerprint {
    fn default() -> Self {
        Self::new()
    }
}
