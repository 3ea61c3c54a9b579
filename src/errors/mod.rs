// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 trainflow contributors

//! Error types
//!
//! Every fatal condition surfaces as a [`TrainflowError`] diagnostic. The only
//! locally recovered failure (datastore lookup) never reaches this type's
//! callers.

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for trainflow operations
pub type TrainflowResult<T> = Result<T, TrainflowError>;

/// Main error type for trainflow
#[derive(Error, Debug, Diagnostic)]
pub enum TrainflowError {
    // ─────────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Missing required configuration: {}", keys.join(", "))]
    #[diagnostic(
        code(trainflow::missing_configuration),
        help("Export the variables or list them in a .env file (see --env-file)")
    )]
    MissingConfiguration { keys: Vec<String> },

    #[error("Invalid value for {key}: {reason}")]
    #[diagnostic(code(trainflow::invalid_configuration))]
    InvalidConfiguration { key: String, reason: String },

    #[error("Failed to load env file '{path}': {error}")]
    #[diagnostic(code(trainflow::env_file))]
    EnvFile { path: PathBuf, error: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Platform Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Authentication failed for tenant '{tenant}': {message}")]
    #[diagnostic(
        code(trainflow::authentication_failed),
        help("Check SP_APP_ID, SP_APP_SECRET and TENANT_ID")
    )]
    Authentication { tenant: String, message: String },

    #[error("Platform call '{operation}' failed with status {status}: {message}")]
    #[diagnostic(code(trainflow::platform_error))]
    Platform {
        operation: String,
        status: u16,
        message: String,
    },

    #[error("HTTP error during '{operation}': {message}")]
    #[diagnostic(code(trainflow::http_error))]
    Http { operation: String, message: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Pipeline Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Invalid pipeline: {reason}")]
    #[diagnostic(code(trainflow::invalid_pipeline))]
    InvalidPipeline {
        reason: String,
        #[help]
        help: Option<String>,
    },

    #[error("Circular dependency detected")]
    #[diagnostic(
        code(trainflow::circular_dependency),
        help("Review the run_after edges between steps to remove the cycle")
    )]
    CircularDependency { steps: Vec<String> },

    #[error("Step '{step}' runs after unknown step '{dependency}'")]
    #[diagnostic(code(trainflow::unknown_dependency))]
    UnknownDependency { step: String, dependency: String },

    #[error("Step name '{step}' is used by two different steps")]
    #[diagnostic(code(trainflow::duplicate_step))]
    DuplicateStep { step: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Serialization Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("YAML serialization error: {message}")]
    #[diagnostic(code(trainflow::yaml_error))]
    Yaml { message: String },

    #[error("JSON error: {message}")]
    #[diagnostic(code(trainflow::json_error))]
    Json { message: String },
}

impl From<serde_yaml::Error> for TrainflowError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Yaml { message: e.to_string() }
    }
}

impl From<serde_json::Error> for TrainflowError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json { message: e.to_string() }
    }
}

impl TrainflowError {
    /// Wrap a transport-level failure for a named platform operation
    pub fn http(operation: &str, error: reqwest::Error) -> Self {
        Self::Http {
            operation: operation.to_string(),
            message: error.to_string(),
        }
    }

    /// Build a platform error from a non-success response body
    pub fn platform(operation: &str, status: u16, body: &str) -> Self {
        Self::Platform {
            operation: operation.to_string(),
            status,
            message: Self::extract_platform_message(body),
        }
    }

    /// Pull `error.message` out of an ARM error envelope, falling back to the raw body
    fn extract_platform_message(body: &str) -> String {
        serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| {
                v.pointer("/error/message")
                    .and_then(|m| m.as_str())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| {
                if body.is_empty() {
                    "empty response body".to_string()
                } else {
                    body.to_string()
                }
            })
    }
}
