// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 trainflow contributors

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SETTINGS: [(&str, &str); 16] = [
    ("WS_NAME", "mlops-ws"),
    ("RG_NAME", "mlops-rg"),
    ("SUBSCRIPTION_ID", "00000000-0000-0000-0000-000000000001"),
    ("TENANT_ID", "tenant-1"),
    ("SP_APP_ID", "app-1"),
    ("SP_APP_SECRET", "hunter2"),
    ("SOURCES_DIR_TRAIN", "code"),
    ("TRAIN_SCRIPT_PATH", "training/train.py"),
    ("EVALUATE_SCRIPT_PATH", "evaluate/evaluate_model.py"),
    ("AML_COMPUTE_CLUSTER_SKU", "STANDARD_NC6"),
    ("AML_COMPUTE_CLUSTER_NAME", "train-cluster"),
    ("AKS_CLUSTER_NAME", "aks-cluster"),
    ("MODEL_NAME", "azure-service-classifier"),
    ("BUILD_BUILDID", "20251019.3"),
    ("TRAINING_PIPELINE_NAME", "training-pipeline"),
    ("EXPERIMENT_NAME", "classifier-training"),
];

/// Command isolated from the caller's environment, run inside `dir`
fn trainflow(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("trainflow").unwrap();
    cmd.env_clear()
        .env("NO_COLOR", "1")
        .arg("-C")
        .arg(dir.path());
    cmd
}

fn with_settings(dir: &TempDir) -> Command {
    let mut cmd = trainflow(dir);
    cmd.envs(SETTINGS);
    cmd
}

#[test]
fn validate_reports_every_missing_setting() {
    let dir = TempDir::new().unwrap();

    trainflow(&dir)
        .arg("validate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("WS_NAME"))
        .stderr(predicate::str::contains("SP_APP_SECRET"))
        .stderr(predicate::str::contains("EXPERIMENT_NAME"));
}

#[test]
fn validate_accepts_complete_settings() {
    let dir = TempDir::new().unwrap();

    with_settings(&dir)
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("Pipeline is valid"));
}

#[test]
fn validate_verbose_redacts_secret() {
    let dir = TempDir::new().unwrap();

    with_settings(&dir)
        .args(["validate", "--verbose"])
        .assert()
        .success()
        .stdout(predicate::str::contains("SP_APP_SECRET = ***"))
        .stdout(predicate::str::contains("hunter2").not());
}

#[test]
fn settings_load_from_env_file() {
    let dir = TempDir::new().unwrap();
    let contents: String = SETTINGS
        .iter()
        .map(|(key, value)| format!("{key}={value}\n"))
        .collect();
    std::fs::write(dir.path().join("ci.env"), contents).unwrap();

    trainflow(&dir)
        .args(["validate", "--env-file", "ci.env"])
        .assert()
        .success();
}

#[test]
fn default_env_file_is_picked_up() {
    let dir = TempDir::new().unwrap();
    let contents: String = SETTINGS
        .iter()
        .map(|(key, value)| format!("{key}={value}\n"))
        .collect();
    std::fs::write(dir.path().join(".env"), contents).unwrap();

    trainflow(&dir)
        .args(["graph"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1. Train Model (reuse)"));
}

#[test]
fn missing_env_file_is_an_error() {
    let dir = TempDir::new().unwrap();

    with_settings(&dir)
        .args(["validate", "--env-file", "absent.env"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("absent.env"));
}

#[test]
fn graph_text_lists_execution_order() {
    let dir = TempDir::new().unwrap();

    with_settings(&dir)
        .arg("graph")
        .assert()
        .success()
        .stdout(predicate::str::contains("1. Train Model (reuse)"))
        .stdout(predicate::str::contains(
            "2. Evaluate Model (always run) [after: Train Model]",
        ));
}

#[test]
fn graph_mermaid() {
    let dir = TempDir::new().unwrap();

    with_settings(&dir)
        .args(["graph", "--format", "mermaid"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("graph TD"))
        .stdout(predicate::str::contains("[\"Train Model\"]"))
        .stdout(predicate::str::contains("[\"Evaluate Model\"]"))
        .stdout(predicate::str::contains("-->"));
}

#[test]
fn graph_dot() {
    let dir = TempDir::new().unwrap();

    with_settings(&dir)
        .args(["graph", "--format", "dot"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "\"Train Model\" -> \"Evaluate Model\";",
        ));
}

#[test]
fn graph_yaml_is_publish_payload() {
    let dir = TempDir::new().unwrap();

    with_settings(&dir)
        .args(["graph", "--format", "yaml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("name: training-pipeline"))
        .stdout(predicate::str::contains("train_model:"))
        .stdout(predicate::str::contains("evaluate_model:"))
        .stdout(predicate::str::contains("max_seq_length:"));
}

const WS_ID: &str = "/subscriptions/00000000-0000-0000-0000-000000000001/resourceGroups/mlops-rg/providers/Microsoft.MachineLearningServices/workspaces/mlops-ws";

/// Resource Manager stand-in with every resource the run touches already present
async fn workspace_server() -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/tenant-1/oauth2/v2.0/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "tok",
            "expires_in": 3600
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(WS_ID))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": WS_ID,
            "name": "mlops-ws",
            "location": "westus2",
            "properties": {}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{WS_ID}/computes/train-cluster")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": format!("{WS_ID}/computes/train-cluster"),
            "name": "train-cluster",
            "properties": {
                "computeType": "AmlCompute",
                "provisioningState": "Succeeded",
                "properties": { "vmSize": "STANDARD_NC6" }
            }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{WS_ID}/datastores/mtcseattle")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": format!("{WS_ID}/datastores/mtcseattle"),
            "name": "mtcseattle",
            "properties": {
                "accountName": "mtcseattle",
                "containerName": "azure-service-classifier"
            }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"/data/Azure%20Services%20Dataset/versions$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": [] })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path_regex(r"/data/Azure%20Services%20Dataset/versions/1$"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": format!("{WS_ID}/data/Azure Services Dataset/versions/1"),
            "name": "1",
            "properties": {}
        })))
        .expect(1)
        .mount(&server)
        .await;

    server
}

#[tokio::test(flavor = "multi_thread")]
async fn run_publishes_build_and_submits_once() {
    let server = workspace_server().await;
    let component_id = format!("{WS_ID}/components/training-pipeline/versions/20251019.3");

    Mock::given(method("PUT"))
        .and(path(format!("{WS_ID}/components/training-pipeline/versions/20251019.3")))
        .and(body_partial_json(json!({
            "properties": {
                "componentSpec": {
                    "type": "pipeline",
                    "name": "training-pipeline",
                    "version": "20251019.3",
                    "jobs": {
                        "evaluate_model": {
                            "inputs": {
                                "after_train_model": "${{parent.jobs.train_model.outputs.completed}}"
                            }
                        }
                    }
                }
            }
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": component_id,
            "name": "20251019.3",
            "properties": {}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path_regex(r"/jobs/[0-9a-f]{32}$"))
        .and(body_partial_json(json!({
            "properties": {
                "jobType": "Pipeline",
                "experimentName": "classifier-training",
                "componentId": component_id
            }
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": format!("{WS_ID}/jobs/run-1"),
            "name": "run-1",
            "properties": { "status": "NotStarted" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let uri = server.uri();
    let assert = tokio::task::spawn_blocking(move || {
        let dir = TempDir::new().unwrap();
        with_settings(&dir)
            .env("AML_AUTHORITY_HOST", &uri)
            .env("AML_MANAGEMENT_ENDPOINT", &uri)
            .arg("run")
            .assert()
    })
    .await
    .unwrap();

    assert
        .success()
        .stdout(predicate::str::contains("Dataset Azure Services Dataset version 1"))
        .stdout(predicate::str::contains("Published pipeline training-pipeline for build 20251019.3"))
        .stdout(predicate::str::contains("Submitted run run-1"));

    server.verify().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn run_fails_when_publish_is_rejected() {
    let server = workspace_server().await;

    Mock::given(method("PUT"))
        .and(path_regex(r"/components/training-pipeline/versions/20251019\.3$"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": { "code": "UserError", "message": "Invalid pipeline component" }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path_regex(r"/jobs/"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let uri = server.uri();
    let assert = tokio::task::spawn_blocking(move || {
        let dir = TempDir::new().unwrap();
        with_settings(&dir)
            .env("AML_AUTHORITY_HOST", &uri)
            .env("AML_MANAGEMENT_ENDPOINT", &uri)
            .arg("run")
            .assert()
    })
    .await
    .unwrap();

    assert
        .failure()
        .stderr(predicate::str::contains("Invalid pipeline component"));

    server.verify().await;
}
