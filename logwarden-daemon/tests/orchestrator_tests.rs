//! Orchestrator lifecycle tests: build, single cycle, run until cancelled.

use std::path::Path;
use std::time::Duration;

use logwarden_core::LogwardenConfig;
use logwarden_core::config::SourceConfig;
use logwarden_daemon::orchestrator::{Orchestrator, validate_config};

fn test_config(dir: &Path) -> LogwardenConfig {
    let mut config = LogwardenConfig::default();
    config.analysis.interval_secs = 1;
    config.analysis.sources = vec![SourceConfig::new(
        "ssh",
        "ssh",
        dir.join("ssh.log").display().to_string(),
    )];
    config.sinks.store_path = dir.join("n8n-workflow.json").display().to_string();
    config
}

fn stored(dir: &Path) -> serde_json::Value {
    let content = std::fs::read_to_string(dir.join("n8n-workflow.json")).unwrap();
    serde_json::from_str(&content).unwrap()
}

#[tokio::test]
async fn test_build_initializes_empty_store() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = Orchestrator::build_from_config(test_config(dir.path()))
        .await
        .expect("orchestrator should build");

    assert_eq!(orchestrator.config().analysis.sources.len(), 1);
    let doc = stored(dir.path());
    assert_eq!(doc["workflow_name"], "Log Analysis Incident Workflow");
    assert_eq!(doc["incidents"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_run_once_delivers_incidents() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("ssh.log"),
        "Failed password for admin from 10.0.0.5 port 22 ssh2\n".repeat(3),
    )
    .unwrap();

    let orchestrator = Orchestrator::build_from_config(test_config(dir.path()))
        .await
        .unwrap();
    let (report, stats) = orchestrator.run_once().await.unwrap();

    assert_eq!(report.lines, 3);
    assert_eq!(report.incidents, 1);
    assert_eq!(stats.delivered, 1);

    let doc = stored(dir.path());
    let incidents = doc["incidents"].as_array().unwrap();
    assert_eq!(incidents.len(), 1);
    assert_eq!(incidents[0]["source_ip"], "10.0.0.5");
}

#[tokio::test]
async fn test_run_stops_on_token_and_removes_pid_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("ssh.log"), "").unwrap();
    let pid_path = dir.path().join("run").join("logwarden.pid");

    let mut config = test_config(dir.path());
    config.general.pid_file = pid_path.display().to_string();

    let orchestrator = Orchestrator::build_from_config(config).await.unwrap();
    let token = orchestrator.shutdown_token();
    let handle = tokio::spawn(orchestrator.run());

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(pid_path.exists(), "PID file should exist while running");

    token.cancel();
    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("daemon should stop after cancellation")
        .unwrap();
    assert!(result.is_ok());
    assert!(!pid_path.exists(), "PID file should be removed on shutdown");
}

#[tokio::test]
async fn test_existing_pid_file_blocks_second_instance() {
    let dir = tempfile::tempdir().unwrap();
    let pid_path = dir.path().join("logwarden.pid");
    std::fs::write(&pid_path, "4242").unwrap();

    let mut config = test_config(dir.path());
    config.general.pid_file = pid_path.display().to_string();

    let orchestrator = Orchestrator::build_from_config(config).await.unwrap();
    let err = orchestrator.run().await.unwrap_err().to_string();
    assert!(err.contains("4242"), "got: {err}");
}

#[tokio::test]
async fn test_invalid_config_fails_build() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.detection.web.count = 0;

    assert!(validate_config(&config).is_err());
    assert!(Orchestrator::build_from_config(config).await.is_err());
}

#[tokio::test]
async fn test_example_config_validates() {
    let config = LogwardenConfig::parse(include_str!("../../logwarden.toml.example")).unwrap();
    let detector = validate_config(&config).expect("example config should validate");
    assert_eq!(detector.sources.len(), 5);
    assert!(detector.webhook_url.is_none());
}
