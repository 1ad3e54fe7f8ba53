// End-to-end checks of the CLI wiring against on-disk state

use std::collections::BTreeMap;

use opsdesk_cli::commands::{
    AuditCommand, Command, EngineContext, GlobalOptions, ListCommand, ResumeCommand,
    StartCommand,
};
use opsdesk_workflows::{
    AuditEvent, ConfigManager, EngineConfig, JsonlAuditLog, WorkflowFilter, WorkflowKind,
    WorkflowStatus,
};
use serde_json::json;
use tempfile::TempDir;

fn write_config(dir: &TempDir) -> GlobalOptions {
    let mut config = EngineConfig::default();
    config.state_dir = dir.path().join("state");
    config.retry.base_delay_ms = 1;

    let path = dir.path().join("config.toml");
    ConfigManager::with_path(&path).save(&config).unwrap();

    GlobalOptions {
        config_path: Some(path),
        json: true,
        quiet: true,
    }
}

fn offboarding_params() -> BTreeMap<String, serde_json::Value> {
    let mut params = BTreeMap::new();
    params.insert("subjectIdentity".to_string(), json!("u123"));
    params.insert("departureDate".to_string(), json!("2024-06-01"));
    params.insert("groupIds".to_string(), json!(["g1"]));
    params
}

#[tokio::test]
async fn test_workflow_state_shared_across_contexts() {
    let dir = TempDir::new().unwrap();
    let options = write_config(&dir);

    let first = EngineContext::open(&options).await.unwrap();
    let started = first
        .engine
        .start(WorkflowKind::Offboarding, offboarding_params())
        .await
        .unwrap();
    let done = first.engine.wait(started.id()).await.unwrap();
    assert_eq!(done.status(), WorkflowStatus::Completed);

    // A second process-level context sees the persisted instance
    let second = EngineContext::open(&options).await.unwrap();
    let stored = second.engine.get_instance(started.id()).await.unwrap();
    assert_eq!(stored.status(), WorkflowStatus::Completed);
    assert_eq!(stored.progress(), 100);

    let listed = second
        .engine
        .list_instances(&WorkflowFilter::all().with_kind(WorkflowKind::Offboarding))
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);

    ListCommand::new(options.clone(), None, Some(WorkflowStatus::Completed))
        .execute()
        .await
        .unwrap();
}

#[tokio::test]
async fn test_audit_log_written_to_state_dir() {
    let dir = TempDir::new().unwrap();
    let options = write_config(&dir);

    let ctx = EngineContext::open(&options).await.unwrap();
    let started = ctx
        .engine
        .start(WorkflowKind::Offboarding, offboarding_params())
        .await
        .unwrap();
    ctx.engine.wait(started.id()).await.unwrap();
    ctx.close().await;

    let entries = JsonlAuditLog::read_all(ctx.config.audit_log_path()).unwrap();
    assert!(entries.iter().all(|e| e.workflow_id == started.id()));
    assert!(entries.len() >= 2);

    AuditCommand::new(options, Some(started.id()))
        .execute()
        .await
        .unwrap();
}

#[tokio::test]
async fn test_start_command_leaves_complete_audit_file() {
    let dir = TempDir::new().unwrap();
    let options = write_config(&dir);

    StartCommand::new(
        options.clone(),
        WorkflowKind::Offboarding,
        vec![
            "subjectIdentity=100234".to_string(),
            "departureDate=2024-06-01".to_string(),
        ],
        None,
        false,
    )
    .execute()
    .await
    .unwrap();

    let config = options.load_config().unwrap();
    let entries = JsonlAuditLog::read_all(config.audit_log_path()).unwrap();
    assert_eq!(entries.first().unwrap().event, AuditEvent::WorkflowStarted);
    assert_eq!(entries.last().unwrap().event, AuditEvent::WorkflowCompleted);
}

#[tokio::test]
async fn test_resume_with_nothing_pending() {
    let dir = TempDir::new().unwrap();
    let options = write_config(&dir);
    ResumeCommand::new(options).execute().await.unwrap();
}

#[tokio::test]
async fn test_invalid_start_parameters_reported() {
    let dir = TempDir::new().unwrap();
    let options = write_config(&dir);
    let ctx = EngineContext::open(&options).await.unwrap();

    let err = ctx
        .engine
        .start(WorkflowKind::Offboarding, BTreeMap::new())
        .await
        .unwrap_err();
    let cli_err: opsdesk_cli::error::CliError = err.into();
    assert!(matches!(
        cli_err,
        opsdesk_cli::error::CliError::InvalidArgument { .. }
    ));
}
