// List workflow instances

use async_trait::async_trait;
use opsdesk_workflows::{WorkflowFilter, WorkflowKind, WorkflowStatus};

use super::{Command, EngineContext, GlobalOptions};
use crate::error::CliResult;
use crate::output::{self, OutputStyle};

/// List instances matching optional kind and status filters
pub struct ListCommand {
    options: GlobalOptions,
    kind: Option<WorkflowKind>,
    status: Option<WorkflowStatus>,
}

impl ListCommand {
    pub fn new(
        options: GlobalOptions,
        kind: Option<WorkflowKind>,
        status: Option<WorkflowStatus>,
    ) -> Self {
        Self {
            options,
            kind,
            status,
        }
    }

    fn filter(&self) -> WorkflowFilter {
        let mut filter = WorkflowFilter::all();
        if let Some(kind) = self.kind {
            filter = filter.with_kind(kind);
        }
        if let Some(status) = self.status {
            filter = filter.with_status(status);
        }
        filter
    }
}

#[async_trait]
impl Command for ListCommand {
    async fn execute(&self) -> CliResult<()> {
        let ctx = EngineContext::open(&self.options).await?;
        let instances = ctx.engine.list_instances(&self.filter()).await?;

        if self.options.json {
            return output::print_json(&instances);
        }
        if instances.is_empty() {
            if !self.options.quiet {
                output::print_info("No workflow instances found");
            }
            return Ok(());
        }

        let style = OutputStyle::default();
        for instance in &instances {
            println!("{}", style.instance_line(instance));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opsdesk_workflows::{
        EngineConfig, InMemoryWorkflowRepository, MemoryAuditLog, SimulatedDirectory,
        WorkflowEngine, WorkflowInstance,
    };
    use serde_json::{json, Value};
    use std::sync::Arc;

    async fn submitted(engine: &WorkflowEngine, kind: WorkflowKind, params: Value) -> WorkflowInstance {
        let params = serde_json::from_value(params).unwrap();
        let wf = engine.submit(kind, params).await.unwrap();
        engine.get_instance(wf.id()).await.unwrap()
    }

    #[tokio::test]
    async fn test_filter_from_flags() {
        let engine = WorkflowEngine::new(
            EngineConfig::default(),
            Arc::new(InMemoryWorkflowRepository::new()),
            Arc::new(SimulatedDirectory::new().with_auto_provision(true)),
            Arc::new(MemoryAuditLog::default()),
        )
        .unwrap();
        let offboarding = submitted(
            &engine,
            WorkflowKind::Offboarding,
            json!({"subjectIdentity": "u1", "departureDate": "2024-06-01"}),
        )
        .await;
        let onboarding = submitted(
            &engine,
            WorkflowKind::Onboarding,
            json!({
                "subjectIdentity": "e1",
                "displayName": "Grace Hopper",
                "userPrincipalName": "grace@example.com",
                "licenseId": "M365-E3"
            }),
        )
        .await;

        let cmd = ListCommand::new(
            GlobalOptions::default(),
            Some(WorkflowKind::Offboarding),
            Some(WorkflowStatus::Running),
        );
        let filter = cmd.filter();
        assert!(filter.matches(&offboarding));
        assert!(!filter.matches(&onboarding));

        let cmd = ListCommand::new(
            GlobalOptions::default(),
            Some(WorkflowKind::Offboarding),
            Some(WorkflowStatus::Completed),
        );
        assert!(!cmd.filter().matches(&offboarding));
    }
}
