//! Task execution against the directory
//!
//! Translates a task type plus an instance snapshot into one directory call.
//! Runs without any instance lock held.

use crate::directory::{
    AccountRequest, DirectoryAdapter, DirectoryError, DirectoryResult, MembershipChange,
};
use crate::models::{AccountRef, Ack, TaskType, WorkflowInstance, WorkflowKind};
use crate::parameters::{keys, ParameterDefaults, WorkflowParameters};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Inputs a task needs, copied out of the instance
#[derive(Debug, Clone)]
pub struct TaskContext {
    /// Workflow kind
    pub kind: WorkflowKind,
    /// Subject identity
    pub subject_identity: String,
    /// Parameter snapshot
    pub parameters: WorkflowParameters,
    /// Account created by onboarding, if any
    pub account: Option<AccountRef>,
}

impl TaskContext {
    /// Snapshot the inputs of an instance
    pub fn from_instance(instance: &WorkflowInstance) -> Self {
        Self {
            kind: instance.kind(),
            subject_identity: instance.subject_identity().to_string(),
            parameters: WorkflowParameters::from_map(instance.parameters().clone()),
            account: instance.account().cloned(),
        }
    }

    /// Directory identity follow-on tasks act on
    ///
    /// Onboarding tasks after account creation act on the created account;
    /// offboarding acts on the subject directly.
    fn target_identity(&self) -> DirectoryResult<String> {
        match self.kind {
            WorkflowKind::Offboarding => Ok(self.subject_identity.clone()),
            WorkflowKind::Onboarding => self
                .account
                .as_ref()
                .map(|a| a.id.clone())
                .ok_or_else(|| DirectoryError::Fatal("account has not been created".to_string())),
        }
    }

    fn account_request(&self) -> DirectoryResult<AccountRequest> {
        let params = &self.parameters;
        let principal_name = params.string(keys::USER_PRINCIPAL_NAME).ok_or_else(|| {
            DirectoryError::Validation(format!("'{}' is missing", keys::USER_PRINCIPAL_NAME))
        })?;

        Ok(AccountRequest {
            employee_id: self.subject_identity.clone(),
            display_name: params
                .string(keys::DISPLAY_NAME)
                .unwrap_or_else(|| principal_name.clone()),
            principal_name,
            department: params.string(keys::DEPARTMENT),
            job_title: params.string(keys::JOB_TITLE),
            manager_id: params.string(keys::MANAGER_ID),
        })
    }
}

/// Result of one successful task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskOutput {
    /// Directory acknowledgement
    pub ack: Ack,
    /// Account created by the task
    pub account: Option<AccountRef>,
}

impl TaskOutput {
    fn ack(ack: Ack) -> Self {
        Self { ack, account: None }
    }
}

/// Dispatches tasks to the directory adapter under a timeout
#[derive(Clone)]
pub struct TaskExecutor {
    directory: Arc<dyn DirectoryAdapter>,
    defaults: ParameterDefaults,
    call_timeout: Duration,
}

impl TaskExecutor {
    /// Create an executor
    pub fn new(
        directory: Arc<dyn DirectoryAdapter>,
        defaults: ParameterDefaults,
        call_timeout: Duration,
    ) -> Self {
        Self {
            directory,
            defaults,
            call_timeout,
        }
    }

    /// Execute one task; a call exceeding the timeout is a retryable failure
    pub async fn execute(
        &self,
        task_type: TaskType,
        context: &TaskContext,
    ) -> DirectoryResult<TaskOutput> {
        match tokio::time::timeout(self.call_timeout, self.dispatch(task_type, context)).await {
            Ok(result) => result,
            Err(_) => Err(DirectoryError::Timeout(self.call_timeout.as_millis() as u64)),
        }
    }

    async fn dispatch(
        &self,
        task_type: TaskType,
        context: &TaskContext,
    ) -> DirectoryResult<TaskOutput> {
        let directory = self.directory.as_ref();
        let params = &context.parameters;

        match task_type {
            TaskType::CreateAccount => {
                let request = context.account_request()?;
                let (account, ack) = directory.create_account(&request).await?;
                Ok(TaskOutput {
                    ack,
                    account: Some(account),
                })
            }
            TaskType::AssignLicense => {
                let identity = context.target_identity()?;
                let license = params.license_id(&self.defaults).ok_or_else(|| {
                    DirectoryError::Validation("no license to assign".to_string())
                })?;
                directory
                    .assign_license(&identity, &license)
                    .await
                    .map(TaskOutput::ack)
            }
            TaskType::AddToGroups | TaskType::RemoveFromGroups => {
                let groups = params.list(keys::GROUP_IDS);
                if groups.is_empty() {
                    debug!(task = %task_type, "No groups given");
                    return Ok(TaskOutput::ack(Ack::AlreadySatisfied));
                }
                let change = if task_type == TaskType::AddToGroups {
                    MembershipChange::Add
                } else {
                    MembershipChange::Remove
                };
                let identity = context.target_identity()?;
                directory
                    .modify_group_membership(&identity, &groups, change)
                    .await
                    .map(TaskOutput::ack)
            }
            TaskType::AssignAsset => match params.string(keys::ASSET_ID) {
                Some(asset) => {
                    let identity = context.target_identity()?;
                    directory
                        .assign_asset(&identity, &asset)
                        .await
                        .map(TaskOutput::ack)
                }
                None => Ok(TaskOutput::ack(Ack::AlreadySatisfied)),
            },
            TaskType::ReleaseAsset => match params.string(keys::ASSET_ID) {
                Some(asset) => directory.release_asset(&asset).await.map(TaskOutput::ack),
                None => Ok(TaskOutput::ack(Ack::AlreadySatisfied)),
            },
            TaskType::DisableAccount => {
                let identity = context.target_identity()?;
                directory.disable_account(&identity).await.map(TaskOutput::ack)
            }
            TaskType::RevokeSessions => {
                let identity = context.target_identity()?;
                directory.revoke_sessions(&identity).await.map(TaskOutput::ack)
            }
            TaskType::RemoveMfaMethods => {
                let identity = context.target_identity()?;
                directory
                    .remove_mfa_methods(&identity)
                    .await
                    .map(TaskOutput::ack)
            }
            TaskType::ArchiveMailboxAndFiles => {
                if !params.archive_data() {
                    return Ok(TaskOutput::ack(Ack::AlreadySatisfied));
                }
                let identity = context.target_identity()?;
                let destination = params.archive_destination(&self.defaults).ok_or_else(|| {
                    DirectoryError::Validation("no archive destination".to_string())
                })?;
                directory
                    .archive_mailbox_and_files(&identity, &destination)
                    .await
                    .map(TaskOutput::ack)
            }
        }
    }
}
