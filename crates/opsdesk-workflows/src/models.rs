//! Core data models for lifecycle workflows

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Kind of identity lifecycle event a workflow handles
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum WorkflowKind {
    /// A new hire
    #[serde(rename = "onboarding")]
    Onboarding,
    /// A departure
    #[serde(rename = "offboarding")]
    Offboarding,
}

impl WorkflowKind {
    /// Stable lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowKind::Onboarding => "onboarding",
            WorkflowKind::Offboarding => "offboarding",
        }
    }
}

impl fmt::Display for WorkflowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkflowKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "onboarding" => Ok(WorkflowKind::Onboarding),
            "offboarding" => Ok(WorkflowKind::Offboarding),
            other => Err(format!("Unknown workflow kind: {}", other)),
        }
    }
}

/// Aggregate workflow status, derived from the task vector
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum WorkflowStatus {
    /// Created but not yet started
    #[serde(rename = "pending")]
    Pending,
    /// Tasks are executing
    #[serde(rename = "running")]
    Running,
    /// Every task settled and no mandatory task failed
    #[serde(rename = "completed")]
    Completed,
    /// A mandatory task failed
    #[serde(rename = "failed")]
    Failed,
    /// Aborted before completion
    #[serde(rename = "cancelled")]
    Cancelled,
}

impl WorkflowStatus {
    /// Whether the status can no longer change
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkflowStatus::Completed | WorkflowStatus::Failed | WorkflowStatus::Cancelled
        )
    }

    /// Stable lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStatus::Pending => "pending",
            WorkflowStatus::Running => "running",
            WorkflowStatus::Completed => "completed",
            WorkflowStatus::Failed => "failed",
            WorkflowStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkflowStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(WorkflowStatus::Pending),
            "running" => Ok(WorkflowStatus::Running),
            "completed" => Ok(WorkflowStatus::Completed),
            "failed" => Ok(WorkflowStatus::Failed),
            "cancelled" | "canceled" => Ok(WorkflowStatus::Cancelled),
            other => Err(format!("Unknown workflow status: {}", other)),
        }
    }
}

/// Per-task execution state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TaskState {
    /// Waiting to run (or waiting for a retry)
    #[serde(rename = "pending")]
    Pending,
    /// Directory call in flight
    #[serde(rename = "running")]
    Running,
    /// Directory call succeeded
    #[serde(rename = "completed")]
    Completed,
    /// Mandatory task gave up
    #[serde(rename = "failed")]
    Failed,
    /// Optional task gave up
    #[serde(rename = "skipped")]
    Skipped,
}

impl TaskState {
    /// Whether the task has settled for good
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Failed | TaskState::Skipped
        )
    }

    /// Whether dependents may start after this state
    pub fn satisfies_dependents(&self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Skipped)
    }
}

/// Directory operation a task invokes
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// Create the directory account
    CreateAccount,
    /// Assign the product license
    AssignLicense,
    /// Add the account to its groups
    AddToGroups,
    /// Hand out a hardware asset
    AssignAsset,
    /// Block sign-in
    DisableAccount,
    /// Revoke refresh tokens and sessions
    RevokeSessions,
    /// Archive mailbox and drive contents
    ArchiveMailboxAndFiles,
    /// Delete registered MFA methods
    RemoveMfaMethods,
    /// Remove the account from its groups
    RemoveFromGroups,
    /// Recover a hardware asset
    ReleaseAsset,
}

impl TaskType {
    /// Stable snake_case name
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::CreateAccount => "create_account",
            TaskType::AssignLicense => "assign_license",
            TaskType::AddToGroups => "add_to_groups",
            TaskType::AssignAsset => "assign_asset",
            TaskType::DisableAccount => "disable_account",
            TaskType::RevokeSessions => "revoke_sessions",
            TaskType::ArchiveMailboxAndFiles => "archive_mailbox_and_files",
            TaskType::RemoveMfaMethods => "remove_mfa_methods",
            TaskType::RemoveFromGroups => "remove_from_groups",
            TaskType::ReleaseAsset => "release_asset",
        }
    }

    /// Human-readable label for task lists
    pub fn label(&self) -> &'static str {
        match self {
            TaskType::CreateAccount => "Create account",
            TaskType::AssignLicense => "Assign license",
            TaskType::AddToGroups => "Add to groups",
            TaskType::AssignAsset => "Assign asset",
            TaskType::DisableAccount => "Disable account",
            TaskType::RevokeSessions => "Revoke sessions",
            TaskType::ArchiveMailboxAndFiles => "Archive mailbox and files",
            TaskType::RemoveMfaMethods => "Remove MFA methods",
            TaskType::RemoveFromGroups => "Remove from groups",
            TaskType::ReleaseAsset => "Release asset",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Positive outcome of a directory operation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Ack {
    /// The directory changed
    #[serde(rename = "applied")]
    Applied,
    /// The desired end state already held
    #[serde(rename = "already_satisfied")]
    AlreadySatisfied,
}

impl Ack {
    /// Wire name of the acknowledgement
    pub fn as_str(&self) -> &'static str {
        match self {
            Ack::Applied => "applied",
            Ack::AlreadySatisfied => "already_satisfied",
        }
    }
}

/// Reference to a directory account
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountRef {
    /// Directory object id
    pub id: String,
    /// Sign-in name
    pub principal_name: String,
}

/// Execution record of one catalog task inside an instance
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskExecution {
    pub(crate) task_type: TaskType,
    pub(crate) mandatory: bool,
    #[serde(default)]
    pub(crate) depends_on: Vec<TaskType>,
    pub(crate) state: TaskState,
    pub(crate) attempt: u32,
    pub(crate) last_error: Option<String>,
    #[serde(default)]
    pub(crate) outcome: Option<Ack>,
    #[serde(default)]
    pub(crate) not_before: Option<DateTime<Utc>>,
    #[serde(default)]
    pub(crate) started_at: Option<DateTime<Utc>>,
    pub(crate) completed_at: Option<DateTime<Utc>>,
}

impl TaskExecution {
    pub(crate) fn new(task_type: TaskType, mandatory: bool, depends_on: Vec<TaskType>) -> Self {
        Self {
            task_type,
            mandatory,
            depends_on,
            state: TaskState::Pending,
            attempt: 0,
            last_error: None,
            outcome: None,
            not_before: None,
            started_at: None,
            completed_at: None,
        }
    }

    /// Directory operation this task invokes
    pub fn task_type(&self) -> TaskType {
        self.task_type
    }

    /// Whether failure of this task fails the workflow
    pub fn mandatory(&self) -> bool {
        self.mandatory
    }

    /// Predecessors that must settle before this task starts
    pub fn depends_on(&self) -> &[TaskType] {
        &self.depends_on
    }

    /// Current state
    pub fn state(&self) -> TaskState {
        self.state
    }

    /// Number of execution attempts so far
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Last failure reason
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// How the directory acknowledged the last successful attempt
    pub fn outcome(&self) -> Option<Ack> {
        self.outcome
    }

    /// Earliest time of the next attempt while backing off
    pub fn not_before(&self) -> Option<DateTime<Utc>> {
        self.not_before
    }

    /// When the latest attempt started
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// When the task settled
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }
}

/// One onboarding or offboarding run for one identity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowInstance {
    pub(crate) id: Uuid,
    pub(crate) kind: WorkflowKind,
    pub(crate) subject_identity: String,
    pub(crate) parameters: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub(crate) account: Option<AccountRef>,
    pub(crate) tasks: Vec<TaskExecution>,
    pub(crate) status: WorkflowStatus,
    pub(crate) progress: u8,
    #[serde(default)]
    pub(crate) started: bool,
    #[serde(default)]
    pub(crate) cancel_requested: bool,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
    pub(crate) completed_at: Option<DateTime<Utc>>,
}

impl WorkflowInstance {
    /// Instance identifier
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Workflow kind
    pub fn kind(&self) -> WorkflowKind {
        self.kind
    }

    /// Employee id or directory user id being acted on
    pub fn subject_identity(&self) -> &str {
        &self.subject_identity
    }

    /// Input snapshot taken at start
    pub fn parameters(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.parameters
    }

    /// Account created during onboarding
    pub fn account(&self) -> Option<&AccountRef> {
        self.account.as_ref()
    }

    /// Task executions in catalog order
    pub fn tasks(&self) -> &[TaskExecution] {
        &self.tasks
    }

    /// Find the execution record of a task type
    pub fn task(&self, task_type: TaskType) -> Option<&TaskExecution> {
        self.tasks.iter().find(|t| t.task_type == task_type)
    }

    /// Aggregate status
    pub fn status(&self) -> WorkflowStatus {
        self.status
    }

    /// Completion percentage (0-100)
    pub fn progress(&self) -> u8 {
        self.progress
    }

    /// Whether execution was started
    pub fn started(&self) -> bool {
        self.started
    }

    /// Whether cancellation was requested
    pub fn cancel_requested(&self) -> bool {
        self.cancel_requested
    }

    /// Creation time
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Last mutation time
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Time the instance entered a terminal state
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Whether the status can no longer change
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Filter for listing workflow instances
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowFilter {
    /// Only instances of this kind
    pub kind: Option<WorkflowKind>,
    /// Only instances in this status
    pub status: Option<WorkflowStatus>,
}

impl WorkflowFilter {
    /// Filter matching every instance
    pub fn all() -> Self {
        Self::default()
    }

    /// Restrict to a kind
    pub fn with_kind(mut self, kind: WorkflowKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Restrict to a status
    pub fn with_status(mut self, status: WorkflowStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Whether an instance passes the filter
    pub fn matches(&self, instance: &WorkflowInstance) -> bool {
        self.kind.map_or(true, |k| k == instance.kind)
            && self.status.map_or(true, |s| s == instance.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parse_and_display() {
        assert_eq!("Offboarding".parse::<WorkflowKind>(), Ok(WorkflowKind::Offboarding));
        assert_eq!(WorkflowKind::Onboarding.to_string(), "onboarding");
        assert!("rehire".parse::<WorkflowKind>().is_err());
    }

    #[test]
    fn test_status_terminality() {
        assert!(!WorkflowStatus::Pending.is_terminal());
        assert!(!WorkflowStatus::Running.is_terminal());
        assert!(WorkflowStatus::Completed.is_terminal());
        assert!(WorkflowStatus::Failed.is_terminal());
        assert!(WorkflowStatus::Cancelled.is_terminal());
        assert_eq!("canceled".parse::<WorkflowStatus>(), Ok(WorkflowStatus::Cancelled));
    }

    #[test]
    fn test_task_state_dependents() {
        assert!(TaskState::Completed.satisfies_dependents());
        assert!(TaskState::Skipped.satisfies_dependents());
        assert!(!TaskState::Failed.satisfies_dependents());
        assert!(!TaskState::Running.satisfies_dependents());
        assert!(TaskState::Failed.is_terminal());
    }

    #[test]
    fn test_task_type_serializes_snake_case() {
        let json = serde_json::to_string(&TaskType::ArchiveMailboxAndFiles).unwrap();
        assert_eq!(json, "\"archive_mailbox_and_files\"");
        assert_eq!(TaskType::RemoveMfaMethods.as_str(), "remove_mfa_methods");
    }
}
