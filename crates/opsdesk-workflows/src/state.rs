//! Workflow instance state machine
//!
//! All mutation of [`WorkflowInstance`] and its task executions goes through
//! [`StateManager`]. Every mutation ends by recomputing progress and status
//! from the task vector, so the aggregate can never drift from per-task truth.

use crate::error::{WorkflowError, WorkflowResult};
use crate::models::{
    Ack, TaskExecution, TaskState, TaskType, WorkflowInstance, WorkflowKind, WorkflowStatus,
};
use crate::parameters::WorkflowParameters;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::time::Duration;
use uuid::Uuid;

/// A change of aggregate status caused by a mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    /// Status before the mutation
    pub from: WorkflowStatus,
    /// Status after the mutation
    pub to: WorkflowStatus,
}

const INTERRUPTED: &str = "interrupted before completion";

/// Tasks touched by [`StateManager::recover_interrupted`]
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct Recovery {
    /// Tasks returned to `Pending`
    pub reset: Vec<TaskType>,
    /// Tasks that had used their last attempt, with the state they settled in
    pub exhausted: Vec<(TaskType, TaskState)>,
    /// Aggregate status change, if any
    pub change: Option<StatusChange>,
}

impl Recovery {
    /// Whether nothing was interrupted
    pub fn is_empty(&self) -> bool {
        self.reset.is_empty() && self.exhausted.is_empty()
    }
}

/// Manages workflow instance state
pub struct StateManager;

impl StateManager {
    /// Create a new pending instance
    pub(crate) fn create_instance(
        kind: WorkflowKind,
        subject_identity: String,
        parameters: WorkflowParameters,
        tasks: Vec<TaskExecution>,
    ) -> WorkflowInstance {
        let now = Utc::now();
        let mut instance = WorkflowInstance {
            id: Uuid::new_v4(),
            kind,
            subject_identity,
            parameters: parameters.into_map(),
            account: None,
            tasks,
            status: WorkflowStatus::Pending,
            progress: 0,
            started: false,
            cancel_requested: false,
            created_at: now,
            updated_at: now,
            completed_at: None,
        };
        Self::refresh(&mut instance);
        instance
    }

    /// Derive aggregate status from the task vector and lifecycle flags
    pub fn derive_status(
        tasks: &[TaskExecution],
        started: bool,
        cancel_requested: bool,
    ) -> WorkflowStatus {
        if tasks
            .iter()
            .any(|t| t.mandatory && t.state == TaskState::Failed)
        {
            return WorkflowStatus::Failed;
        }
        if tasks.iter().all(|t| t.state.satisfies_dependents()) {
            return WorkflowStatus::Completed;
        }
        if cancel_requested && !tasks.iter().any(|t| t.state == TaskState::Running) {
            return WorkflowStatus::Cancelled;
        }
        if started {
            WorkflowStatus::Running
        } else {
            WorkflowStatus::Pending
        }
    }

    /// Percentage of tasks completed or skipped
    pub fn derive_progress(tasks: &[TaskExecution]) -> u8 {
        if tasks.is_empty() {
            return 0;
        }
        let settled = tasks
            .iter()
            .filter(|t| t.state.satisfies_dependents())
            .count();
        ((settled * 100) / tasks.len()).min(100) as u8
    }

    /// Recompute progress and status; set `completed_at` on first terminal entry
    pub(crate) fn refresh(instance: &mut WorkflowInstance) -> Option<StatusChange> {
        let now = Utc::now();
        instance.progress = Self::derive_progress(&instance.tasks);
        instance.updated_at = now;

        let from = instance.status;
        if from.is_terminal() {
            return None;
        }

        let to = Self::derive_status(&instance.tasks, instance.started, instance.cancel_requested);
        if to == from {
            return None;
        }

        instance.status = to;
        if to.is_terminal() && instance.completed_at.is_none() {
            instance.completed_at = Some(now);
        }
        Some(StatusChange { from, to })
    }

    /// Mark the instance as started
    pub(crate) fn start_workflow(instance: &mut WorkflowInstance) -> Option<StatusChange> {
        instance.started = true;
        Self::refresh(instance)
    }

    /// Request cancellation; no-op on terminal instances
    pub(crate) fn request_cancel(instance: &mut WorkflowInstance) -> Option<StatusChange> {
        if instance.status.is_terminal() {
            return None;
        }
        instance.cancel_requested = true;
        Self::refresh(instance)
    }

    /// Mark a task as running and count the attempt
    pub(crate) fn start_task(instance: &mut WorkflowInstance, index: usize) -> Option<StatusChange> {
        let task = &mut instance.tasks[index];
        task.state = TaskState::Running;
        task.attempt += 1;
        task.not_before = None;
        task.started_at = Some(Utc::now());
        Self::refresh(instance)
    }

    /// Mark a task as completed
    pub(crate) fn complete_task(
        instance: &mut WorkflowInstance,
        index: usize,
        ack: Ack,
    ) -> Option<StatusChange> {
        let task = &mut instance.tasks[index];
        task.state = TaskState::Completed;
        task.outcome = Some(ack);
        task.last_error = None;
        task.completed_at = Some(Utc::now());
        Self::refresh(instance)
    }

    /// Return a task to pending until `not_before`
    pub(crate) fn schedule_retry(
        instance: &mut WorkflowInstance,
        index: usize,
        error: String,
        not_before: DateTime<Utc>,
    ) -> Option<StatusChange> {
        let task = &mut instance.tasks[index];
        task.state = TaskState::Pending;
        task.last_error = Some(error);
        task.not_before = Some(not_before);
        Self::refresh(instance)
    }

    /// Mark a mandatory task as failed
    pub(crate) fn fail_task(
        instance: &mut WorkflowInstance,
        index: usize,
        error: String,
    ) -> Option<StatusChange> {
        let task = &mut instance.tasks[index];
        task.state = TaskState::Failed;
        task.last_error = Some(error);
        task.completed_at = Some(Utc::now());
        Self::refresh(instance)
    }

    /// Mark an optional task as skipped, keeping its error
    pub(crate) fn skip_task(
        instance: &mut WorkflowInstance,
        index: usize,
        error: String,
    ) -> Option<StatusChange> {
        let task = &mut instance.tasks[index];
        task.state = TaskState::Skipped;
        task.last_error = Some(error);
        task.completed_at = Some(Utc::now());
        Self::refresh(instance)
    }

    /// Record the account created by onboarding
    pub(crate) fn record_account(instance: &mut WorkflowInstance, account: crate::models::AccountRef) {
        instance.account = Some(account);
        instance.updated_at = Utc::now();
    }

    /// Settle tasks interrupted mid-call
    ///
    /// A task found `Running` in a stored instance was cut off by a crash and
    /// the interrupted attempt counts. With attempts left it goes back to
    /// `Pending` (directory operations are idempotent); on its last allowed
    /// attempt it gives up like any other exhausted task.
    pub(crate) fn recover_interrupted(instance: &mut WorkflowInstance, max_attempts: u32) -> Recovery {
        let now = Utc::now();
        let mut recovery = Recovery::default();

        for task in instance.tasks.iter_mut() {
            if task.state != TaskState::Running {
                continue;
            }
            task.last_error = Some(INTERRUPTED.to_string());
            if task.attempt >= max_attempts {
                task.state = if task.mandatory {
                    TaskState::Failed
                } else {
                    TaskState::Skipped
                };
                task.completed_at = Some(now);
                recovery.exhausted.push((task.task_type, task.state));
            } else {
                task.state = TaskState::Pending;
                recovery.reset.push(task.task_type);
            }
        }

        recovery.change = Self::refresh(instance);
        recovery
    }

    /// Whether every predecessor of a task has completed or been skipped
    pub fn dependencies_satisfied(instance: &WorkflowInstance, index: usize) -> bool {
        instance.tasks[index].depends_on.iter().all(|dep| {
            instance
                .tasks
                .iter()
                .find(|t| t.task_type == *dep)
                .map_or(true, |t| t.state.satisfies_dependents())
        })
    }

    /// Whether new tasks may start at all
    pub fn accepts_new_tasks(instance: &WorkflowInstance) -> bool {
        instance.started && !instance.cancel_requested && !instance.status.is_terminal()
    }

    /// Indices of tasks that may start now, in catalog order
    ///
    /// At most `max_running` tasks run at once, counting tasks already running.
    pub fn eligible_tasks(
        instance: &WorkflowInstance,
        now: DateTime<Utc>,
        max_running: usize,
    ) -> Vec<usize> {
        if !Self::accepts_new_tasks(instance) {
            return Vec::new();
        }

        let running = instance
            .tasks
            .iter()
            .filter(|t| t.state == TaskState::Running)
            .count();
        let slots = max_running.saturating_sub(running);

        instance
            .tasks
            .iter()
            .enumerate()
            .filter(|(_, t)| t.state == TaskState::Pending)
            .filter(|(_, t)| t.not_before.map_or(true, |at| at <= now))
            .filter(|(i, _)| Self::dependencies_satisfied(instance, *i))
            .map(|(i, _)| i)
            .take(slots)
            .collect()
    }

    /// Time until the earliest backed-off task becomes eligible
    pub fn next_backoff(instance: &WorkflowInstance, now: DateTime<Utc>) -> Option<Duration> {
        if !Self::accepts_new_tasks(instance) {
            return None;
        }

        instance
            .tasks
            .iter()
            .enumerate()
            .filter(|(_, t)| t.state == TaskState::Pending)
            .filter(|(i, _)| Self::dependencies_satisfied(instance, *i))
            .filter_map(|(_, t)| t.not_before)
            .filter(|at| *at > now)
            .min()
            .map(|at| (at - now).to_std().unwrap_or_default())
    }

    /// Validate instance integrity
    pub fn validate_instance(instance: &WorkflowInstance) -> WorkflowResult<()> {
        if instance.subject_identity.trim().is_empty() {
            return Err(WorkflowError::InvalidState(format!(
                "Workflow {} has no subject identity",
                instance.id
            )));
        }

        if instance.tasks.is_empty() {
            return Err(WorkflowError::InvalidState(format!(
                "Workflow {} has no tasks",
                instance.id
            )));
        }

        let mut seen = HashSet::new();
        for task in &instance.tasks {
            if !seen.insert(task.task_type) {
                return Err(WorkflowError::InvalidState(format!(
                    "Workflow {} lists task '{}' twice",
                    instance.id, task.task_type
                )));
            }
        }

        if instance.progress != Self::derive_progress(&instance.tasks) {
            return Err(WorkflowError::InvalidState(format!(
                "Workflow {} progress {} does not match its tasks",
                instance.id, instance.progress
            )));
        }

        let derived =
            Self::derive_status(&instance.tasks, instance.started, instance.cancel_requested);
        if !instance.status.is_terminal() && derived != instance.status {
            return Err(WorkflowError::InvalidState(format!(
                "Workflow {} status {} does not match its tasks ({})",
                instance.id, instance.status, derived
            )));
        }

        if instance.status.is_terminal() && instance.completed_at.is_none() {
            return Err(WorkflowError::InvalidState(format!(
                "Workflow {} is {} but has no completion time",
                instance.id, instance.status
            )));
        }

        Ok(())
    }
}
