//! Progress reporting for workflow instances

use crate::models::{TaskState, TaskType, WorkflowInstance, WorkflowKind, WorkflowStatus};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Point-in-time progress summary of one instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressReport {
    /// Instance id
    pub workflow_id: Uuid,
    /// Workflow kind
    pub kind: WorkflowKind,
    /// Aggregate status
    pub status: WorkflowStatus,
    /// Progress percentage (0-100)
    pub progress: u8,
    /// Total tasks
    pub total_tasks: usize,
    /// Tasks completed
    pub completed_tasks: usize,
    /// Tasks skipped after giving up
    pub skipped_tasks: usize,
    /// Tasks failed
    pub failed_tasks: usize,
    /// Tasks with a call in flight
    pub running_tasks: Vec<TaskType>,
    /// Pending tasks currently backing off
    pub retrying_tasks: Vec<TaskType>,
    /// Mean wall time of completed tasks, in milliseconds
    pub average_task_duration_ms: Option<u64>,
    /// Projected completion, for active instances with timing data
    pub estimated_completion_time: Option<DateTime<Utc>>,
}

impl ProgressReport {
    /// Build a report from an instance snapshot
    pub fn from_instance(instance: &WorkflowInstance, now: DateTime<Utc>) -> Self {
        let tasks = instance.tasks();
        let count = |state: TaskState| tasks.iter().filter(|t| t.state() == state).count();

        let completed_tasks = count(TaskState::Completed);
        let skipped_tasks = count(TaskState::Skipped);
        let failed_tasks = count(TaskState::Failed);

        let running_tasks = tasks
            .iter()
            .filter(|t| t.state() == TaskState::Running)
            .map(|t| t.task_type())
            .collect();
        let retrying_tasks = tasks
            .iter()
            .filter(|t| t.state() == TaskState::Pending && t.not_before().map_or(false, |at| at > now))
            .map(|t| t.task_type())
            .collect();

        let durations: Vec<u64> = tasks
            .iter()
            .filter(|t| t.state() == TaskState::Completed)
            .filter_map(|t| match (t.started_at(), t.completed_at()) {
                (Some(start), Some(end)) => (end - start).num_milliseconds().try_into().ok(),
                _ => None,
            })
            .collect();
        let average_task_duration_ms = if durations.is_empty() {
            None
        } else {
            Some(durations.iter().sum::<u64>() / durations.len() as u64)
        };

        let remaining = tasks.iter().filter(|t| !t.state().is_terminal()).count();
        let estimated_completion_time = match average_task_duration_ms {
            Some(avg) if !instance.is_terminal() => {
                now.checked_add_signed(Duration::milliseconds((avg * remaining as u64) as i64))
            }
            _ => None,
        };

        Self {
            workflow_id: instance.id(),
            kind: instance.kind(),
            status: instance.status(),
            progress: instance.progress(),
            total_tasks: tasks.len(),
            completed_tasks,
            skipped_tasks,
            failed_tasks,
            running_tasks,
            retrying_tasks,
            average_task_duration_ms,
            estimated_completion_time,
        }
    }

    /// Tasks that have not settled yet
    pub fn remaining_tasks(&self) -> usize {
        self.total_tasks - self.completed_tasks - self.skipped_tasks - self.failed_tasks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TaskCatalog;
    use crate::models::Ack;
    use crate::parameters::WorkflowParameters;
    use crate::state::StateManager;

    fn instance() -> WorkflowInstance {
        let mut instance = StateManager::create_instance(
            WorkflowKind::Offboarding,
            "u123".to_string(),
            WorkflowParameters::default(),
            TaskCatalog::standard().materialize(WorkflowKind::Offboarding),
        );
        StateManager::start_workflow(&mut instance);
        instance
    }

    #[test]
    fn test_fresh_report() {
        let report = ProgressReport::from_instance(&instance(), Utc::now());
        assert_eq!(report.total_tasks, 6);
        assert_eq!(report.remaining_tasks(), 6);
        assert_eq!(report.progress, 0);
        assert!(report.average_task_duration_ms.is_none());
        assert!(report.estimated_completion_time.is_none());
    }

    #[test]
    fn test_report_counts_states() {
        let mut wf = instance();
        StateManager::start_task(&mut wf, 0);
        StateManager::complete_task(&mut wf, 0, Ack::Applied);
        StateManager::start_task(&mut wf, 1);

        let now = Utc::now();
        let report = ProgressReport::from_instance(&wf, now);
        assert_eq!(report.completed_tasks, 1);
        assert_eq!(report.running_tasks, vec![TaskType::RevokeSessions]);
        assert!(report.average_task_duration_ms.is_some());
        assert!(report.estimated_completion_time.unwrap() >= now);
    }

    #[test]
    fn test_retrying_tasks_listed() {
        let mut wf = instance();
        StateManager::start_task(&mut wf, 0);
        let now = Utc::now();
        StateManager::schedule_retry(&mut wf, 0, "429".to_string(), now + Duration::seconds(5));

        let report = ProgressReport::from_instance(&wf, now);
        assert_eq!(report.retrying_tasks, vec![TaskType::DisableAccount]);
        assert!(report.running_tasks.is_empty());
    }
}
