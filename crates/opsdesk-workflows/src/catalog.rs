//! Task definition catalog
//!
//! An ordered list of task templates per workflow kind. List order is the
//! execution order; `depends_on` names the predecessors a task waits for.
//! The catalog is read only when an instance is created, so changing it never
//! affects workflows already in flight.

use crate::error::{WorkflowError, WorkflowResult};
use crate::models::{TaskExecution, TaskType, WorkflowKind};
use std::collections::HashSet;

/// Template for one task of a workflow kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskTemplate {
    /// Directory operation to invoke
    pub task_type: TaskType,
    /// Whether failure fails the workflow
    pub mandatory: bool,
    /// Tasks that must settle first
    pub depends_on: Vec<TaskType>,
}

impl TaskTemplate {
    /// Mandatory task
    pub fn mandatory(task_type: TaskType, depends_on: &[TaskType]) -> Self {
        Self {
            task_type,
            mandatory: true,
            depends_on: depends_on.to_vec(),
        }
    }

    /// Skippable task
    pub fn optional(task_type: TaskType, depends_on: &[TaskType]) -> Self {
        Self {
            task_type,
            mandatory: false,
            depends_on: depends_on.to_vec(),
        }
    }
}

/// Ordered task templates for both workflow kinds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskCatalog {
    onboarding: Vec<TaskTemplate>,
    offboarding: Vec<TaskTemplate>,
}

impl Default for TaskCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

impl TaskCatalog {
    /// Build a custom catalog, validating both lists
    pub fn new(onboarding: Vec<TaskTemplate>, offboarding: Vec<TaskTemplate>) -> WorkflowResult<Self> {
        Self::validate(WorkflowKind::Onboarding, &onboarding)?;
        Self::validate(WorkflowKind::Offboarding, &offboarding)?;
        Ok(Self {
            onboarding,
            offboarding,
        })
    }

    /// The standard lifecycle catalog
    pub fn standard() -> Self {
        use TaskType::*;

        Self {
            onboarding: vec![
                TaskTemplate::mandatory(CreateAccount, &[]),
                TaskTemplate::mandatory(AssignLicense, &[CreateAccount]),
                TaskTemplate::optional(AddToGroups, &[AssignLicense]),
                TaskTemplate::optional(AssignAsset, &[AssignLicense]),
            ],
            offboarding: vec![
                TaskTemplate::mandatory(DisableAccount, &[]),
                TaskTemplate::mandatory(RevokeSessions, &[]),
                TaskTemplate::mandatory(ArchiveMailboxAndFiles, &[DisableAccount, RevokeSessions]),
                TaskTemplate::optional(RemoveMfaMethods, &[DisableAccount]),
                TaskTemplate::optional(RemoveFromGroups, &[DisableAccount]),
                TaskTemplate::optional(ReleaseAsset, &[]),
            ],
        }
    }

    /// Templates for a kind, in execution order
    pub fn templates(&self, kind: WorkflowKind) -> &[TaskTemplate] {
        match kind {
            WorkflowKind::Onboarding => &self.onboarding,
            WorkflowKind::Offboarding => &self.offboarding,
        }
    }

    /// Materialize fresh task executions for a new instance
    pub fn materialize(&self, kind: WorkflowKind) -> Vec<TaskExecution> {
        self.templates(kind)
            .iter()
            .map(|t| TaskExecution::new(t.task_type, t.mandatory, t.depends_on.clone()))
            .collect()
    }

    /// Check that a template list is non-empty, has no duplicates and only
    /// depends on earlier entries
    fn validate(kind: WorkflowKind, templates: &[TaskTemplate]) -> WorkflowResult<()> {
        if templates.is_empty() {
            return Err(WorkflowError::Catalog(format!("{} has no tasks", kind)));
        }

        let mut seen = HashSet::new();
        for template in templates {
            for dep in &template.depends_on {
                if !seen.contains(dep) {
                    return Err(WorkflowError::Catalog(format!(
                        "{}: task '{}' depends on '{}', which is not declared before it",
                        kind, template.task_type, dep
                    )));
                }
            }
            if !seen.insert(template.task_type) {
                return Err(WorkflowError::Catalog(format!(
                    "{}: task '{}' declared twice",
                    kind, template.task_type
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskState;
    use TaskType::*;

    #[test]
    fn test_standard_catalog_is_valid() {
        let catalog = TaskCatalog::standard();
        assert!(TaskCatalog::new(
            catalog.templates(WorkflowKind::Onboarding).to_vec(),
            catalog.templates(WorkflowKind::Offboarding).to_vec(),
        )
        .is_ok());
    }

    #[test]
    fn test_offboarding_archive_waits_for_disable_and_revoke() {
        let catalog = TaskCatalog::standard();
        let archive = catalog
            .templates(WorkflowKind::Offboarding)
            .iter()
            .find(|t| t.task_type == ArchiveMailboxAndFiles)
            .unwrap();
        assert!(archive.depends_on.contains(&DisableAccount));
        assert!(archive.depends_on.contains(&RevokeSessions));
        assert!(archive.mandatory);
    }

    #[test]
    fn test_onboarding_order() {
        let catalog = TaskCatalog::standard();
        let order: Vec<_> = catalog
            .templates(WorkflowKind::Onboarding)
            .iter()
            .map(|t| t.task_type)
            .collect();
        assert_eq!(order, vec![CreateAccount, AssignLicense, AddToGroups, AssignAsset]);
    }

    #[test]
    fn test_materialize_starts_pending() {
        let tasks = TaskCatalog::standard().materialize(WorkflowKind::Offboarding);
        assert_eq!(tasks.len(), 6);
        assert!(tasks.iter().all(|t| t.state() == TaskState::Pending && t.attempt() == 0));
        assert_eq!(tasks[2].depends_on(), &[DisableAccount, RevokeSessions]);
    }

    #[test]
    fn test_forward_dependency_is_rejected() {
        let result = TaskCatalog::new(
            vec![
                TaskTemplate::mandatory(AssignLicense, &[CreateAccount]),
                TaskTemplate::mandatory(CreateAccount, &[]),
            ],
            TaskCatalog::standard().templates(WorkflowKind::Offboarding).to_vec(),
        );
        assert!(matches!(result, Err(WorkflowError::Catalog(_))));
    }

    #[test]
    fn test_duplicate_and_empty_rejected() {
        let duplicate = TaskCatalog::new(
            vec![
                TaskTemplate::mandatory(CreateAccount, &[]),
                TaskTemplate::mandatory(CreateAccount, &[]),
            ],
            vec![TaskTemplate::mandatory(DisableAccount, &[])],
        );
        assert!(duplicate.is_err());

        let empty = TaskCatalog::new(vec![], vec![TaskTemplate::mandatory(DisableAccount, &[])]);
        assert!(empty.is_err());
    }
}
