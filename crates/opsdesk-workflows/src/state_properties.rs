//! Property-based tests for the workflow state machine
//!
//! Random interleavings of task starts, completions, failures, retries and
//! cancellation must keep the aggregate consistent with its tasks.

#[cfg(test)]
mod tests {
    use crate::catalog::TaskCatalog;
    use crate::models::*;
    use crate::parameters::WorkflowParameters;
    use crate::state::StateManager;
    use chrono::{Duration, Utc};
    use proptest::prelude::*;

    #[derive(Debug, Clone, Copy)]
    enum Op {
        Start(usize),
        Complete(usize),
        GiveUp(usize),
        Retry(usize),
        Cancel,
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            4 => any::<usize>().prop_map(Op::Start),
            4 => any::<usize>().prop_map(Op::Complete),
            1 => any::<usize>().prop_map(Op::GiveUp),
            1 => any::<usize>().prop_map(Op::Retry),
            1 => Just(Op::Cancel),
        ]
    }

    fn kind_strategy() -> impl Strategy<Value = WorkflowKind> {
        prop_oneof![Just(WorkflowKind::Onboarding), Just(WorkflowKind::Offboarding)]
    }

    fn running(instance: &WorkflowInstance) -> Vec<usize> {
        instance
            .tasks()
            .iter()
            .enumerate()
            .filter(|(_, t)| t.state() == TaskState::Running)
            .map(|(i, _)| i)
            .collect()
    }

    fn apply(instance: &mut WorkflowInstance, op: Op) {
        let now = Utc::now();
        match op {
            Op::Start(pick) => {
                let eligible = StateManager::eligible_tasks(instance, now, usize::MAX);
                if !eligible.is_empty() {
                    StateManager::start_task(instance, eligible[pick % eligible.len()]);
                }
            }
            Op::Complete(pick) => {
                let running = running(instance);
                if !running.is_empty() {
                    StateManager::complete_task(instance, running[pick % running.len()], Ack::Applied);
                }
            }
            Op::GiveUp(pick) => {
                let running = running(instance);
                if !running.is_empty() {
                    let index = running[pick % running.len()];
                    if instance.tasks()[index].mandatory() {
                        StateManager::fail_task(instance, index, "fatal".to_string());
                    } else {
                        StateManager::skip_task(instance, index, "fatal".to_string());
                    }
                }
            }
            Op::Retry(pick) => {
                let running = running(instance);
                if !running.is_empty() {
                    let index = running[pick % running.len()];
                    StateManager::schedule_retry(
                        instance,
                        index,
                        "throttled".to_string(),
                        now - Duration::milliseconds(1),
                    );
                }
            }
            Op::Cancel => {
                StateManager::request_cancel(instance);
            }
        }
    }

    fn check_invariants(instance: &WorkflowInstance) -> Result<(), TestCaseError> {
        let tasks = instance.tasks();

        prop_assert_eq!(instance.progress(), StateManager::derive_progress(tasks));
        prop_assert_eq!(instance.completed_at().is_some(), instance.is_terminal());

        let mandatory_failed = tasks
            .iter()
            .any(|t| t.mandatory() && t.state() == TaskState::Failed);
        if mandatory_failed {
            prop_assert_eq!(instance.status(), WorkflowStatus::Failed);
        }
        if instance.status() == WorkflowStatus::Completed {
            prop_assert!(tasks.iter().all(|t| t.state().satisfies_dependents()));
            prop_assert_eq!(instance.progress(), 100);
        }
        if instance.status() == WorkflowStatus::Cancelled {
            prop_assert!(tasks.iter().all(|t| t.state() != TaskState::Running));
        }

        for (index, task) in tasks.iter().enumerate() {
            if matches!(task.state(), TaskState::Running | TaskState::Completed) {
                prop_assert!(
                    StateManager::dependencies_satisfied(instance, index),
                    "{} ran before its predecessors",
                    task.task_type()
                );
            }
            prop_assert!(!task.mandatory() || task.state() != TaskState::Skipped);
            prop_assert!(task.mandatory() || task.state() != TaskState::Failed);
        }

        Ok(())
    }

    proptest! {
        #[test]
        fn prop_aggregate_tracks_tasks(
            kind in kind_strategy(),
            ops in prop::collection::vec(op_strategy(), 0..80),
        ) {
            let mut instance = StateManager::create_instance(
                kind,
                "subject".to_string(),
                WorkflowParameters::default(),
                TaskCatalog::standard().materialize(kind),
            );
            StateManager::start_workflow(&mut instance);
            check_invariants(&instance)?;

            let mut terminal: Option<WorkflowStatus> = None;
            for op in ops {
                apply(&mut instance, op);
                check_invariants(&instance)?;

                match terminal {
                    Some(status) => prop_assert_eq!(instance.status(), status),
                    None if instance.is_terminal() => terminal = Some(instance.status()),
                    None => {}
                }
            }
        }

        #[test]
        fn prop_persisted_instances_validate(
            kind in kind_strategy(),
            ops in prop::collection::vec(op_strategy(), 0..40),
        ) {
            let mut instance = StateManager::create_instance(
                kind,
                "subject".to_string(),
                WorkflowParameters::default(),
                TaskCatalog::standard().materialize(kind),
            );
            StateManager::start_workflow(&mut instance);
            for op in ops {
                apply(&mut instance, op);
            }

            let json = serde_json::to_string(&instance).unwrap();
            let restored: WorkflowInstance = serde_json::from_str(&json).unwrap();
            prop_assert!(StateManager::validate_instance(&restored).is_ok());
            prop_assert_eq!(restored, instance);
        }
    }
}
