//! Workflow execution engine
//!
//! Central coordinator for lifecycle workflows. Each active instance lives in
//! an [`InstanceSlot`]: the instance itself behind an async mutex so every
//! aggregate update is atomic, plus a driver mutex that serializes
//! `execute_next`/`drive` for that instance. Directory calls happen with no
//! instance lock held; results are settled back under the lock.
//!
//! A slot exists only while something in this process is driving the
//! instance. Reads go to the repository, and a driver re-reads the stored
//! `cancel_requested` flag before claiming or settling work, so a cancel
//! written by another engine sharing the repository is honoured.

use crate::audit::{AuditEntry, AuditEvent, AuditSink};
use crate::catalog::TaskCatalog;
use crate::config::EngineConfig;
use crate::directory::{DirectoryAdapter, DirectoryResult};
use crate::error::{WorkflowError, WorkflowResult};
use crate::executor::{TaskContext, TaskExecutor, TaskOutput};
use crate::models::{
    TaskState, TaskType, WorkflowFilter, WorkflowInstance, WorkflowKind, WorkflowStatus,
};
use crate::parameters::{ParameterDefaults, ParameterValidator};
use crate::progress::ProgressReport;
use crate::state::{StateManager, StatusChange};
use crate::store::WorkflowRepository;
use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Longest a waiting driver goes without re-reading the stored instance
const STORE_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Outcome of a single [`WorkflowEngine::execute_next`] step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// One task ran and settled in `state`
    Executed {
        /// Task that ran
        task_type: TaskType,
        /// State after the attempt
        state: TaskState,
    },
    /// Only backed-off tasks remain; the earliest becomes eligible after the delay
    Waiting(Duration),
    /// Nothing can run
    Idle,
}

struct InstanceSlot {
    instance: AsyncMutex<WorkflowInstance>,
    driver: AsyncMutex<()>,
    wake: Notify,
}

impl InstanceSlot {
    fn new(instance: WorkflowInstance) -> Self {
        Self {
            instance: AsyncMutex::new(instance),
            driver: AsyncMutex::new(()),
            wake: Notify::new(),
        }
    }
}

/// A task marked running and waiting for its directory call
struct Claim {
    index: usize,
    task_type: TaskType,
    attempt: u32,
    mandatory: bool,
    context: TaskContext,
}

/// Orchestrates onboarding and offboarding workflows
pub struct WorkflowEngine {
    config: EngineConfig,
    catalog: TaskCatalog,
    defaults: ParameterDefaults,
    executor: TaskExecutor,
    repository: Arc<dyn WorkflowRepository>,
    audit: Arc<dyn AuditSink>,
    slots: RwLock<HashMap<Uuid, Arc<InstanceSlot>>>,
    drivers: Mutex<HashMap<Uuid, JoinHandle<WorkflowResult<WorkflowInstance>>>>,
}

impl WorkflowEngine {
    /// Create an engine using the standard task catalog
    pub fn new(
        config: EngineConfig,
        repository: Arc<dyn WorkflowRepository>,
        directory: Arc<dyn DirectoryAdapter>,
        audit: Arc<dyn AuditSink>,
    ) -> WorkflowResult<Self> {
        config.validate()?;
        let defaults = config.parameter_defaults();
        let executor = TaskExecutor::new(directory, defaults.clone(), config.retry.call_timeout());

        Ok(Self {
            config,
            catalog: TaskCatalog::standard(),
            defaults,
            executor,
            repository,
            audit,
            slots: RwLock::new(HashMap::new()),
            drivers: Mutex::new(HashMap::new()),
        })
    }

    /// Replace the task catalog; affects only instances started afterwards
    pub fn with_catalog(mut self, catalog: TaskCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Task catalog used for new instances
    pub fn catalog(&self) -> &TaskCatalog {
        &self.catalog
    }

    /// Validate parameters, create the instance and start executing it
    ///
    /// Returns the `Running` snapshot immediately; a background driver
    /// advances the instance until it reaches a terminal status.
    pub async fn start(
        self: &Arc<Self>,
        kind: WorkflowKind,
        parameters: BTreeMap<String, Value>,
    ) -> WorkflowResult<WorkflowInstance> {
        let instance = self.submit(kind, parameters).await?;
        self.spawn_driver(instance.id());
        Ok(instance)
    }

    /// Validate parameters, create and persist a `Running` instance, but do
    /// not drive it
    ///
    /// Callers advance the instance themselves with [`Self::execute_next`] or
    /// [`Self::drive`]. Nothing is persisted when validation fails.
    pub async fn submit(
        &self,
        kind: WorkflowKind,
        parameters: BTreeMap<String, Value>,
    ) -> WorkflowResult<WorkflowInstance> {
        let params = ParameterValidator::validate(kind, parameters, &self.defaults)?;
        let subject = params.subject_identity().ok_or_else(|| {
            WorkflowError::validation("Required parameter 'subjectIdentity' not provided")
        })?;

        let tasks = self.catalog.materialize(kind);
        let mut instance = StateManager::create_instance(kind, subject, params, tasks);
        self.repository.save(&instance).await?;

        StateManager::start_workflow(&mut instance);
        self.repository.save(&instance).await?;

        info!(
            workflow_id = %instance.id,
            %kind,
            subject = %instance.subject_identity,
            tasks = instance.tasks.len(),
            "Workflow started"
        );
        self.audit
            .record(AuditEntry::started(instance.id, kind, &instance.subject_identity));

        Ok(instance)
    }

    /// Advance exactly one eligible task
    pub async fn execute_next(&self, id: Uuid) -> WorkflowResult<Advance> {
        let slot = self.slot(id).await?;
        let advance = {
            let _driver = slot.driver.lock().await;
            self.step(&slot).await
        };
        self.release(id, slot);
        advance
    }

    async fn step(&self, slot: &InstanceSlot) -> WorkflowResult<Advance> {
        let mut claims = self.claim(slot, 1).await?;
        match claims.pop() {
            Some(claim) => {
                let task_type = claim.task_type;
                let state = self.run_claim(slot, claim).await?;
                Ok(Advance::Executed { task_type, state })
            }
            None => {
                let instance = slot.instance.lock().await;
                Ok(match StateManager::next_backoff(&instance, Utc::now()) {
                    Some(delay) => Advance::Waiting(delay),
                    None => Advance::Idle,
                })
            }
        }
    }

    /// Run an instance until nothing more can happen
    ///
    /// Starts up to `max_parallel_tasks` independent tasks at once and sleeps
    /// through retry backoff. Returns the final snapshot.
    pub async fn drive(&self, id: Uuid) -> WorkflowResult<WorkflowInstance> {
        let slot = self.slot(id).await?;
        let result = {
            let _driver = slot.driver.lock().await;
            self.run_to_rest(id, &slot).await
        };
        self.release(id, slot);
        let snapshot = result?;
        debug!(workflow_id = %id, status = %snapshot.status, "Driver finished");
        Ok(snapshot)
    }

    async fn run_to_rest(&self, id: Uuid, slot: &InstanceSlot) -> WorkflowResult<WorkflowInstance> {
        let limit = self.config.max_parallel_tasks;
        let mut in_flight = FuturesUnordered::new();

        loop {
            for claim in self.claim(slot, limit).await? {
                in_flight.push(self.run_claim(slot, claim));
            }

            if in_flight.is_empty() {
                let delay = {
                    let instance = slot.instance.lock().await;
                    StateManager::next_backoff(&instance, Utc::now())
                };
                match delay {
                    Some(delay) => {
                        debug!(workflow_id = %id, delay_ms = delay.as_millis() as u64, "Waiting for retry backoff");
                        tokio::select! {
                            _ = tokio::time::sleep(delay.min(STORE_POLL_INTERVAL)) => {}
                            _ = slot.wake.notified() => {}
                        }
                        continue;
                    }
                    None => break,
                }
            }

            if let Some(result) = in_flight.next().await {
                result?;
            }
        }

        let snapshot = slot.instance.lock().await.clone();
        Ok(snapshot)
    }

    /// Request cancellation
    ///
    /// Tasks already running finish and are recorded; no new task starts.
    /// Cancelling a terminal instance changes nothing. When no driver in this
    /// engine holds the instance, the flag is written to the stored copy and
    /// whichever engine drives it picks it up.
    pub async fn cancel(&self, id: Uuid) -> WorkflowResult<WorkflowInstance> {
        let slot = self.slots.read().get(&id).cloned();
        match slot {
            Some(slot) => {
                let snapshot = {
                    let mut instance = slot.instance.lock().await;
                    self.request_cancel(&mut instance).await?;
                    instance.clone()
                };
                slot.wake.notify_one();
                self.release(id, slot);
                Ok(snapshot)
            }
            None => {
                let mut instance = self
                    .repository
                    .find_by_id(&id)
                    .await?
                    .ok_or(WorkflowError::NotFound(id))?;
                self.request_cancel(&mut instance).await?;
                Ok(instance)
            }
        }
    }

    async fn request_cancel(&self, instance: &mut WorkflowInstance) -> WorkflowResult<()> {
        if instance.is_terminal() {
            debug!(workflow_id = %instance.id, status = %instance.status, "Cancel ignored for terminal workflow");
            return Ok(());
        }

        let change = StateManager::request_cancel(instance);
        info!(workflow_id = %instance.id, "Cancellation requested");
        self.audit_change(instance, change);
        self.repository.save(instance).await?;
        Ok(())
    }

    /// Current snapshot of an instance, as stored
    pub async fn get_instance(&self, id: Uuid) -> WorkflowResult<WorkflowInstance> {
        self.repository
            .find_by_id(&id)
            .await?
            .ok_or(WorkflowError::NotFound(id))
    }

    /// Instances matching a filter, oldest first
    pub async fn list_instances(
        &self,
        filter: &WorkflowFilter,
    ) -> WorkflowResult<Vec<WorkflowInstance>> {
        Ok(self.repository.list(filter).await?)
    }

    /// Wait for the background driver of an instance and return its final
    /// snapshot; without a driver, returns the current snapshot
    pub async fn wait(&self, id: Uuid) -> WorkflowResult<WorkflowInstance> {
        let handle = self.drivers.lock().remove(&id);
        match handle {
            Some(handle) => handle
                .await
                .map_err(|e| WorkflowError::Join(e.to_string()))?,
            None => self.get_instance(id).await,
        }
    }

    /// Pick up every stored non-terminal instance after a restart
    ///
    /// Tasks interrupted in `Running` run again unless that was their last
    /// allowed attempt. Returns the ids of the instances now being driven.
    pub async fn resume_incomplete(self: &Arc<Self>) -> WorkflowResult<Vec<Uuid>> {
        let mut resumed = Vec::new();

        for stored in self.repository.find_incomplete().await? {
            let id = stored.id();
            if self.has_live_driver(id) {
                continue;
            }

            let slot = self.slot(id).await?;
            let resumable = {
                let mut instance = slot.instance.lock().await;
                if instance.is_terminal() {
                    false
                } else {
                    self.mark_resumed(&mut instance).await?;
                    true
                }
            };

            if resumable {
                self.spawn_driver(id);
                resumed.push(id);
            }
            self.release(id, slot);
        }

        Ok(resumed)
    }

    async fn mark_resumed(&self, instance: &mut WorkflowInstance) -> WorkflowResult<()> {
        let id = instance.id;
        let change = if instance.started {
            None
        } else {
            StateManager::start_workflow(instance)
        };

        info!(workflow_id = %id, progress = instance.progress, "Resuming workflow");
        self.audit.record(
            AuditEntry::workflow(
                id,
                AuditEvent::WorkflowResumed,
                format!("{} resumed at {}%", instance.kind, instance.progress),
            )
            .with_context(json!({"status": instance.status})),
        );
        self.audit_change(instance, change);
        self.repository.save(instance).await?;
        Ok(())
    }

    /// Progress summary of an instance
    pub async fn progress_report(&self, id: Uuid) -> WorkflowResult<ProgressReport> {
        let instance = self.get_instance(id).await?;
        Ok(ProgressReport::from_instance(&instance, Utc::now()))
    }

    fn spawn_driver(self: &Arc<Self>, id: Uuid) {
        let engine = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let result = engine.drive(id).await;
            if let Err(e) = &result {
                warn!(workflow_id = %id, error = %e, "Workflow driver stopped");
            }
            result
        });

        let mut drivers = self.drivers.lock();
        drivers.retain(|_, h| !h.is_finished());
        drivers.insert(id, handle);
    }

    fn has_live_driver(&self, id: Uuid) -> bool {
        self.drivers
            .lock()
            .get(&id)
            .map_or(false, |h| !h.is_finished())
    }

    /// Slot for an instance, loading it from the repository if needed
    ///
    /// A freshly loaded instance cannot have a call in flight in this process,
    /// so any task still marked `Running` was interrupted. It runs again if it
    /// has attempts left and gives up otherwise.
    async fn slot(&self, id: Uuid) -> WorkflowResult<Arc<InstanceSlot>> {
        let existing = self.slots.read().get(&id).cloned();
        if let Some(slot) = existing {
            return Ok(slot);
        }

        let instance = self
            .repository
            .find_by_id(&id)
            .await?
            .ok_or(WorkflowError::NotFound(id))?;

        let slot = Arc::new(InstanceSlot::new(instance));
        let mut instance = slot.instance.try_lock().map_err(|_| {
            WorkflowError::InvalidState(format!("Workflow {} slot is already locked", id))
        })?;

        {
            let mut slots = self.slots.write();
            if let Some(existing) = slots.get(&id) {
                return Ok(Arc::clone(existing));
            }
            slots.insert(id, Arc::clone(&slot));
        }

        if !instance.is_terminal() {
            let recovery =
                StateManager::recover_interrupted(&mut instance, self.config.retry.max_attempts);
            if !recovery.is_empty() {
                warn!(
                    workflow_id = %id,
                    reset = ?recovery.reset,
                    exhausted = ?recovery.exhausted,
                    "Recovered interrupted tasks"
                );
                for (task_type, state) in &recovery.exhausted {
                    let event = if *state == TaskState::Failed {
                        AuditEvent::TaskFailed
                    } else {
                        AuditEvent::TaskSkipped
                    };
                    self.audit.record(AuditEntry::task(
                        id,
                        *task_type,
                        event,
                        format!("{} gave up: interrupted on its last attempt", task_type.label()),
                    ));
                }
                self.audit_change(&instance, recovery.change);
                if let Err(e) = self.repository.save(&instance).await {
                    drop(instance);
                    self.slots.write().remove(&id);
                    return Err(e.into());
                }
            }
        }
        drop(instance);

        Ok(slot)
    }

    /// Drop the slot once nothing but the map and the caller hold it
    fn release(&self, id: Uuid, slot: Arc<InstanceSlot>) {
        let mut slots = self.slots.write();
        let idle = slots
            .get(&id)
            .map_or(false, |held| Arc::ptr_eq(held, &slot) && Arc::strong_count(&slot) == 2);
        if idle {
            slots.remove(&id);
        }
    }

    /// Pick up a cancel another engine wrote to the stored copy
    ///
    /// Returns whether the local instance changed.
    async fn absorb_stored_cancel(&self, instance: &mut WorkflowInstance) -> WorkflowResult<bool> {
        if instance.cancel_requested || instance.is_terminal() {
            return Ok(false);
        }
        let stored = self.repository.find_by_id(&instance.id).await?;
        if !stored.map_or(false, |s| s.cancel_requested) {
            return Ok(false);
        }

        info!(workflow_id = %instance.id, "Cancellation found in store");
        let change = StateManager::request_cancel(instance);
        self.audit_change(instance, change);
        Ok(true)
    }

    /// Mark eligible tasks running and persist that before any call is made
    async fn claim(&self, slot: &InstanceSlot, limit: usize) -> WorkflowResult<Vec<Claim>> {
        let mut instance = slot.instance.lock().await;
        let absorbed = self.absorb_stored_cancel(&mut instance).await?;
        let eligible = StateManager::eligible_tasks(&instance, Utc::now(), limit);
        if eligible.is_empty() {
            if absorbed {
                self.repository.save(&instance).await?;
            }
            return Ok(Vec::new());
        }

        let context = TaskContext::from_instance(&instance);
        let mut claims = Vec::with_capacity(eligible.len());
        for index in eligible {
            StateManager::start_task(&mut instance, index);
            let task = &instance.tasks[index];
            let claim = Claim {
                index,
                task_type: task.task_type,
                attempt: task.attempt,
                mandatory: task.mandatory,
                context: context.clone(),
            };

            debug!(workflow_id = %instance.id, task = %claim.task_type, attempt = claim.attempt, "Task started");
            self.audit.record(
                AuditEntry::task(
                    instance.id,
                    claim.task_type,
                    AuditEvent::TaskStarted,
                    format!("{} started (attempt {})", claim.task_type.label(), claim.attempt),
                )
                .with_context(json!({"attempt": claim.attempt})),
            );
            claims.push(claim);
        }

        self.repository.save(&instance).await?;
        Ok(claims)
    }

    async fn run_claim(&self, slot: &InstanceSlot, claim: Claim) -> WorkflowResult<TaskState> {
        let result = self.executor.execute(claim.task_type, &claim.context).await;
        self.settle(slot, &claim, result).await
    }

    /// Record the outcome of a directory call
    async fn settle(
        &self,
        slot: &InstanceSlot,
        claim: &Claim,
        result: DirectoryResult<TaskOutput>,
    ) -> WorkflowResult<TaskState> {
        let mut instance = slot.instance.lock().await;
        let id = instance.id;
        let task_type = claim.task_type;
        let policy = &self.config.retry;
        self.absorb_stored_cancel(&mut instance).await?;

        let change = match result {
            Ok(output) => {
                if let Some(account) = output.account {
                    StateManager::record_account(&mut instance, account);
                }
                info!(workflow_id = %id, task = %task_type, outcome = ?output.ack, "Task completed");
                self.audit.record(
                    AuditEntry::task(
                        id,
                        task_type,
                        AuditEvent::TaskCompleted,
                        format!("{} completed", task_type.label()),
                    )
                    .with_context(json!({"attempt": claim.attempt, "outcome": output.ack})),
                );
                StateManager::complete_task(&mut instance, claim.index, output.ack)
            }
            Err(err) if err.is_retryable() && policy.can_retry(claim.attempt) => {
                let delay = policy.backoff_delay(claim.attempt);
                let not_before = Utc::now()
                    + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
                warn!(
                    workflow_id = %id,
                    task = %task_type,
                    attempt = claim.attempt,
                    retry_in_ms = delay.as_millis() as u64,
                    error = %err,
                    "Task failed, retry scheduled"
                );
                self.audit.record(
                    AuditEntry::task(
                        id,
                        task_type,
                        AuditEvent::TaskRetryScheduled,
                        format!("{} failed: {}; retrying", task_type.label(), err),
                    )
                    .with_context(json!({
                        "attempt": claim.attempt,
                        "error": err,
                        "retry_in_ms": delay.as_millis() as u64,
                    })),
                );
                StateManager::schedule_retry(&mut instance, claim.index, err.to_string(), not_before)
            }
            Err(err) => {
                let event = if claim.mandatory {
                    AuditEvent::TaskFailed
                } else {
                    AuditEvent::TaskSkipped
                };
                warn!(
                    workflow_id = %id,
                    task = %task_type,
                    attempt = claim.attempt,
                    mandatory = claim.mandatory,
                    error = %err,
                    "Task gave up"
                );
                self.audit.record(
                    AuditEntry::task(
                        id,
                        task_type,
                        event,
                        format!("{} gave up: {}", task_type.label(), err),
                    )
                    .with_context(json!({"attempt": claim.attempt, "error": err})),
                );
                if claim.mandatory {
                    StateManager::fail_task(&mut instance, claim.index, err.to_string())
                } else {
                    StateManager::skip_task(&mut instance, claim.index, err.to_string())
                }
            }
        };

        self.audit_change(&instance, change);
        self.repository.save(&instance).await?;
        Ok(instance.tasks[claim.index].state)
    }

    /// Audit workflow-level terminal transitions
    fn audit_change(&self, instance: &WorkflowInstance, change: Option<StatusChange>) {
        let change = match change {
            Some(change) => change,
            None => return,
        };

        let (event, message) = match change.to {
            WorkflowStatus::Completed => (
                AuditEvent::WorkflowCompleted,
                format!("{} completed", instance.kind),
            ),
            WorkflowStatus::Failed => {
                let failed = instance
                    .tasks
                    .iter()
                    .find(|t| t.mandatory && t.state == TaskState::Failed)
                    .map(|t| t.task_type.label())
                    .unwrap_or("a mandatory task");
                (
                    AuditEvent::WorkflowFailed,
                    format!("{} failed at {}", instance.kind, failed),
                )
            }
            WorkflowStatus::Cancelled => (
                AuditEvent::WorkflowCancelled,
                format!("{} cancelled at {}%", instance.kind, instance.progress),
            ),
            WorkflowStatus::Pending | WorkflowStatus::Running => return,
        };

        info!(workflow_id = %instance.id, from = %change.from, to = %change.to, "Workflow status changed");
        self.audit.record(
            AuditEntry::workflow(instance.id, event, message)
                .with_context(json!({"progress": instance.progress})),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAuditLog;
    use crate::directory::{DirectoryError, DirectoryOperation, SimulatedDirectory};
    use crate::store::InMemoryWorkflowRepository;

    fn engine(directory: Arc<SimulatedDirectory>) -> (Arc<WorkflowEngine>, Arc<MemoryAuditLog>) {
        let audit = Arc::new(MemoryAuditLog::default());
        let engine = WorkflowEngine::new(
            EngineConfig::default(),
            Arc::new(InMemoryWorkflowRepository::new()),
            directory,
            audit.clone(),
        )
        .unwrap();
        (Arc::new(engine), audit)
    }

    fn offboarding(subject: &str) -> BTreeMap<String, Value> {
        serde_json::from_value(json!({
            "subjectIdentity": subject,
            "departureDate": "2024-06-01",
            "archiveData": true
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_execute_next_steps_in_catalog_order() {
        let directory = Arc::new(SimulatedDirectory::new());
        directory.seed_account("u123", "u123@example.com");
        let (engine, _) = engine(directory);

        let wf = engine
            .submit(WorkflowKind::Offboarding, offboarding("u123"))
            .await
            .unwrap();
        assert_eq!(wf.status(), WorkflowStatus::Running);

        let first = engine.execute_next(wf.id()).await.unwrap();
        assert_eq!(
            first,
            Advance::Executed {
                task_type: TaskType::DisableAccount,
                state: TaskState::Completed
            }
        );

        let mut steps = 1;
        while let Advance::Executed { .. } = engine.execute_next(wf.id()).await.unwrap() {
            steps += 1;
        }
        assert_eq!(steps, 6);
        assert_eq!(engine.execute_next(wf.id()).await.unwrap(), Advance::Idle);

        let done = engine.get_instance(wf.id()).await.unwrap();
        assert_eq!(done.status(), WorkflowStatus::Completed);
        assert_eq!(done.progress(), 100);
    }

    #[tokio::test]
    async fn test_invalid_start_persists_nothing() {
        let (engine, audit) = engine(Arc::new(SimulatedDirectory::new()));
        let params = serde_json::from_value(json!({"departureDate": "2024-06-01"})).unwrap();

        let err = engine
            .start(WorkflowKind::Offboarding, params)
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert!(engine
            .list_instances(&WorkflowFilter::all())
            .await
            .unwrap()
            .is_empty());
        assert!(audit.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_instance() {
        let (engine, _) = engine(Arc::new(SimulatedDirectory::new()));
        let id = Uuid::new_v4();
        assert!(matches!(
            engine.get_instance(id).await,
            Err(WorkflowError::NotFound(missing)) if missing == id
        ));
        assert!(matches!(
            engine.cancel(id).await,
            Err(WorkflowError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_task_interrupted_on_last_attempt_is_not_called_again() {
        let repository = Arc::new(InMemoryWorkflowRepository::new());
        let first = WorkflowEngine::new(
            EngineConfig::default(),
            repository.clone(),
            Arc::new(SimulatedDirectory::new()),
            Arc::new(MemoryAuditLog::default()),
        )
        .unwrap();
        let wf = first
            .submit(WorkflowKind::Offboarding, offboarding("u77"))
            .await
            .unwrap();

        let mut stored = repository.find_by_id(&wf.id()).await.unwrap().unwrap();
        for _ in 0..first.config().retry.max_attempts {
            StateManager::start_task(&mut stored, 0);
        }
        repository.save(&stored).await.unwrap();

        let directory = Arc::new(SimulatedDirectory::new());
        directory.fail_always(
            DirectoryOperation::DisableAccount,
            DirectoryError::Retryable("throttled".to_string()),
        );
        let audit = Arc::new(MemoryAuditLog::default());
        let second =
            WorkflowEngine::new(EngineConfig::default(), repository, directory.clone(), audit.clone())
                .unwrap();

        let done = second.drive(wf.id()).await.unwrap();
        let disable = done.task(TaskType::DisableAccount).unwrap();
        assert_eq!(disable.state(), TaskState::Failed);
        assert_eq!(disable.attempt(), 3);
        assert_eq!(done.status(), WorkflowStatus::Failed);
        assert_eq!(directory.call_count(DirectoryOperation::DisableAccount), 0);

        let events: Vec<AuditEvent> = audit.entries_for(wf.id()).iter().map(|e| e.event).collect();
        assert_eq!(events, vec![AuditEvent::TaskFailed, AuditEvent::WorkflowFailed]);
    }

    #[tokio::test]
    async fn test_audit_trail_for_completed_workflow() {
        let directory = Arc::new(SimulatedDirectory::new());
        directory.seed_account("u9", "u9@example.com");
        let (engine, audit) = engine(directory);

        let wf = engine
            .start(WorkflowKind::Offboarding, offboarding("u9"))
            .await
            .unwrap();
        let done = engine.wait(wf.id()).await.unwrap();
        assert_eq!(done.status(), WorkflowStatus::Completed);

        let entries = audit.entries_for(wf.id());
        assert_eq!(entries.first().unwrap().event, AuditEvent::WorkflowStarted);
        assert_eq!(entries.last().unwrap().event, AuditEvent::WorkflowCompleted);
        let completed = entries
            .iter()
            .filter(|e| e.event == AuditEvent::TaskCompleted)
            .count();
        assert_eq!(completed, 6);
    }
}
