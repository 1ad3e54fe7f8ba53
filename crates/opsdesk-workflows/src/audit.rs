//! Audit trail for workflow execution
//!
//! The engine writes one entry per task transition and one per workflow-level
//! status change. Sinks are append-only.

use crate::models::{TaskType, WorkflowKind};
use crate::store::{StoreError, StoreResult};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};
use uuid::Uuid;

/// Audit log entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditEntry {
    /// Entry id
    pub id: Uuid,
    /// Time of the transition
    pub timestamp: DateTime<Utc>,
    /// Workflow instance
    pub workflow_id: Uuid,
    /// Task, for task-level events
    pub task_type: Option<TaskType>,
    /// What happened
    pub event: AuditEvent,
    /// Human-readable description
    pub message: String,
    /// Additional context
    pub context: serde_json::Value,
}

/// Type of audited transition
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditEvent {
    /// Instance created and started
    WorkflowStarted,
    /// Task call dispatched
    TaskStarted,
    /// Task succeeded
    TaskCompleted,
    /// Task failed retryably and will run again
    TaskRetryScheduled,
    /// Mandatory task gave up
    TaskFailed,
    /// Optional task gave up
    TaskSkipped,
    /// Every task settled
    WorkflowCompleted,
    /// A mandatory task failed
    WorkflowFailed,
    /// Cancelled before completion
    WorkflowCancelled,
    /// Picked up again after a restart
    WorkflowResumed,
}

impl AuditEvent {
    /// Serialized event name
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEvent::WorkflowStarted => "workflow_started",
            AuditEvent::TaskStarted => "task_started",
            AuditEvent::TaskCompleted => "task_completed",
            AuditEvent::TaskRetryScheduled => "task_retry_scheduled",
            AuditEvent::TaskFailed => "task_failed",
            AuditEvent::TaskSkipped => "task_skipped",
            AuditEvent::WorkflowCompleted => "workflow_completed",
            AuditEvent::WorkflowFailed => "workflow_failed",
            AuditEvent::WorkflowCancelled => "workflow_cancelled",
            AuditEvent::WorkflowResumed => "workflow_resumed",
        }
    }
}

impl AuditEntry {
    /// Workflow-level entry
    pub fn workflow(workflow_id: Uuid, event: AuditEvent, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            workflow_id,
            task_type: None,
            event,
            message: message.into(),
            context: serde_json::Value::Null,
        }
    }

    /// Task-level entry
    pub fn task(
        workflow_id: Uuid,
        task_type: TaskType,
        event: AuditEvent,
        message: impl Into<String>,
    ) -> Self {
        Self {
            task_type: Some(task_type),
            ..Self::workflow(workflow_id, event, message)
        }
    }

    /// Attach context
    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = context;
        self
    }

    /// Entry for a freshly started workflow
    pub fn started(workflow_id: Uuid, kind: WorkflowKind, subject: &str) -> Self {
        Self::workflow(
            workflow_id,
            AuditEvent::WorkflowStarted,
            format!("{} started for '{}'", kind, subject),
        )
        .with_context(serde_json::json!({"kind": kind, "subject_identity": subject}))
    }
}

/// Append-only destination for audit entries
pub trait AuditSink: Send + Sync {
    /// Record one entry
    fn record(&self, entry: AuditEntry);
}

fn trace_entry(entry: &AuditEntry) {
    info!(
        workflow_id = %entry.workflow_id,
        task = entry.task_type.map(|t| t.as_str()),
        event = ?entry.event,
        "{}",
        entry.message
    );
}

/// Bounded in-memory audit log
#[derive(Debug)]
pub struct MemoryAuditLog {
    entries: Mutex<VecDeque<AuditEntry>>,
    max_entries: usize,
}

impl MemoryAuditLog {
    /// Create a log keeping at most `max_entries` entries
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            max_entries,
        }
    }

    /// All retained entries, oldest first
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().iter().cloned().collect()
    }

    /// Retained entries for one workflow
    pub fn entries_for(&self, workflow_id: Uuid) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.workflow_id == workflow_id)
            .cloned()
            .collect()
    }

    /// Number of retained entries
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the log is empty
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Default for MemoryAuditLog {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl AuditSink for MemoryAuditLog {
    fn record(&self, entry: AuditEntry) {
        trace_entry(&entry);
        let mut entries = self.entries.lock();
        entries.push_back(entry);
        while entries.len() > self.max_entries {
            entries.pop_front();
        }
    }
}

enum WriterMessage {
    Entry(AuditEntry),
    Flush(oneshot::Sender<()>),
}

/// Audit log appending one JSON object per line to a file
///
/// `record` only queues the entry; a background writer task owns the file
/// and appends in arrival order. Call [`JsonlAuditLog::flush`] before reading
/// the file back or before the runtime shuts down.
#[derive(Debug)]
pub struct JsonlAuditLog {
    path: PathBuf,
    sender: mpsc::UnboundedSender<WriterMessage>,
}

impl JsonlAuditLog {
    /// Open (or create) the log file for appending and start its writer
    ///
    /// Must be called from within a tokio runtime.
    pub async fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        let (sender, receiver) = mpsc::unbounded_channel();
        tokio::spawn(run_writer(path.clone(), file, receiver));
        Ok(Self { path, sender })
    }

    /// Path of the log file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Wait until every entry recorded so far is written to the file
    pub async fn flush(&self) {
        let (ack, done) = oneshot::channel();
        if self.sender.send(WriterMessage::Flush(ack)).is_ok() {
            let _ = done.await;
        }
    }

    /// Read every entry from a log file, oldest first
    pub fn read_all(path: impl AsRef<Path>) -> StoreResult<Vec<AuditEntry>> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Vec::new());
        }

        let reader = BufReader::new(File::open(path)?);
        let mut entries = Vec::new();
        for (number, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let entry = serde_json::from_str(&line).map_err(|e| {
                StoreError::Corrupted(format!(
                    "{} line {}: {}",
                    path.display(),
                    number + 1,
                    e
                ))
            })?;
            entries.push(entry);
        }
        Ok(entries)
    }
}

async fn run_writer(
    path: PathBuf,
    mut file: tokio::fs::File,
    mut receiver: mpsc::UnboundedReceiver<WriterMessage>,
) {
    while let Some(message) = receiver.recv().await {
        match message {
            WriterMessage::Entry(entry) => {
                let mut line = match serde_json::to_string(&entry) {
                    Ok(line) => line,
                    Err(e) => {
                        warn!(error = %e, "Failed to serialize audit entry");
                        continue;
                    }
                };
                line.push('\n');
                if let Err(e) = file.write_all(line.as_bytes()).await {
                    warn!(path = %path.display(), error = %e, "Failed to append audit entry");
                }
            }
            WriterMessage::Flush(ack) => {
                if let Err(e) = file.flush().await {
                    warn!(path = %path.display(), error = %e, "Failed to flush audit log");
                }
                let _ = ack.send(());
            }
        }
    }

    if let Err(e) = file.flush().await {
        warn!(path = %path.display(), error = %e, "Failed to flush audit log");
    }
}

impl AuditSink for JsonlAuditLog {
    fn record(&self, entry: AuditEntry) {
        trace_entry(&entry);
        if self.sender.send(WriterMessage::Entry(entry)).is_err() {
            warn!(path = %self.path.display(), "Audit writer has stopped; entry dropped");
        }
    }
}
