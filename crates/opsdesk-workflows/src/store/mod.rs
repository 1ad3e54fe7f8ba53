//! Workflow instance repository
//!
//! The engine reaches persistence only through [`WorkflowRepository`], so it
//! stays free of storage-technology concerns. Two backends ship with the
//! crate: an in-memory map for tests and a directory of JSON documents.

mod file;
mod memory;

pub use file::FileWorkflowRepository;
pub use memory::InMemoryWorkflowRepository;

use crate::models::{WorkflowFilter, WorkflowInstance};
use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur in an instance store
#[derive(Debug, Error)]
pub enum StoreError {
    /// Instance not found
    #[error("Workflow instance not found: {0}")]
    NotFound(Uuid),

    /// Filesystem failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Instance could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Stored data is unreadable or fails integrity checks
    #[error("Corrupted data: {0}")]
    Corrupted(String),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence boundary for workflow instances
#[async_trait]
pub trait WorkflowRepository: Send + Sync {
    /// Insert or replace an instance
    async fn save(&self, instance: &WorkflowInstance) -> StoreResult<()>;

    /// Load an instance by id
    async fn find_by_id(&self, id: &Uuid) -> StoreResult<Option<WorkflowInstance>>;

    /// Instances matching a filter, oldest first
    async fn list(&self, filter: &WorkflowFilter) -> StoreResult<Vec<WorkflowInstance>>;

    /// Remove an instance; missing ids are ignored
    async fn delete(&self, id: &Uuid) -> StoreResult<()>;

    /// Instances that have not reached a terminal status, oldest first
    async fn find_incomplete(&self) -> StoreResult<Vec<WorkflowInstance>> {
        Ok(self
            .list(&WorkflowFilter::all())
            .await?
            .into_iter()
            .filter(|i| !i.is_terminal())
            .collect())
    }
}

/// Sort instances by creation time, breaking ties by id
pub(crate) fn sort_by_creation(instances: &mut [WorkflowInstance]) {
    instances.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
}
