//! In-memory workflow repository
//!
//! Memory backend for tests

use super::{sort_by_creation, StoreResult, WorkflowRepository};
use crate::models::{WorkflowFilter, WorkflowInstance};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

/// Thread-safe in-memory implementation of [`WorkflowRepository`]
///
/// Stores cloned instances so callers never share state with the store.
#[derive(Debug, Default)]
pub struct InMemoryWorkflowRepository {
    instances: RwLock<HashMap<Uuid, WorkflowInstance>>,
}

impl InMemoryWorkflowRepository {
    /// Create a new empty repository
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored instances
    pub fn count(&self) -> usize {
        self.instances.read().len()
    }
}

#[async_trait]
impl WorkflowRepository for InMemoryWorkflowRepository {
    async fn save(&self, instance: &WorkflowInstance) -> StoreResult<()> {
        self.instances
            .write()
            .insert(instance.id(), instance.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &Uuid) -> StoreResult<Option<WorkflowInstance>> {
        Ok(self.instances.read().get(id).cloned())
    }

    async fn list(&self, filter: &WorkflowFilter) -> StoreResult<Vec<WorkflowInstance>> {
        let mut found: Vec<_> = self
            .instances
            .read()
            .values()
            .filter(|i| filter.matches(i))
            .cloned()
            .collect();
        sort_by_creation(&mut found);
        Ok(found)
    }

    async fn delete(&self, id: &Uuid) -> StoreResult<()> {
        self.instances.write().remove(id);
        Ok(())
    }
}
