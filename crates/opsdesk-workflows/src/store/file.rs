//! File-backed workflow repository
//!
//! One pretty-printed JSON document per instance at `<root>/<uuid>.json`.
//! Writes go to a temporary sibling first and are renamed into place, so a
//! crash never leaves a half-written document behind.

use super::{sort_by_creation, StoreError, StoreResult, WorkflowRepository};
use crate::models::{WorkflowFilter, WorkflowInstance};
use crate::state::StateManager;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

/// Directory of JSON instance documents
#[derive(Debug, Clone)]
pub struct FileWorkflowRepository {
    root: PathBuf,
}

impl FileWorkflowRepository {
    /// Open a repository rooted at `root`, creating the directory if needed
    pub async fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    /// Directory holding the documents
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn document_path(&self, id: &Uuid) -> PathBuf {
        self.root.join(format!("{}.json", id))
    }

    async fn read_document(path: &Path) -> StoreResult<WorkflowInstance> {
        let content = fs::read_to_string(path).await?;
        let instance: WorkflowInstance = serde_json::from_str(&content)
            .map_err(|e| StoreError::Corrupted(format!("{}: {}", path.display(), e)))?;
        StateManager::validate_instance(&instance)
            .map_err(|e| StoreError::Corrupted(format!("{}: {}", path.display(), e)))?;
        Ok(instance)
    }
}

#[async_trait]
impl WorkflowRepository for FileWorkflowRepository {
    async fn save(&self, instance: &WorkflowInstance) -> StoreResult<()> {
        let json = serde_json::to_string_pretty(instance)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        let path = self.document_path(&instance.id());
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).await?;
        fs::rename(&tmp, &path).await?;

        debug!(workflow_id = %instance.id(), path = %path.display(), "Persisted workflow instance");
        Ok(())
    }

    async fn find_by_id(&self, id: &Uuid) -> StoreResult<Option<WorkflowInstance>> {
        let path = self.document_path(id);
        if !fs::try_exists(&path).await? {
            return Ok(None);
        }
        Self::read_document(&path).await.map(Some)
    }

    async fn list(&self, filter: &WorkflowFilter) -> StoreResult<Vec<WorkflowInstance>> {
        let mut found = Vec::new();
        let mut entries = fs::read_dir(&self.root).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            match Self::read_document(&path).await {
                Ok(instance) if filter.matches(&instance) => found.push(instance),
                Ok(_) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable workflow document"),
            }
        }

        sort_by_creation(&mut found);
        Ok(found)
    }

    async fn delete(&self, id: &Uuid) -> StoreResult<()> {
        match fs::remove_file(self.document_path(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
