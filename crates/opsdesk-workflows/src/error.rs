//! Error types for workflow operations

use crate::config::ConfigError;
use crate::store::StoreError;
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur during workflow operations
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Missing or malformed start parameters
    #[error("Validation error: {0}")]
    Validation(String),

    /// Workflow instance not found
    #[error("Workflow not found: {0}")]
    NotFound(Uuid),

    /// Operation not allowed in the current state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Malformed task catalog
    #[error("Invalid catalog: {0}")]
    Catalog(String),

    /// Instance store failure
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    /// Configuration failure
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Background driver panicked or was aborted
    #[error("Driver task failed: {0}")]
    Join(String),
}

impl WorkflowError {
    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Whether the error is a caller input problem
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

/// Result type for workflow operations
pub type WorkflowResult<T> = Result<T, WorkflowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_message() {
        let err = WorkflowError::validation("subjectIdentity is required");
        assert!(err.is_validation());
        assert!(err.to_string().contains("subjectIdentity"));
    }

    #[test]
    fn test_storage_error_conversion() {
        let err: WorkflowError = StoreError::Corrupted("bad json".to_string()).into();
        assert!(matches!(err, WorkflowError::Storage(_)));
        assert!(!err.is_validation());
    }
}
