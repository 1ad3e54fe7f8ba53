// CLI error types

use opsdesk_workflows::{ConfigError, StoreError, WorkflowError};
use thiserror::Error;

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Workflow error: {0}")]
    Workflow(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CliError {
    /// Create an invalid argument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Get a user-friendly error message with a hint
    pub fn user_message(&self) -> String {
        match self {
            CliError::InvalidArgument { message } => {
                format!(
                    "Invalid argument: {}\n\nRun 'opsdesk help' for usage information.",
                    message
                )
            }
            CliError::Io(e) => format!("File operation failed: {}", e),
            CliError::Config(msg) => {
                format!(
                    "Configuration error: {}\n\nRun 'opsdesk config show' to check your configuration.",
                    msg
                )
            }
            CliError::Storage(msg) => {
                format!("Storage error: {}\n\nCheck state_dir in your configuration.", msg)
            }
            CliError::Workflow(msg) => msg.clone(),
            CliError::Internal(msg) => {
                format!("Internal error: {}\n\nPlease report this issue.", msg)
            }
        }
    }

    /// Get technical details for verbose mode
    pub fn technical_details(&self) -> String {
        format!("{:?}", self)
    }
}

impl From<WorkflowError> for CliError {
    fn from(err: WorkflowError) -> Self {
        match err {
            WorkflowError::Validation(msg) => CliError::InvalidArgument { message: msg },
            WorkflowError::Storage(e) => CliError::Storage(e.to_string()),
            WorkflowError::Config(e) => CliError::Config(e.to_string()),
            WorkflowError::Join(msg) => CliError::Internal(msg),
            other => CliError::Workflow(other.to_string()),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        CliError::Config(err.to_string())
    }
}

impl From<StoreError> for CliError {
    fn from(err: StoreError) -> Self {
        CliError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        CliError::Internal(err.to_string())
    }
}

pub type CliResult<T> = Result<T, CliError>;
