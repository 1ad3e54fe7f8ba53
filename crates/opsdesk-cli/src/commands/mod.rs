// Command implementations

pub mod audit;
pub mod cancel;
pub mod config;
pub mod get;
pub mod list;
pub mod resume;
pub mod start;

pub use audit::AuditCommand;
pub use cancel::CancelCommand;
pub use config::ConfigCommand;
pub use get::GetCommand;
pub use list::ListCommand;
pub use resume::ResumeCommand;
pub use start::StartCommand;

use std::path::PathBuf;
use std::sync::Arc;

use opsdesk_workflows::{
    ConfigManager, EngineConfig, FileWorkflowRepository, JsonlAuditLog, SimulatedDirectory,
    WorkflowEngine,
};
use tracing::debug;

use crate::error::CliResult;

/// Trait for command handlers
#[async_trait::async_trait]
pub trait Command: Send + Sync {
    /// Execute the command
    async fn execute(&self) -> CliResult<()>;
}

/// Flags shared by every command
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    pub config_path: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

impl GlobalOptions {
    /// Configuration manager honoring `--config`
    pub fn config_manager(&self) -> ConfigManager {
        match &self.config_path {
            Some(path) => ConfigManager::with_path(path.clone()),
            None => ConfigManager::new(),
        }
    }

    /// Load the effective configuration
    pub fn load_config(&self) -> CliResult<EngineConfig> {
        Ok(self.config_manager().load()?)
    }
}

/// Engine wired to the on-disk store and audit log
pub struct EngineContext {
    pub config: EngineConfig,
    pub engine: Arc<WorkflowEngine>,
    audit: Arc<JsonlAuditLog>,
}

impl EngineContext {
    /// Load configuration and open the engine
    pub async fn open(options: &GlobalOptions) -> CliResult<Self> {
        let config = options.load_config()?;
        Self::from_config(config).await
    }

    /// Open the engine for an already loaded configuration
    ///
    /// Directory calls go to the in-process simulated directory, which
    /// provisions unknown identities on first use.
    pub async fn from_config(config: EngineConfig) -> CliResult<Self> {
        debug!(state_dir = %config.state_dir.display(), "Opening workflow state");

        let repository = Arc::new(FileWorkflowRepository::open(config.workflows_dir()).await?);
        let audit = Arc::new(JsonlAuditLog::open(config.audit_log_path()).await?);
        let directory = Arc::new(SimulatedDirectory::new().with_auto_provision(true));

        let engine = WorkflowEngine::new(config.clone(), repository, directory, audit.clone())?;
        Ok(Self {
            config,
            engine: Arc::new(engine),
            audit,
        })
    }

    /// Write out queued audit entries; call before the process exits
    pub async fn close(&self) {
        self.audit.flush().await;
    }
}
