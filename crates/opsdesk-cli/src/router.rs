// Command routing and dispatch

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use opsdesk_workflows::{WorkflowKind, WorkflowStatus};
use uuid::Uuid;

use crate::commands::*;
use crate::error::CliResult;

/// opsdesk - identity lifecycle workflows
#[derive(Parser, Debug)]
#[command(name = "opsdesk")]
#[command(about = "Run and track onboarding and offboarding workflows")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the configuration file
    #[arg(short, long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start a workflow
    #[command(about = "Start an onboarding or offboarding workflow")]
    Start {
        /// Workflow kind (onboarding, offboarding)
        #[arg(value_name = "KIND")]
        kind: WorkflowKind,

        /// Start parameter; values are read as JSON when they parse, else as text
        #[arg(short = 'p', long = "param", value_name = "KEY=VALUE")]
        params: Vec<String>,

        /// JSON file holding a parameter object
        #[arg(long, value_name = "FILE")]
        params_file: Option<PathBuf>,

        /// Return after the instance is created instead of waiting for it
        #[arg(short, long)]
        detach: bool,
    },

    /// Show a workflow instance
    #[command(about = "Show the current state of a workflow instance")]
    Get {
        /// Instance id
        #[arg(value_name = "ID")]
        id: Uuid,

        /// Show a progress report instead of the task list
        #[arg(long)]
        progress: bool,
    },

    /// List workflow instances
    #[command(about = "List workflow instances, oldest first")]
    List {
        /// Only instances of this kind
        #[arg(long)]
        kind: Option<WorkflowKind>,

        /// Only instances with this status
        #[arg(long)]
        status: Option<WorkflowStatus>,
    },

    /// Cancel a workflow instance
    #[command(about = "Cancel a running workflow instance")]
    Cancel {
        /// Instance id
        #[arg(value_name = "ID")]
        id: Uuid,
    },

    /// Resume interrupted workflows
    #[command(about = "Resume every stored workflow that has not finished")]
    Resume,

    /// Show the audit trail
    #[command(about = "Show audit entries, optionally for one instance")]
    Audit {
        /// Instance id
        #[arg(value_name = "ID")]
        id: Option<Uuid>,
    },

    /// Manage configuration
    #[command(about = "Show or initialize configuration")]
    Config {
        #[command(subcommand)]
        action: ConfigSubcommand,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigSubcommand {
    /// Show the effective configuration
    #[command(about = "Show the effective configuration")]
    Show,

    /// Write a default configuration file
    #[command(about = "Write a configuration file with default values")]
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Command router
pub struct CommandRouter;

impl CommandRouter {
    /// Route and execute a parsed command line
    pub async fn execute(cli: Cli) -> CliResult<()> {
        let options = GlobalOptions {
            config_path: cli.config,
            json: cli.json,
            quiet: cli.quiet,
        };

        match cli.command {
            Commands::Start {
                kind,
                params,
                params_file,
                detach,
            } => {
                let cmd = StartCommand::new(options, kind, params, params_file, detach);
                cmd.execute().await
            }
            Commands::Get { id, progress } => {
                let cmd = GetCommand::new(options, id, progress);
                cmd.execute().await
            }
            Commands::List { kind, status } => {
                let cmd = ListCommand::new(options, kind, status);
                cmd.execute().await
            }
            Commands::Cancel { id } => {
                let cmd = CancelCommand::new(options, id);
                cmd.execute().await
            }
            Commands::Resume => {
                let cmd = ResumeCommand::new(options);
                cmd.execute().await
            }
            Commands::Audit { id } => {
                let cmd = AuditCommand::new(options, id);
                cmd.execute().await
            }
            Commands::Config { action } => {
                let cmd = ConfigCommand::new(options, action);
                cmd.execute().await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_start_with_params() {
        let cli = Cli::try_parse_from([
            "opsdesk",
            "start",
            "offboarding",
            "-p",
            "subjectIdentity=u123",
            "-p",
            "archiveData=false",
            "--detach",
        ])
        .unwrap();

        match cli.command {
            Commands::Start {
                kind,
                params,
                detach,
                ..
            } => {
                assert_eq!(kind, WorkflowKind::Offboarding);
                assert_eq!(params.len(), 2);
                assert!(detach);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_list_filters() {
        let cli =
            Cli::try_parse_from(["opsdesk", "list", "--kind", "onboarding", "--status", "failed"])
                .unwrap();
        match cli.command {
            Commands::List { kind, status } => {
                assert_eq!(kind, Some(WorkflowKind::Onboarding));
                assert_eq!(status, Some(WorkflowStatus::Failed));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_kind_rejected() {
        assert!(Cli::try_parse_from(["opsdesk", "start", "transfer"]).is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "opsdesk",
            "get",
            "67e55044-10b1-426f-9247-bb680e5fe0c8",
            "--json",
            "-c",
            "/tmp/opsdesk.toml",
        ])
        .unwrap();
        assert!(cli.json);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/opsdesk.toml")));
    }
}
