// Output formatting and styling

use colored::Colorize;
use opsdesk_workflows::{AuditEntry, TaskState, WorkflowInstance, WorkflowStatus};
use serde::Serialize;

use crate::error::CliResult;

/// Output styling configuration
pub struct OutputStyle {
    pub use_colors: bool,
}

impl Default for OutputStyle {
    fn default() -> Self {
        Self {
            use_colors: atty::is(atty::Stream::Stdout),
        }
    }
}

impl OutputStyle {
    /// Format success message
    pub fn success(&self, msg: &str) -> String {
        if self.use_colors {
            format!("{} {}", "✓".green().bold(), msg)
        } else {
            format!("✓ {}", msg)
        }
    }

    /// Format error message
    pub fn error(&self, msg: &str) -> String {
        if self.use_colors {
            format!("{} {}", "✗".red().bold(), msg)
        } else {
            format!("✗ {}", msg)
        }
    }

    /// Format warning message
    pub fn warning(&self, msg: &str) -> String {
        if self.use_colors {
            format!("{} {}", "⚠".yellow().bold(), msg)
        } else {
            format!("⚠ {}", msg)
        }
    }

    /// Format info message
    pub fn info(&self, msg: &str) -> String {
        if self.use_colors {
            format!("{} {}", "ℹ".blue().bold(), msg)
        } else {
            format!("ℹ {}", msg)
        }
    }

    /// Format a key-value pair
    pub fn key_value(&self, key: &str, value: &str) -> String {
        if self.use_colors {
            format!("  {}: {}", key.bold(), value)
        } else {
            format!("  {}: {}", key, value)
        }
    }

    fn status(&self, status: WorkflowStatus) -> String {
        let label = status.as_str();
        if !self.use_colors {
            return label.to_string();
        }
        match status {
            WorkflowStatus::Completed => label.green().to_string(),
            WorkflowStatus::Failed => label.red().to_string(),
            WorkflowStatus::Cancelled => label.yellow().to_string(),
            WorkflowStatus::Running => label.cyan().to_string(),
            WorkflowStatus::Pending => label.to_string(),
        }
    }

    fn task_marker(&self, state: TaskState) -> String {
        let marker = match state {
            TaskState::Completed => "✓",
            TaskState::Failed => "✗",
            TaskState::Skipped => "↷",
            TaskState::Running => "…",
            TaskState::Pending => "·",
        };
        if !self.use_colors {
            return marker.to_string();
        }
        match state {
            TaskState::Completed => marker.green().to_string(),
            TaskState::Failed => marker.red().to_string(),
            TaskState::Skipped => marker.yellow().to_string(),
            _ => marker.to_string(),
        }
    }

    /// One-line summary of an instance
    pub fn instance_line(&self, instance: &WorkflowInstance) -> String {
        format!(
            "{}  {:<11} {:<10} {:>3}%  {}",
            instance.id(),
            instance.kind().as_str(),
            self.status(instance.status()),
            instance.progress(),
            instance.subject_identity()
        )
    }

    /// Multi-line description of an instance and its tasks
    pub fn instance_detail(&self, instance: &WorkflowInstance) -> String {
        let mut lines = vec![
            self.key_value("id", &instance.id().to_string()),
            self.key_value("kind", instance.kind().as_str()),
            self.key_value("subject", instance.subject_identity()),
            self.key_value("status", &self.status(instance.status())),
            self.key_value("progress", &format!("{}%", instance.progress())),
        ];
        if let Some(account) = instance.account() {
            lines.push(self.key_value("account", &account.id));
        }
        lines.push(String::new());

        for task in instance.tasks() {
            let mut line = format!(
                "  {} {:<26} attempt {}",
                self.task_marker(task.state()),
                task.task_type().as_str(),
                task.attempt()
            );
            if let Some(outcome) = task.outcome() {
                line.push_str(&format!("  {}", outcome.as_str()));
            }
            if let Some(error) = task.last_error() {
                line.push_str(&format!("  ({})", error));
            }
            lines.push(line);
        }
        lines.join("\n")
    }

    /// One line per audit entry
    pub fn audit_line(&self, entry: &AuditEntry) -> String {
        let task = entry
            .task_type
            .map(|t| format!(" [{}]", t.as_str()))
            .unwrap_or_default();
        format!(
            "{}  {}{}  {}",
            entry.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
            entry.event.as_str(),
            task,
            entry.message
        )
    }
}

/// Print formatted output
pub fn print_success(msg: &str) {
    let style = OutputStyle::default();
    println!("{}", style.success(msg));
}

pub fn print_error(msg: &str) {
    let style = OutputStyle::default();
    eprintln!("{}", style.error(msg));
}

pub fn print_warning(msg: &str) {
    let style = OutputStyle::default();
    println!("{}", style.warning(msg));
}

pub fn print_info(msg: &str) {
    let style = OutputStyle::default();
    println!("{}", style.info(msg));
}

/// Print a value as pretty JSON
pub fn print_json<T: Serialize>(value: &T) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use opsdesk_workflows::{
        EngineConfig, InMemoryWorkflowRepository, MemoryAuditLog, SimulatedDirectory,
        WorkflowEngine, WorkflowKind,
    };
    use serde_json::json;
    use std::sync::Arc;

    fn plain() -> OutputStyle {
        OutputStyle { use_colors: false }
    }

    async fn instance() -> WorkflowInstance {
        let engine = WorkflowEngine::new(
            EngineConfig::default(),
            Arc::new(InMemoryWorkflowRepository::new()),
            Arc::new(SimulatedDirectory::new()),
            Arc::new(MemoryAuditLog::default()),
        )
        .unwrap();
        let params = serde_json::from_value(json!({
            "subjectIdentity": "u123",
            "departureDate": "2024-06-01"
        }))
        .unwrap();
        let wf = engine
            .submit(WorkflowKind::Offboarding, params)
            .await
            .unwrap();
        engine.get_instance(wf.id()).await.unwrap()
    }

    #[test]
    fn test_output_style_without_colors() {
        let style = plain();
        assert_eq!(style.success("test"), "✓ test");
        assert_eq!(style.error("test"), "✗ test");
        assert_eq!(style.warning("test"), "⚠ test");
        assert_eq!(style.info("test"), "ℹ test");
    }

    #[tokio::test]
    async fn test_instance_line() {
        let wf = instance().await;
        let line = plain().instance_line(&wf);
        assert!(line.starts_with(&wf.id().to_string()));
        assert!(line.contains("offboarding"));
        assert!(line.contains("running"));
        assert!(line.ends_with("u123"));
    }

    #[tokio::test]
    async fn test_instance_detail_lists_tasks() {
        let detail = plain().instance_detail(&instance().await);
        assert!(detail.contains("subject: u123"));
        assert!(detail.contains("disable_account"));
        assert!(detail.contains("archive_mailbox_and_files"));
    }
}
