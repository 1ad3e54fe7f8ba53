// Show the audit trail

use async_trait::async_trait;
use opsdesk_workflows::JsonlAuditLog;
use uuid::Uuid;

use super::{Command, GlobalOptions};
use crate::error::CliResult;
use crate::output::{self, OutputStyle};

/// Print audit entries from the JSON-lines log
pub struct AuditCommand {
    options: GlobalOptions,
    id: Option<Uuid>,
}

impl AuditCommand {
    pub fn new(options: GlobalOptions, id: Option<Uuid>) -> Self {
        Self { options, id }
    }
}

#[async_trait]
impl Command for AuditCommand {
    async fn execute(&self) -> CliResult<()> {
        let config = self.options.load_config()?;
        let entries: Vec<_> = JsonlAuditLog::read_all(config.audit_log_path())?
            .into_iter()
            .filter(|e| self.id.map_or(true, |id| e.workflow_id == id))
            .collect();

        if self.options.json {
            return output::print_json(&entries);
        }
        if entries.is_empty() {
            if !self.options.quiet {
                output::print_info("No audit entries");
            }
            return Ok(());
        }

        let style = OutputStyle::default();
        for entry in &entries {
            println!("{}", style.audit_line(entry));
        }
        Ok(())
    }
}
