// Show one workflow instance

use async_trait::async_trait;
use uuid::Uuid;

use super::{Command, EngineContext, GlobalOptions};
use crate::error::CliResult;
use crate::output::{self, OutputStyle};

/// Show an instance, or its progress report
pub struct GetCommand {
    options: GlobalOptions,
    id: Uuid,
    progress: bool,
}

impl GetCommand {
    pub fn new(options: GlobalOptions, id: Uuid, progress: bool) -> Self {
        Self {
            options,
            id,
            progress,
        }
    }
}

#[async_trait]
impl Command for GetCommand {
    async fn execute(&self) -> CliResult<()> {
        let ctx = EngineContext::open(&self.options).await?;
        let style = OutputStyle::default();

        if self.progress {
            let report = ctx.engine.progress_report(self.id).await?;
            if self.options.json {
                return output::print_json(&report);
            }
            println!("{}", style.key_value("status", report.status.as_str()));
            println!("{}", style.key_value("progress", &format!("{}%", report.progress)));
            println!(
                "{}",
                style.key_value(
                    "tasks",
                    &format!(
                        "{} completed, {} skipped, {} failed, {} remaining",
                        report.completed_tasks,
                        report.skipped_tasks,
                        report.failed_tasks,
                        report.remaining_tasks()
                    )
                )
            );
            if let Some(eta) = report.estimated_completion_time {
                println!("{}", style.key_value("eta", &eta.to_rfc3339()));
            }
            return Ok(());
        }

        let instance = ctx.engine.get_instance(self.id).await?;
        if self.options.json {
            return output::print_json(&instance);
        }
        println!("{}", style.instance_detail(&instance));
        Ok(())
    }
}
