// Cancel a workflow instance

use async_trait::async_trait;
use uuid::Uuid;

use super::{Command, EngineContext, GlobalOptions};
use crate::error::CliResult;
use crate::output::{self, OutputStyle};

/// Request cancellation of an instance
pub struct CancelCommand {
    options: GlobalOptions,
    id: Uuid,
}

impl CancelCommand {
    pub fn new(options: GlobalOptions, id: Uuid) -> Self {
        Self { options, id }
    }
}

#[async_trait]
impl Command for CancelCommand {
    async fn execute(&self) -> CliResult<()> {
        let ctx = EngineContext::open(&self.options).await?;
        let before = ctx.engine.get_instance(self.id).await?;
        let cancelled = ctx.engine.cancel(self.id).await;
        ctx.close().await;
        let instance = cancelled?;

        if self.options.json {
            return output::print_json(&instance);
        }

        let style = OutputStyle::default();
        if before.is_terminal() {
            println!(
                "{}",
                style.warning(&format!(
                    "Workflow {} already finished as {}",
                    self.id,
                    instance.status()
                ))
            );
        } else {
            println!("{}", style.success(&format!("Cancellation requested for {}", self.id)));
        }
        println!("{}", style.instance_line(&instance));
        Ok(())
    }
}
