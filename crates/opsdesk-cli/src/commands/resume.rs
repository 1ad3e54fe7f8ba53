// Resume interrupted workflow instances

use async_trait::async_trait;
use opsdesk_workflows::WorkflowInstance;

use super::{Command, EngineContext, GlobalOptions};
use crate::error::CliResult;
use crate::output::{self, OutputStyle};

/// Drive every stored non-terminal instance to completion
pub struct ResumeCommand {
    options: GlobalOptions,
}

impl ResumeCommand {
    pub fn new(options: GlobalOptions) -> Self {
        Self { options }
    }
}

async fn drive_all(ctx: &EngineContext) -> CliResult<Vec<WorkflowInstance>> {
    let ids = ctx.engine.resume_incomplete().await?;
    let mut finished = Vec::with_capacity(ids.len());
    for id in ids {
        finished.push(ctx.engine.wait(id).await?);
    }
    Ok(finished)
}

#[async_trait]
impl Command for ResumeCommand {
    async fn execute(&self) -> CliResult<()> {
        let ctx = EngineContext::open(&self.options).await?;
        let resumed = drive_all(&ctx).await;
        ctx.close().await;
        let finished = resumed?;

        if self.options.json {
            return output::print_json(&finished);
        }
        if finished.is_empty() {
            if !self.options.quiet {
                output::print_info("Nothing to resume");
            }
            return Ok(());
        }

        let style = OutputStyle::default();
        for instance in &finished {
            println!("{}", style.instance_line(instance));
        }
        output::print_success(&format!("Resumed {} workflow(s)", finished.len()));
        Ok(())
    }
}
