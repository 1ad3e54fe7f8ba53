// Configuration commands

use async_trait::async_trait;
use opsdesk_workflows::EngineConfig;

use super::{Command, GlobalOptions};
use crate::error::{CliError, CliResult};
use crate::output::{self, OutputStyle};
use crate::router::ConfigSubcommand;

/// Show or initialize configuration
pub struct ConfigCommand {
    options: GlobalOptions,
    action: ConfigSubcommand,
}

impl ConfigCommand {
    pub fn new(options: GlobalOptions, action: ConfigSubcommand) -> Self {
        Self { options, action }
    }

    fn show(&self) -> CliResult<()> {
        let manager = self.options.config_manager();
        let config = manager.load()?;

        if self.options.json {
            return output::print_json(&config);
        }

        let style = OutputStyle::default();
        println!("{}", style.key_value("file", &manager.config_path().display().to_string()));
        println!("{}", style.key_value("state_dir", &config.state_dir.display().to_string()));
        println!(
            "{}",
            style.key_value("max_parallel_tasks", &config.max_parallel_tasks.to_string())
        );
        println!(
            "{}",
            style.key_value(
                "default_license_id",
                config.default_license_id.as_deref().unwrap_or("-")
            )
        );
        println!(
            "{}",
            style.key_value(
                "default_archive_destination",
                config.default_archive_destination.as_deref().unwrap_or("-")
            )
        );
        println!(
            "{}",
            style.key_value(
                "retry",
                &format!(
                    "{} attempts, {}ms base delay, {}ms cap, {}ms call timeout",
                    config.retry.max_attempts,
                    config.retry.base_delay_ms,
                    config.retry.max_delay_ms,
                    config.retry.call_timeout_ms
                )
            )
        );
        Ok(())
    }

    fn init(&self, force: bool) -> CliResult<()> {
        let manager = self.options.config_manager();
        let path = manager.config_path().to_path_buf();
        if path.exists() && !force {
            return Err(CliError::invalid_argument(format!(
                "{} already exists; pass --force to overwrite it",
                path.display()
            )));
        }

        manager.save(&EngineConfig::default())?;
        if !self.options.quiet {
            output::print_success(&format!("Wrote {}", path.display()));
        }
        Ok(())
    }
}

#[async_trait]
impl Command for ConfigCommand {
    async fn execute(&self) -> CliResult<()> {
        match &self.action {
            ConfigSubcommand::Show => self.show(),
            ConfigSubcommand::Init { force } => self.init(*force),
        }
    }
}
