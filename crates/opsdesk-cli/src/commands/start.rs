// Start a workflow instance

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use opsdesk_workflows::{WorkflowKind, WorkflowStatus};
use serde_json::Value;

use super::{Command, EngineContext, GlobalOptions};
use crate::error::{CliError, CliResult};
use crate::output::{self, OutputStyle};

/// Start an onboarding or offboarding workflow
pub struct StartCommand {
    options: GlobalOptions,
    kind: WorkflowKind,
    params: Vec<String>,
    params_file: Option<PathBuf>,
    detach: bool,
}

impl StartCommand {
    pub fn new(
        options: GlobalOptions,
        kind: WorkflowKind,
        params: Vec<String>,
        params_file: Option<PathBuf>,
        detach: bool,
    ) -> Self {
        Self {
            options,
            kind,
            params,
            params_file,
            detach,
        }
    }

    /// Merge the parameter file (if any) with `-p` pairs; pairs win
    fn parameters(&self) -> CliResult<BTreeMap<String, Value>> {
        let mut parameters = match &self.params_file {
            Some(path) => read_params_file(path)?,
            None => BTreeMap::new(),
        };
        for pair in &self.params {
            let (key, value) = parse_param(pair)?;
            parameters.insert(key, value);
        }
        Ok(parameters)
    }
}

#[async_trait]
impl Command for StartCommand {
    async fn execute(&self) -> CliResult<()> {
        let parameters = self.parameters()?;
        let ctx = EngineContext::open(&self.options).await?;

        let started = ctx.engine.start(self.kind, parameters).await?;
        let finished = if self.detach {
            Ok(started)
        } else {
            ctx.engine.wait(started.id()).await
        };
        ctx.close().await;
        let instance = finished?;

        if self.options.json {
            return output::print_json(&instance);
        }

        let style = OutputStyle::default();
        if self.detach {
            println!("{}", style.success(&format!("Started {} workflow {}", self.kind, instance.id())));
            if !self.options.quiet {
                println!(
                    "{}",
                    style.info("Run 'opsdesk resume' to continue it if this process exits first")
                );
            }
            return Ok(());
        }

        println!("{}", style.instance_detail(&instance));
        match instance.status() {
            WorkflowStatus::Completed => output::print_success("Workflow completed"),
            WorkflowStatus::Cancelled => output::print_warning("Workflow cancelled"),
            status => {
                return Err(CliError::Workflow(format!(
                    "Workflow {} finished as {}",
                    instance.id(),
                    status
                )))
            }
        }
        Ok(())
    }
}

/// Parse a `key=value` pair
///
/// `true`/`false`, JSON arrays and JSON objects are taken as JSON; anything
/// else, numbers included, stays text so identifiers like `100234` keep
/// their string type.
pub fn parse_param(pair: &str) -> CliResult<(String, Value)> {
    let (key, raw) = pair
        .split_once('=')
        .ok_or_else(|| CliError::invalid_argument(format!("expected KEY=VALUE, got '{}'", pair)))?;

    let key = key.trim();
    if key.is_empty() {
        return Err(CliError::invalid_argument(format!(
            "parameter name missing in '{}'",
            pair
        )));
    }

    let value = match serde_json::from_str(raw) {
        Ok(value @ (Value::Bool(_) | Value::Array(_) | Value::Object(_))) => value,
        _ => Value::String(raw.to_string()),
    };
    Ok((key.to_string(), value))
}

fn read_params_file(path: &Path) -> CliResult<BTreeMap<String, Value>> {
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| {
        CliError::invalid_argument(format!(
            "{} is not a JSON parameter object: {}",
            path.display(),
            e
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use opsdesk_workflows::{EngineConfig, ParameterValidator};
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_parse_param_values() {
        assert_eq!(
            parse_param("subjectIdentity=u123").unwrap(),
            ("subjectIdentity".to_string(), json!("u123"))
        );
        assert_eq!(
            parse_param("archiveData=false").unwrap().1,
            json!(false)
        );
        assert_eq!(
            parse_param(r#"groupIds=["g1","g2"]"#).unwrap().1,
            json!(["g1", "g2"])
        );
        // Only the first '=' splits
        assert_eq!(parse_param("displayName=a=b").unwrap().1, json!("a=b"));
    }

    #[test]
    fn test_numeric_identifiers_stay_text() {
        let (key, value) = parse_param("subjectIdentity=100234").unwrap();
        assert_eq!(value, json!("100234"));
        assert_eq!(parse_param("assetId=4.2").unwrap().1, json!("4.2"));
        assert_eq!(parse_param("deptCode=null").unwrap().1, json!("null"));
        assert_eq!(
            parse_param(r#"meta={"floor":3}"#).unwrap().1,
            json!({"floor": 3})
        );

        let mut parameters = BTreeMap::new();
        parameters.insert(key, value);
        let (key, value) = parse_param("departureDate=2024-06-01").unwrap();
        parameters.insert(key, value);

        let defaults = EngineConfig::default().parameter_defaults();
        let validated =
            ParameterValidator::validate(WorkflowKind::Offboarding, parameters, &defaults).unwrap();
        assert_eq!(validated.subject_identity().as_deref(), Some("100234"));
    }

    #[test]
    fn test_parse_param_rejects_malformed() {
        assert!(parse_param("subjectIdentity").is_err());
        assert!(parse_param("=u123").is_err());
    }

    #[test]
    fn test_pairs_override_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("params.json");
        std::fs::write(&file, r#"{"subjectIdentity": "u1", "archiveData": true}"#).unwrap();

        let cmd = StartCommand::new(
            GlobalOptions::default(),
            WorkflowKind::Offboarding,
            vec!["subjectIdentity=u2".to_string()],
            Some(file),
            true,
        );
        let params = cmd.parameters().unwrap();
        assert_eq!(params["subjectIdentity"], json!("u2"));
        assert_eq!(params["archiveData"], json!(true));
    }

    #[test]
    fn test_params_file_must_be_object() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("params.json");
        std::fs::write(&file, "[1, 2]").unwrap();

        let cmd = StartCommand::new(
            GlobalOptions::default(),
            WorkflowKind::Offboarding,
            Vec::new(),
            Some(file),
            false,
        );
        assert!(matches!(
            cmd.parameters(),
            Err(CliError::InvalidArgument { .. })
        ));
    }
}
