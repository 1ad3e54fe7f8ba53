//! Start parameter definitions and validation
//!
//! Parameters arrive as a flat key/value map from the dashboard. Each workflow
//! kind declares which keys it accepts and which are required; validation
//! happens once, before an instance exists, so a partially-valid workflow is
//! never started.

use crate::error::{WorkflowError, WorkflowResult};
use crate::models::WorkflowKind;
use chrono::NaiveDate;
use serde_json::Value;
use std::collections::BTreeMap;

/// Well-known parameter keys
pub mod keys {
    /// Employee id (onboarding) or directory user id (offboarding)
    pub const SUBJECT_IDENTITY: &str = "subjectIdentity";
    /// Display name of the new account
    pub const DISPLAY_NAME: &str = "displayName";
    /// Sign-in name of the new account
    pub const USER_PRINCIPAL_NAME: &str = "userPrincipalName";
    /// Department
    pub const DEPARTMENT: &str = "department";
    /// Job title
    pub const JOB_TITLE: &str = "jobTitle";
    /// Manager directory id
    pub const MANAGER_ID: &str = "managerId";
    /// License SKU
    pub const LICENSE_ID: &str = "licenseId";
    /// Groups to join or leave
    pub const GROUP_IDS: &str = "groupIds";
    /// Hardware asset tag
    pub const ASSET_ID: &str = "assetId";
    /// First working day
    pub const START_DATE: &str = "startDate";
    /// Last working day
    pub const DEPARTURE_DATE: &str = "departureDate";
    /// Whether to archive mailbox and files
    pub const ARCHIVE_DATA: &str = "archiveData";
    /// Explicit archive destination
    pub const ARCHIVE_DESTINATION: &str = "archiveDestination";
    /// Colleague who inherits the data
    pub const DELEGATE_ID: &str = "delegateId";
}

/// Parameter definition
#[derive(Debug, Clone)]
pub struct ParameterDef {
    /// Parameter name
    pub name: &'static str,
    /// Expected shape
    pub param_type: ParameterType,
    /// Whether the parameter must be present
    pub required: bool,
}

impl ParameterDef {
    const fn required(name: &'static str, param_type: ParameterType) -> Self {
        Self {
            name,
            param_type,
            required: true,
        }
    }

    const fn optional(name: &'static str, param_type: ParameterType) -> Self {
        Self {
            name,
            param_type,
            required: false,
        }
    }
}

/// Parameter type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterType {
    /// Non-blank string
    String,
    /// JSON boolean
    Boolean,
    /// `YYYY-MM-DD` string
    Date,
    /// E-mail address
    Email,
    /// Array of strings or a comma-separated string
    StringList,
}

impl ParameterType {
    /// Check a value, returning the reason on mismatch
    pub fn check(&self, value: &Value) -> Result<(), String> {
        match self {
            ParameterType::String => match value.as_str() {
                Some(s) if !s.trim().is_empty() => Ok(()),
                Some(_) => Err("must not be blank".to_string()),
                None => Err("must be a string".to_string()),
            },
            ParameterType::Boolean => {
                if value.is_boolean() {
                    Ok(())
                } else {
                    Err("must be a boolean".to_string())
                }
            }
            ParameterType::Date => {
                let s = value.as_str().ok_or("must be a date string")?;
                NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                    .map(|_| ())
                    .map_err(|_| format!("'{}' is not a YYYY-MM-DD date", s))
            }
            ParameterType::Email => {
                let s = value.as_str().ok_or("must be an e-mail string")?;
                match s.trim().split_once('@') {
                    Some((local, domain))
                        if !local.is_empty() && domain.contains('.') && !domain.contains('@') =>
                    {
                        Ok(())
                    }
                    _ => Err(format!("'{}' is not an e-mail address", s)),
                }
            }
            ParameterType::StringList => match value {
                Value::String(_) => Ok(()),
                Value::Array(items) => {
                    if items
                        .iter()
                        .all(|i| i.as_str().map_or(false, |s| !s.trim().is_empty()))
                    {
                        Ok(())
                    } else {
                        Err("must contain only non-blank strings".to_string())
                    }
                }
                _ => Err("must be a list of strings".to_string()),
            },
        }
    }
}

/// Fallbacks used when optional parameters are absent
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterDefaults {
    /// License assigned when `licenseId` is not given
    pub license_id: Option<String>,
    /// Archive destination when neither `archiveDestination` nor `delegateId` is given
    pub archive_destination: Option<String>,
}

/// Validated, immutable parameter snapshot
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkflowParameters {
    values: BTreeMap<String, Value>,
}

impl WorkflowParameters {
    /// Wrap a snapshot without validating it
    pub fn from_map(values: BTreeMap<String, Value>) -> Self {
        Self { values }
    }

    /// Raw map
    pub fn as_map(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    /// Consume into the raw map
    pub fn into_map(self) -> BTreeMap<String, Value> {
        self.values
    }

    /// Trimmed string value
    pub fn string(&self, key: &str) -> Option<String> {
        self.values
            .get(key)
            .and_then(Value::as_str)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    /// Boolean value
    pub fn boolean(&self, key: &str) -> Option<bool> {
        self.values.get(key).and_then(Value::as_bool)
    }

    /// String list value; a comma-separated string is split
    pub fn list(&self, key: &str) -> Vec<String> {
        match self.values.get(key) {
            Some(Value::String(s)) => s
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Subject identity
    pub fn subject_identity(&self) -> Option<String> {
        self.string(keys::SUBJECT_IDENTITY)
    }

    /// Whether offboarding should archive data (default true)
    pub fn archive_data(&self) -> bool {
        self.boolean(keys::ARCHIVE_DATA).unwrap_or(true)
    }

    /// License to assign during onboarding
    pub fn license_id(&self, defaults: &ParameterDefaults) -> Option<String> {
        self.string(keys::LICENSE_ID)
            .or_else(|| defaults.license_id.clone())
    }

    /// Where offboarding archives data
    pub fn archive_destination(&self, defaults: &ParameterDefaults) -> Option<String> {
        self.string(keys::ARCHIVE_DESTINATION)
            .or_else(|| self.string(keys::DELEGATE_ID))
            .or_else(|| defaults.archive_destination.clone())
    }
}

/// Parameter validator
pub struct ParameterValidator;

impl ParameterValidator {
    /// Parameters accepted by a workflow kind
    pub fn definitions(kind: WorkflowKind) -> Vec<ParameterDef> {
        use keys::*;
        use ParameterType as T;

        match kind {
            WorkflowKind::Onboarding => vec![
                ParameterDef::required(SUBJECT_IDENTITY, T::String),
                ParameterDef::required(DISPLAY_NAME, T::String),
                ParameterDef::required(USER_PRINCIPAL_NAME, T::Email),
                ParameterDef::optional(DEPARTMENT, T::String),
                ParameterDef::optional(JOB_TITLE, T::String),
                ParameterDef::optional(MANAGER_ID, T::String),
                ParameterDef::optional(LICENSE_ID, T::String),
                ParameterDef::optional(GROUP_IDS, T::StringList),
                ParameterDef::optional(ASSET_ID, T::String),
                ParameterDef::optional(START_DATE, T::Date),
            ],
            WorkflowKind::Offboarding => vec![
                ParameterDef::required(SUBJECT_IDENTITY, T::String),
                ParameterDef::required(DEPARTURE_DATE, T::Date),
                ParameterDef::optional(ARCHIVE_DATA, T::Boolean),
                ParameterDef::optional(ARCHIVE_DESTINATION, T::String),
                ParameterDef::optional(DELEGATE_ID, T::String),
                ParameterDef::optional(GROUP_IDS, T::StringList),
                ParameterDef::optional(ASSET_ID, T::String),
            ],
        }
    }

    /// Validate raw parameters for a kind
    ///
    /// Rejects unknown keys, missing required keys, values of the wrong
    /// shape, and inputs a task would need but cannot resolve from defaults.
    pub fn validate(
        kind: WorkflowKind,
        raw: BTreeMap<String, Value>,
        defaults: &ParameterDefaults,
    ) -> WorkflowResult<WorkflowParameters> {
        let definitions = Self::definitions(kind);

        for name in raw.keys() {
            if !definitions.iter().any(|d| d.name == name) {
                return Err(WorkflowError::validation(format!(
                    "Unknown {} parameter: {}",
                    kind, name
                )));
            }
        }

        for def in &definitions {
            match raw.get(def.name) {
                Some(Value::Null) | None if def.required => {
                    return Err(WorkflowError::validation(format!(
                        "Required parameter '{}' not provided",
                        def.name
                    )));
                }
                Some(Value::Null) | None => {}
                Some(value) => def.param_type.check(value).map_err(|reason| {
                    WorkflowError::validation(format!("Parameter '{}' {}", def.name, reason))
                })?,
            }
        }

        let values = raw.into_iter().filter(|(_, v)| !v.is_null()).collect();
        let params = WorkflowParameters::from_map(values);

        match kind {
            WorkflowKind::Onboarding => {
                if params.license_id(defaults).is_none() {
                    return Err(WorkflowError::validation(
                        "No license: provide 'licenseId' or configure a default license",
                    ));
                }
            }
            WorkflowKind::Offboarding => {
                if params.archive_data() && params.archive_destination(defaults).is_none() {
                    return Err(WorkflowError::validation(
                        "No archive destination: provide 'archiveDestination' or 'delegateId'",
                    ));
                }
            }
        }

        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> BTreeMap<String, Value> {
        serde_json::from_value(value).unwrap()
    }

    fn defaults() -> ParameterDefaults {
        ParameterDefaults {
            license_id: Some("M365-E3".to_string()),
            archive_destination: Some("compliance-archive".to_string()),
        }
    }

    #[test]
    fn test_offboarding_minimal_parameters() {
        let params = ParameterValidator::validate(
            WorkflowKind::Offboarding,
            map(json!({"subjectIdentity": "u123", "departureDate": "2024-06-01", "archiveData": true})),
            &defaults(),
        )
        .unwrap();

        assert_eq!(params.subject_identity().as_deref(), Some("u123"));
        assert!(params.archive_data());
        assert_eq!(
            params.archive_destination(&defaults()).as_deref(),
            Some("compliance-archive")
        );
    }

    #[test]
    fn test_missing_subject_is_rejected() {
        let err = ParameterValidator::validate(
            WorkflowKind::Offboarding,
            map(json!({"departureDate": "2024-06-01"})),
            &defaults(),
        )
        .unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("subjectIdentity"));
    }

    #[test]
    fn test_null_counts_as_missing() {
        let result = ParameterValidator::validate(
            WorkflowKind::Offboarding,
            map(json!({"subjectIdentity": null, "departureDate": "2024-06-01"})),
            &defaults(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_bad_date_is_rejected() {
        let err = ParameterValidator::validate(
            WorkflowKind::Offboarding,
            map(json!({"subjectIdentity": "u1", "departureDate": "06/01/2024"})),
            &defaults(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("departureDate"));
    }

    #[test]
    fn test_unknown_parameter_is_rejected() {
        let err = ParameterValidator::validate(
            WorkflowKind::Offboarding,
            map(json!({"subjectIdentity": "u1", "departureDate": "2024-06-01", "laptopColor": "red"})),
            &defaults(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("laptopColor"));
    }

    #[test]
    fn test_offboarding_schema() {
        let mut names: Vec<_> = ParameterValidator::definitions(WorkflowKind::Offboarding)
            .into_iter()
            .map(|d| d.name)
            .collect();
        names.sort_unstable();
        assert_eq!(
            names,
            vec![
                keys::ARCHIVE_DATA,
                keys::ARCHIVE_DESTINATION,
                keys::ASSET_ID,
                keys::DELEGATE_ID,
                keys::DEPARTURE_DATE,
                keys::GROUP_IDS,
                keys::SUBJECT_IDENTITY,
            ]
        );

        assert!(ParameterValidator::validate(
            WorkflowKind::Offboarding,
            map(json!({
                "subjectIdentity": "u1",
                "departureDate": "2024-06-01",
                "forwardingAddress": "boss@example.com"
            })),
            &defaults(),
        )
        .is_err());
    }

    #[test]
    fn test_archive_destination_precedence() {
        let params = ParameterValidator::validate(
            WorkflowKind::Offboarding,
            map(json!({"subjectIdentity": "u1", "departureDate": "2024-06-01", "delegateId": "u9"})),
            &defaults(),
        )
        .unwrap();
        assert_eq!(params.archive_destination(&defaults()).as_deref(), Some("u9"));
    }

    #[test]
    fn test_archive_needs_destination() {
        let err = ParameterValidator::validate(
            WorkflowKind::Offboarding,
            map(json!({"subjectIdentity": "u1", "departureDate": "2024-06-01"})),
            &ParameterDefaults::default(),
        )
        .unwrap_err();
        assert!(err.is_validation());

        let ok = ParameterValidator::validate(
            WorkflowKind::Offboarding,
            map(json!({"subjectIdentity": "u1", "departureDate": "2024-06-01", "archiveData": false})),
            &ParameterDefaults::default(),
        );
        assert!(ok.is_ok());
    }

    #[test]
    fn test_onboarding_needs_license() {
        let raw = json!({
            "subjectIdentity": "E-1001",
            "displayName": "Ada Lovelace",
            "userPrincipalName": "ada@example.com"
        });
        assert!(ParameterValidator::validate(
            WorkflowKind::Onboarding,
            map(raw.clone()),
            &ParameterDefaults::default()
        )
        .is_err());

        let params =
            ParameterValidator::validate(WorkflowKind::Onboarding, map(raw), &defaults()).unwrap();
        assert_eq!(params.license_id(&defaults()).as_deref(), Some("M365-E3"));
    }

    #[test]
    fn test_group_list_forms() {
        let params = WorkflowParameters::from_map(map(json!({"groupIds": "sales, all-staff ,"})));
        assert_eq!(params.list(keys::GROUP_IDS), vec!["sales", "all-staff"]);

        let params = WorkflowParameters::from_map(map(json!({"groupIds": ["a", "b"]})));
        assert_eq!(params.list(keys::GROUP_IDS), vec!["a", "b"]);

        assert!(ParameterType::StringList.check(&json!([1, 2])).is_err());
    }

    #[test]
    fn test_email_check() {
        assert!(ParameterType::Email.check(&json!("ada@example.com")).is_ok());
        assert!(ParameterType::Email.check(&json!("ada@localhost")).is_err());
        assert!(ParameterType::Email.check(&json!("@example.com")).is_err());
    }
}
