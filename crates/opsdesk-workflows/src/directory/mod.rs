//! Directory adapter boundary
//!
//! Every identity-provider operation the lifecycle engine needs is one method
//! on [`DirectoryAdapter`]. Implementations must be safe to call repeatedly
//! with the same arguments: conditions such as "already disabled" or
//! "license already assigned" resolve as [`Ack::AlreadySatisfied`], never as
//! errors.

pub mod memory;

use crate::models::{AccountRef, Ack};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub use memory::{DirectoryCall, SimulatedDirectory};

/// Classified failure of a directory operation
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum DirectoryError {
    /// Malformed request; never retried
    #[error("validation failed: {0}")]
    Validation(String),

    /// Transient failure (rate limit, 5xx); retried with backoff
    #[error("transient failure: {0}")]
    Retryable(String),

    /// The call did not finish in time; retried with backoff
    #[error("timed out after {0}ms")]
    Timeout(u64),

    /// The operation cannot succeed as requested
    #[error("fatal failure: {0}")]
    Fatal(String),
}

impl DirectoryError {
    /// Whether another attempt may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, DirectoryError::Retryable(_) | DirectoryError::Timeout(_))
    }
}

/// Result type for directory operations
pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// Direction of a group membership change
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MembershipChange {
    /// Add the identity to the groups
    Add,
    /// Remove the identity from the groups
    Remove,
}

/// Attributes for a new directory account
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountRequest {
    /// HR employee id
    pub employee_id: String,
    /// Display name
    pub display_name: String,
    /// Sign-in name
    pub principal_name: String,
    /// Department
    pub department: Option<String>,
    /// Job title
    pub job_title: Option<String>,
    /// Manager directory id
    pub manager_id: Option<String>,
}

/// Named directory operations, used for call logs and fault injection
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DirectoryOperation {
    /// `create_account`
    CreateAccount,
    /// `disable_account`
    DisableAccount,
    /// `assign_license`
    AssignLicense,
    /// `modify_group_membership`
    ModifyGroupMembership,
    /// `revoke_sessions`
    RevokeSessions,
    /// `remove_mfa_methods`
    RemoveMfaMethods,
    /// `archive_mailbox_and_files`
    ArchiveMailboxAndFiles,
    /// `assign_asset`
    AssignAsset,
    /// `release_asset`
    ReleaseAsset,
}

impl fmt::Display for DirectoryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DirectoryOperation::CreateAccount => "create_account",
            DirectoryOperation::DisableAccount => "disable_account",
            DirectoryOperation::AssignLicense => "assign_license",
            DirectoryOperation::ModifyGroupMembership => "modify_group_membership",
            DirectoryOperation::RevokeSessions => "revoke_sessions",
            DirectoryOperation::RemoveMfaMethods => "remove_mfa_methods",
            DirectoryOperation::ArchiveMailboxAndFiles => "archive_mailbox_and_files",
            DirectoryOperation::AssignAsset => "assign_asset",
            DirectoryOperation::ReleaseAsset => "release_asset",
        };
        f.write_str(name)
    }
}

/// Uniform interface to the external identity provider
#[async_trait]
pub trait DirectoryAdapter: Send + Sync {
    /// Create an account, or return the existing one for the same principal name
    async fn create_account(&self, request: &AccountRequest) -> DirectoryResult<(AccountRef, Ack)>;

    /// Block sign-in
    async fn disable_account(&self, identity: &str) -> DirectoryResult<Ack>;

    /// Assign a license unless already assigned
    async fn assign_license(&self, identity: &str, license_id: &str) -> DirectoryResult<Ack>;

    /// Add or remove group memberships
    async fn modify_group_membership(
        &self,
        identity: &str,
        group_ids: &[String],
        change: MembershipChange,
    ) -> DirectoryResult<Ack>;

    /// Revoke all sign-in sessions
    async fn revoke_sessions(&self, identity: &str) -> DirectoryResult<Ack>;

    /// Delete every registered MFA method
    async fn remove_mfa_methods(&self, identity: &str) -> DirectoryResult<Ack>;

    /// Archive mailbox and files to a destination
    async fn archive_mailbox_and_files(
        &self,
        identity: &str,
        destination: &str,
    ) -> DirectoryResult<Ack>;

    /// Assign a hardware asset to an identity
    async fn assign_asset(&self, identity: &str, asset_id: &str) -> DirectoryResult<Ack>;

    /// Return a hardware asset to the pool
    async fn release_asset(&self, asset_id: &str) -> DirectoryResult<Ack>;
}
