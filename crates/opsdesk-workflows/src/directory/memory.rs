//! In-memory simulated directory
//!
//! Thread-safe [`DirectoryAdapter`] used by tests and by the CLI's simulation
//! mode. It keeps the idempotence contract of a real provider, records every
//! call in order, and can inject scripted faults and latency.

use super::{
    AccountRequest, DirectoryAdapter, DirectoryError, DirectoryOperation, DirectoryResult,
    MembershipChange,
};
use crate::models::{AccountRef, Ack};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::time::Duration;
use tracing::debug;

/// A directory call as observed by the simulator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryCall {
    /// Global call order, starting at 1
    pub sequence: u64,
    /// Operation invoked
    pub operation: DirectoryOperation,
    /// Identity or asset the call targeted
    pub target: String,
    /// Time the call started
    pub at: DateTime<Utc>,
}

/// Simulated account record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulatedAccount {
    /// Directory object id
    pub id: String,
    /// Sign-in name
    pub principal_name: String,
    /// Display name
    pub display_name: String,
    /// Whether sign-in is allowed
    pub enabled: bool,
    /// Assigned license SKUs
    pub licenses: BTreeSet<String>,
    /// Group memberships
    pub groups: BTreeSet<String>,
    /// Open sign-in sessions
    pub active_sessions: u32,
    /// Registered MFA methods
    pub mfa_methods: u32,
    /// Archive destination, once archived
    pub archived_to: Option<String>,
}

impl SimulatedAccount {
    fn new(id: impl Into<String>, principal_name: impl Into<String>) -> Self {
        let principal_name = principal_name.into();
        Self {
            id: id.into(),
            display_name: principal_name.clone(),
            principal_name,
            enabled: true,
            licenses: BTreeSet::new(),
            groups: BTreeSet::new(),
            active_sessions: 1,
            mfa_methods: 1,
            archived_to: None,
        }
    }

    fn as_ref(&self) -> AccountRef {
        AccountRef {
            id: self.id.clone(),
            principal_name: self.principal_name.clone(),
        }
    }
}

#[derive(Debug, Default)]
struct DirectoryState {
    accounts: HashMap<String, SimulatedAccount>,
    assets: HashMap<String, Option<String>>,
    license_pool: Option<HashSet<String>>,
    scripted_faults: HashMap<DirectoryOperation, VecDeque<DirectoryError>>,
    permanent_faults: HashMap<DirectoryOperation, DirectoryError>,
    calls: Vec<DirectoryCall>,
    next_account: u64,
}

impl DirectoryState {
    fn take_fault(&mut self, operation: DirectoryOperation) -> Option<DirectoryError> {
        if let Some(queue) = self.scripted_faults.get_mut(&operation) {
            if let Some(err) = queue.pop_front() {
                return Some(err);
            }
        }
        self.permanent_faults.get(&operation).cloned()
    }

    fn account_mut(
        &mut self,
        identity: &str,
        auto_provision: bool,
    ) -> DirectoryResult<&mut SimulatedAccount> {
        if !self.accounts.contains_key(identity) {
            if !auto_provision {
                return Err(DirectoryError::Fatal(format!(
                    "directory object '{}' does not exist",
                    identity
                )));
            }
            self.accounts
                .insert(identity.to_string(), SimulatedAccount::new(identity, identity));
        }
        self.accounts
            .get_mut(identity)
            .ok_or_else(|| DirectoryError::Fatal(format!("directory object '{}' vanished", identity)))
    }
}

/// In-memory directory honoring the adapter's idempotence contract
#[derive(Debug, Default)]
pub struct SimulatedDirectory {
    state: Mutex<DirectoryState>,
    latency: Option<Duration>,
    auto_provision: bool,
}

impl SimulatedDirectory {
    /// Create an empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call by a fixed latency
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Create unknown identities and assets on first use
    pub fn with_auto_provision(mut self, enabled: bool) -> Self {
        self.auto_provision = enabled;
        self
    }

    /// Restrict licenses to a known set of SKUs
    pub fn with_license_pool<I, S>(self, skus: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state.lock().license_pool = Some(skus.into_iter().map(Into::into).collect());
        self
    }

    /// Seed an enabled account with one session and one MFA method
    pub fn seed_account(&self, id: &str, principal_name: &str) -> AccountRef {
        let account = SimulatedAccount::new(id, principal_name);
        let reference = account.as_ref();
        self.state.lock().accounts.insert(id.to_string(), account);
        reference
    }

    /// Seed a group membership on an existing account
    pub fn seed_membership(&self, id: &str, group_id: &str) {
        if let Some(account) = self.state.lock().accounts.get_mut(id) {
            account.groups.insert(group_id.to_string());
        }
    }

    /// Seed an asset, optionally held by an identity
    pub fn seed_asset(&self, asset_id: &str, holder: Option<&str>) {
        self.state
            .lock()
            .assets
            .insert(asset_id.to_string(), holder.map(str::to_string));
    }

    /// Fail the next call of an operation with the given error
    pub fn fail_next(&self, operation: DirectoryOperation, error: DirectoryError) {
        self.state
            .lock()
            .scripted_faults
            .entry(operation)
            .or_default()
            .push_back(error);
    }

    /// Fail every call of an operation once scripted faults are exhausted
    pub fn fail_always(&self, operation: DirectoryOperation, error: DirectoryError) {
        self.state.lock().permanent_faults.insert(operation, error);
    }

    /// Drop all injected faults
    pub fn clear_faults(&self) {
        let mut state = self.state.lock();
        state.scripted_faults.clear();
        state.permanent_faults.clear();
    }

    /// Snapshot of an account
    pub fn account(&self, id: &str) -> Option<SimulatedAccount> {
        self.state.lock().accounts.get(id).cloned()
    }

    /// Find an account by sign-in name
    pub fn account_by_principal(&self, principal_name: &str) -> Option<SimulatedAccount> {
        self.state
            .lock()
            .accounts
            .values()
            .find(|a| a.principal_name.eq_ignore_ascii_case(principal_name))
            .cloned()
    }

    /// Current holder of an asset; `None` if the asset is unknown
    pub fn asset_holder(&self, asset_id: &str) -> Option<Option<String>> {
        self.state.lock().assets.get(asset_id).cloned()
    }

    /// Every call recorded so far, in order
    pub fn calls(&self) -> Vec<DirectoryCall> {
        self.state.lock().calls.clone()
    }

    /// Number of calls of one operation
    pub fn call_count(&self, operation: DirectoryOperation) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| c.operation == operation)
            .count()
    }

    /// Sequence number of the first call of an operation
    pub fn first_call(&self, operation: DirectoryOperation) -> Option<DirectoryCall> {
        self.state
            .lock()
            .calls
            .iter()
            .find(|c| c.operation == operation)
            .cloned()
    }

    /// Record the call, wait out the latency, and surface any injected fault
    async fn begin(&self, operation: DirectoryOperation, target: &str) -> DirectoryResult<()> {
        {
            let mut state = self.state.lock();
            let sequence = state.calls.len() as u64 + 1;
            state.calls.push(DirectoryCall {
                sequence,
                operation,
                target: target.to_string(),
                at: Utc::now(),
            });
        }
        debug!(%operation, target, "simulated directory call");

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        match self.state.lock().take_fault(operation) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn require(value: &str, what: &str) -> DirectoryResult<()> {
    if value.trim().is_empty() {
        return Err(DirectoryError::Validation(format!("{} must not be empty", what)));
    }
    Ok(())
}

#[async_trait]
impl DirectoryAdapter for SimulatedDirectory {
    async fn create_account(&self, request: &AccountRequest) -> DirectoryResult<(AccountRef, Ack)> {
        self.begin(DirectoryOperation::CreateAccount, &request.principal_name)
            .await?;
        require(&request.principal_name, "principal name")?;
        if !request.principal_name.contains('@') {
            return Err(DirectoryError::Validation(format!(
                "'{}' is not a valid principal name",
                request.principal_name
            )));
        }

        let mut state = self.state.lock();
        if let Some(existing) = state
            .accounts
            .values()
            .find(|a| a.principal_name.eq_ignore_ascii_case(&request.principal_name))
        {
            return Ok((existing.as_ref(), Ack::AlreadySatisfied));
        }

        state.next_account += 1;
        let id = format!("usr-{:04}", state.next_account);
        let mut account = SimulatedAccount::new(&id, &request.principal_name);
        account.display_name = request.display_name.clone();
        account.active_sessions = 0;
        account.mfa_methods = 0;
        let reference = account.as_ref();
        state.accounts.insert(id, account);
        Ok((reference, Ack::Applied))
    }

    async fn disable_account(&self, identity: &str) -> DirectoryResult<Ack> {
        self.begin(DirectoryOperation::DisableAccount, identity).await?;
        let mut state = self.state.lock();
        let account = state.account_mut(identity, self.auto_provision)?;
        if !account.enabled {
            return Ok(Ack::AlreadySatisfied);
        }
        account.enabled = false;
        Ok(Ack::Applied)
    }

    async fn assign_license(&self, identity: &str, license_id: &str) -> DirectoryResult<Ack> {
        self.begin(DirectoryOperation::AssignLicense, identity).await?;
        require(license_id, "license id")?;
        let mut state = self.state.lock();
        if let Some(pool) = &state.license_pool {
            if !pool.contains(license_id) {
                return Err(DirectoryError::Fatal(format!(
                    "license '{}' does not exist",
                    license_id
                )));
            }
        }
        let account = state.account_mut(identity, self.auto_provision)?;
        if account.licenses.insert(license_id.to_string()) {
            Ok(Ack::Applied)
        } else {
            Ok(Ack::AlreadySatisfied)
        }
    }

    async fn modify_group_membership(
        &self,
        identity: &str,
        group_ids: &[String],
        change: MembershipChange,
    ) -> DirectoryResult<Ack> {
        self.begin(DirectoryOperation::ModifyGroupMembership, identity)
            .await?;
        let mut state = self.state.lock();
        let account = state.account_mut(identity, self.auto_provision)?;
        let mut changed = false;
        for group_id in group_ids {
            changed |= match change {
                MembershipChange::Add => account.groups.insert(group_id.clone()),
                MembershipChange::Remove => account.groups.remove(group_id),
            };
        }
        Ok(if changed { Ack::Applied } else { Ack::AlreadySatisfied })
    }

    async fn revoke_sessions(&self, identity: &str) -> DirectoryResult<Ack> {
        self.begin(DirectoryOperation::RevokeSessions, identity).await?;
        let mut state = self.state.lock();
        let account = state.account_mut(identity, self.auto_provision)?;
        if account.active_sessions == 0 {
            return Ok(Ack::AlreadySatisfied);
        }
        account.active_sessions = 0;
        Ok(Ack::Applied)
    }

    async fn remove_mfa_methods(&self, identity: &str) -> DirectoryResult<Ack> {
        self.begin(DirectoryOperation::RemoveMfaMethods, identity)
            .await?;
        let mut state = self.state.lock();
        let account = state.account_mut(identity, self.auto_provision)?;
        if account.mfa_methods == 0 {
            return Ok(Ack::AlreadySatisfied);
        }
        account.mfa_methods = 0;
        Ok(Ack::Applied)
    }

    async fn archive_mailbox_and_files(
        &self,
        identity: &str,
        destination: &str,
    ) -> DirectoryResult<Ack> {
        self.begin(DirectoryOperation::ArchiveMailboxAndFiles, identity)
            .await?;
        require(destination, "archive destination")?;
        let mut state = self.state.lock();
        let account = state.account_mut(identity, self.auto_provision)?;
        if account.archived_to.as_deref() == Some(destination) {
            return Ok(Ack::AlreadySatisfied);
        }
        account.archived_to = Some(destination.to_string());
        Ok(Ack::Applied)
    }

    async fn assign_asset(&self, identity: &str, asset_id: &str) -> DirectoryResult<Ack> {
        self.begin(DirectoryOperation::AssignAsset, identity).await?;
        require(asset_id, "asset id")?;
        let mut state = self.state.lock();
        state.account_mut(identity, self.auto_provision)?;

        if !state.assets.contains_key(asset_id) {
            if !self.auto_provision {
                return Err(DirectoryError::Fatal(format!(
                    "asset '{}' does not exist",
                    asset_id
                )));
            }
            state.assets.insert(asset_id.to_string(), None);
        }

        let holder = state
            .assets
            .get_mut(asset_id)
            .ok_or_else(|| DirectoryError::Fatal(format!("asset '{}' vanished", asset_id)))?;
        match holder.as_deref() {
            Some(current) if current == identity => Ok(Ack::AlreadySatisfied),
            Some(current) => Err(DirectoryError::Fatal(format!(
                "asset '{}' is held by '{}'",
                asset_id, current
            ))),
            None => {
                *holder = Some(identity.to_string());
                Ok(Ack::Applied)
            }
        }
    }

    async fn release_asset(&self, asset_id: &str) -> DirectoryResult<Ack> {
        self.begin(DirectoryOperation::ReleaseAsset, asset_id).await?;
        require(asset_id, "asset id")?;
        let mut state = self.state.lock();
        match state.assets.get_mut(asset_id) {
            Some(holder) if holder.is_some() => {
                *holder = None;
                Ok(Ack::Applied)
            }
            Some(_) => Ok(Ack::AlreadySatisfied),
            None if self.auto_provision => {
                state.assets.insert(asset_id.to_string(), None);
                Ok(Ack::AlreadySatisfied)
            }
            None => Err(DirectoryError::Fatal(format!(
                "asset '{}' does not exist",
                asset_id
            ))),
        }
    }
}
