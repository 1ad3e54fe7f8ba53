#![warn(missing_docs)]

//! Opsdesk Identity Lifecycle Workflows
//!
//! Drives onboarding and offboarding of directory identities as ordered,
//! retryable, auditable task workflows against a pluggable directory adapter.
//!
//! # Example
//!
//! ```rust
//! use std::collections::BTreeMap;
//! use std::sync::Arc;
//! use opsdesk_workflows::{
//!     EngineConfig, InMemoryWorkflowRepository, MemoryAuditLog, SimulatedDirectory,
//!     WorkflowEngine, WorkflowKind, WorkflowStatus,
//! };
//!
//! # tokio_test::block_on(async {
//! let directory = Arc::new(SimulatedDirectory::new());
//! directory.seed_account("u123", "u123@example.com");
//!
//! let engine = Arc::new(
//!     WorkflowEngine::new(
//!         EngineConfig::default(),
//!         Arc::new(InMemoryWorkflowRepository::new()),
//!         directory,
//!         Arc::new(MemoryAuditLog::default()),
//!     )
//!     .unwrap(),
//! );
//!
//! let mut params = BTreeMap::new();
//! params.insert("subjectIdentity".to_string(), serde_json::json!("u123"));
//! params.insert("departureDate".to_string(), serde_json::json!("2024-06-01"));
//!
//! let started = engine.start(WorkflowKind::Offboarding, params).await.unwrap();
//! let finished = engine.wait(started.id()).await.unwrap();
//! assert_eq!(finished.status(), WorkflowStatus::Completed);
//! # });
//! ```

pub mod audit;
pub mod catalog;
pub mod config;
pub mod directory;
pub mod engine;
pub mod error;
pub mod executor;
pub mod models;
pub mod parameters;
pub mod progress;
pub mod retry;
pub mod state;
pub mod store;

#[cfg(test)]
mod state_properties;

#[cfg(test)]
mod retry_properties;

pub use audit::{AuditEntry, AuditEvent, AuditSink, JsonlAuditLog, MemoryAuditLog};
pub use catalog::{TaskCatalog, TaskTemplate};
pub use config::{ConfigError, ConfigManager, EngineConfig};
pub use directory::{
    AccountRequest, DirectoryAdapter, DirectoryError, DirectoryOperation, MembershipChange,
    SimulatedDirectory,
};
pub use engine::{Advance, WorkflowEngine};
pub use error::*;
pub use models::*;
pub use parameters::{ParameterDefaults, ParameterValidator, WorkflowParameters};
pub use progress::ProgressReport;
pub use retry::RetryPolicy;
pub use state::StateManager;
pub use store::{
    FileWorkflowRepository, InMemoryWorkflowRepository, StoreError, WorkflowRepository,
};
