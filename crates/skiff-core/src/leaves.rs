//! Collaborator contracts: the registry, platform, history, and automator
//! the orchestration service composes.
//!
//! Registry and platform are remote systems, so their calls are async.
//! History and automation are local bookkeeping and stay synchronous,
//! which also lets a release guard write history from `Drop`.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{History, ReleaseState, RepositoryImage, RunningContainer, Workload};

/// Errors surfaced by a registry leaf.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("registry unavailable: {0}")]
    Unavailable(String),

    #[error("repository not found: {0}")]
    RepositoryNotFound(String),
}

/// Errors surfaced by a platform leaf.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlatformError {
    #[error("platform unavailable: {0}")]
    Unavailable(String),

    #[error("workload not found: {namespace}/{workload}")]
    WorkloadNotFound { namespace: String, workload: String },

    #[error("invalid workload definition: {0}")]
    InvalidDefinition(String),

    #[error("{0}")]
    ReleaseFailed(String),

    #[error("platform panicked: {0}")]
    Panicked(String),
}

/// Errors surfaced by a history leaf.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HistoryError {
    /// Nothing has been recorded for this workload yet.
    #[error("no history for {namespace}/{workload}")]
    NoHistory { namespace: String, workload: String },

    #[error("history store error: {0}")]
    Store(String),
}

/// Image index for container repositories.
#[async_trait]
pub trait Registry: Send + Sync {
    /// All images of a repository, newest first.
    async fn repository(&self, repository: &str) -> Result<Vec<RepositoryImage>, RegistryError>;
}

/// Cluster platform that runs workloads.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Containers currently running for a workload.
    async fn containers_for(
        &self,
        namespace: &str,
        workload: &str,
    ) -> Result<Vec<RunningContainer>, PlatformError>;

    /// Workloads running in a namespace.
    async fn workloads(&self, namespace: &str) -> Result<Vec<Workload>, PlatformError>;

    /// Roll a workload onto a new definition, taking up to `update_period`.
    async fn release(
        &self,
        namespace: &str,
        workload: &str,
        definition: &[u8],
        update_period: Duration,
    ) -> Result<(), PlatformError>;
}

/// Append-only release log plus a state register per workload.
pub trait HistoryDb: Send + Sync {
    /// Every workload's history in a namespace.
    fn all_events(&self, namespace: &str) -> Result<BTreeMap<String, History>, HistoryError>;

    /// One workload's history, or [`HistoryError::NoHistory`].
    fn events_for(&self, namespace: &str, workload: &str) -> Result<History, HistoryError>;

    fn change_state(
        &self,
        namespace: &str,
        workload: &str,
        state: ReleaseState,
    ) -> Result<(), HistoryError>;

    fn log_event(&self, namespace: &str, workload: &str, message: &str) -> Result<(), HistoryError>;
}

/// Per-workload switch for unattended releases. Fire-and-forget.
pub trait Automator: Send + Sync {
    fn enable(&self, namespace: &str, workload: &str);
    fn disable(&self, namespace: &str, workload: &str);
}
