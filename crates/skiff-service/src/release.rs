//! Release bookkeeping — per-workload locks and the audit guard.
//!
//! A release moves a workload's state register `Rest -> InProgress -> Rest`
//! and appends exactly one outcome event. [`ReleaseGuard`] writes that
//! event and the final `Rest` from `Drop`, so the audit trail is completed
//! when the release returns, fails, panics, or its future is dropped.
//! [`ReleaseLocks`] serializes releases of the same workload.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use skiff_core::leaves::HistoryDb;
use skiff_core::{workload_key, ReleaseState};
use tokio::sync::OwnedMutexGuard;
use tracing::{error, info, warn};

use crate::error::PlatformError;

/// Event logged when the platform finished the release.
pub const RELEASE_SUCCEEDED: &str = "Release succeeded";

/// Cause recorded when a release future is dropped before completing.
pub const RELEASE_CANCELLED: &str = "release cancelled";

/// Event logged when the release did not complete.
pub fn release_failed(cause: &str) -> String {
    format!("Release failed: {cause}")
}

// ── Keyed locks ────────────────────────────────────────────────────

type LockTable = HashMap<String, Arc<tokio::sync::Mutex<()>>>;

/// One async mutex per `{namespace}/{workload}`, created on demand.
#[derive(Clone, Default)]
pub struct ReleaseLocks {
    table: Arc<Mutex<LockTable>>,
}

impl ReleaseLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other release of this workload is running.
    pub async fn acquire(&self, namespace: &str, workload: &str) -> ReleasePermit {
        let key = workload_key(namespace, workload);
        let lock = {
            let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
            table.entry(key.clone()).or_default().clone()
        };
        let guard = lock.lock_owned().await;
        ReleasePermit {
            key,
            guard: Some(guard),
            table: Arc::clone(&self.table),
        }
    }

    /// Number of workloads with a held or awaited lock.
    pub fn active(&self) -> usize {
        self.table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Exclusive right to release one workload. Unlocks on drop.
pub struct ReleasePermit {
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
    table: Arc<Mutex<LockTable>>,
}

impl Drop for ReleasePermit {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        // Only the table's own reference left: nobody holds or awaits it.
        if table
            .get(&self.key)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            table.remove(&self.key);
        }
    }
}

// ── Audit guard ────────────────────────────────────────────────────

/// Marks a workload `InProgress` on creation and, on drop, logs the
/// outcome event and returns the workload to `Rest`.
pub struct ReleaseGuard {
    history: Arc<dyn HistoryDb>,
    namespace: String,
    workload: String,
    outcome: Option<Result<(), String>>,
}

impl ReleaseGuard {
    pub fn begin(history: Arc<dyn HistoryDb>, namespace: &str, workload: &str) -> Self {
        if let Err(e) = history.change_state(namespace, workload, ReleaseState::InProgress) {
            error!(namespace, workload, error = %e, "failed to mark release in progress");
        }
        info!(namespace, workload, "release in progress");
        Self {
            history,
            namespace: namespace.to_string(),
            workload: workload.to_string(),
            outcome: None,
        }
    }

    /// Record the platform's outcome. The guard writes it when dropped.
    pub fn finish(mut self, outcome: &Result<(), PlatformError>) {
        self.outcome = Some(outcome.as_ref().map(|_| ()).map_err(ToString::to_string));
    }
}

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        let (namespace, workload) = (self.namespace.as_str(), self.workload.as_str());
        let message = match self.outcome.take() {
            Some(Ok(())) => {
                info!(namespace, workload, "release succeeded");
                RELEASE_SUCCEEDED.to_string()
            }
            Some(Err(cause)) => {
                warn!(namespace, workload, error = %cause, "release failed");
                release_failed(&cause)
            }
            None => {
                warn!(namespace, workload, "release cancelled before completion");
                release_failed(RELEASE_CANCELLED)
            }
        };

        if let Err(e) = self.history.log_event(namespace, workload, &message) {
            error!(namespace, workload, error = %e, "failed to log release outcome");
        }
        if let Err(e) = self.history.change_state(namespace, workload, ReleaseState::Rest) {
            error!(namespace, workload, error = %e, "failed to return workload to rest");
        }
    }
}
