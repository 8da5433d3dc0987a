//! `StateStore` as the history and automation leaves.

use std::collections::BTreeMap;

use skiff_core::leaves::{Automator, HistoryDb, HistoryError};
use skiff_core::{History, ReleaseState};
use tracing::error;

use crate::error::StateError;
use crate::store::StateStore;

impl From<StateError> for HistoryError {
    fn from(e: StateError) -> Self {
        HistoryError::Store(e.to_string())
    }
}

impl HistoryDb for StateStore {
    fn all_events(&self, namespace: &str) -> Result<BTreeMap<String, History>, HistoryError> {
        Ok(self.all_history(namespace)?)
    }

    fn events_for(&self, namespace: &str, workload: &str) -> Result<History, HistoryError> {
        self.history_for(namespace, workload)?
            .ok_or_else(|| HistoryError::NoHistory {
                namespace: namespace.to_string(),
                workload: workload.to_string(),
            })
    }

    fn change_state(
        &self,
        namespace: &str,
        workload: &str,
        state: ReleaseState,
    ) -> Result<(), HistoryError> {
        Ok(self.set_state(namespace, workload, state)?)
    }

    fn log_event(&self, namespace: &str, workload: &str, message: &str) -> Result<(), HistoryError> {
        StateStore::log_event(self, namespace, workload, message)?;
        Ok(())
    }
}

impl Automator for StateStore {
    fn enable(&self, namespace: &str, workload: &str) {
        if let Err(e) = self.set_automated(namespace, workload, true) {
            error!(namespace, workload, error = %e, "failed to enable automation");
        }
    }

    fn disable(&self, namespace: &str, workload: &str) {
        if let Err(e) = self.set_automated(namespace, workload, false) {
            error!(namespace, workload, error = %e, "failed to disable automation");
        }
    }
}
