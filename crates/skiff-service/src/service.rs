//! The orchestration service.
//!
//! `Service` composes the four leaves into the public operations. It keeps
//! no domain state of its own: every call reads through to the leaves.

use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::future::try_join_all;
use futures::FutureExt;
use skiff_core::leaves::{Automator, HistoryDb, Platform, Registry};
use skiff_core::{is_newest_first, ContainerImages, History, ImageRef, RepositoryImage, Workload};
use tracing::{debug, info, warn};

use crate::error::{HistoryError, PlatformError, ServiceError, ServiceResult};
use crate::release::{ReleaseGuard, ReleaseLocks};

/// Coordinates registry, platform, history, and automation.
#[derive(Clone)]
pub struct Service {
    registry: Arc<dyn Registry>,
    platform: Option<Arc<dyn Platform>>,
    history: Arc<dyn HistoryDb>,
    automator: Arc<dyn Automator>,
    locks: ReleaseLocks,
}

impl Service {
    /// Build a service. Without a platform, platform operations fail with
    /// [`ServiceError::NoPlatformConfigured`].
    pub fn new(
        registry: Arc<dyn Registry>,
        platform: Option<Arc<dyn Platform>>,
        history: Arc<dyn HistoryDb>,
        automator: Arc<dyn Automator>,
    ) -> Self {
        Self {
            registry,
            platform,
            history,
            automator,
            locks: ReleaseLocks::new(),
        }
    }

    fn platform(&self) -> ServiceResult<&dyn Platform> {
        self.platform.as_deref().ok_or(ServiceError::NoPlatformConfigured)
    }

    // ── Images ─────────────────────────────────────────────────────

    /// Images available in a repository, newest first.
    pub async fn images(&self, repository: &str) -> ServiceResult<Vec<RepositoryImage>> {
        require("repository", repository)?;
        self.fetch_images(repository).await
    }

    async fn fetch_images(&self, repository: &str) -> ServiceResult<Vec<RepositoryImage>> {
        let images = self.registry.repository(repository).await?;
        if !is_newest_first(&images) {
            warn!(repository, count = images.len(), "registry returned images out of order");
            return Err(ServiceError::ImagesOutOfOrder {
                repository: repository.to_string(),
            });
        }
        debug!(repository, count = images.len(), "listed images");
        Ok(images)
    }

    /// Each running container of a workload with the images of its repository.
    ///
    /// Lookups run concurrently. The first failure fails the whole call and
    /// cancels the rest; on success results follow container order.
    pub async fn container_images(
        &self,
        namespace: &str,
        workload: &str,
    ) -> ServiceResult<Vec<ContainerImages>> {
        require_key("namespace", namespace)?;
        require_key("workload", workload)?;
        let containers = self.platform()?.containers_for(namespace, workload).await?;

        let lookups = containers.into_iter().map(|container| async move {
            let image = ImageRef::parse(&container.image).map_err(|e| ServiceError::InvalidImage {
                image: container.image.clone(),
                reason: e.to_string(),
            })?;
            let images = self.fetch_images(&image.repository()).await?;
            Ok::<_, ServiceError>(ContainerImages { container, images })
        });
        let result = try_join_all(lookups).await?;

        debug!(namespace, workload, containers = result.len(), "correlated container images");
        Ok(result)
    }

    // ── Workloads ──────────────────────────────────────────────────

    /// Workloads running in a namespace.
    pub async fn workloads(&self, namespace: &str) -> ServiceResult<Vec<Workload>> {
        require_key("namespace", namespace)?;
        Ok(self.platform()?.workloads(namespace).await?)
    }

    // ── History ────────────────────────────────────────────────────

    /// Release history of one workload, or of the whole namespace when
    /// `workload` is empty.
    ///
    /// A workload that was never released reports state `Unknown` with no
    /// events instead of an error.
    pub fn history(
        &self,
        namespace: &str,
        workload: &str,
    ) -> ServiceResult<BTreeMap<String, History>> {
        require_key("namespace", namespace)?;
        if workload.is_empty() {
            return Ok(self.history.all_events(namespace)?);
        }
        require_key("workload", workload)?;

        let history = match self.history.events_for(namespace, workload) {
            Ok(history) => history,
            Err(HistoryError::NoHistory { .. }) => History::unknown(workload),
            Err(e) => return Err(e.into()),
        };
        Ok(BTreeMap::from([(workload.to_string(), history)]))
    }

    // ── Release ────────────────────────────────────────────────────

    /// Roll a workload onto `definition`, waiting up to `update_period` for
    /// the platform to finish.
    ///
    /// Whatever the outcome, exactly one event is logged and the workload
    /// returns to `Rest`. The platform's error is returned unchanged.
    pub async fn release(
        &self,
        namespace: &str,
        workload: &str,
        definition: &[u8],
        update_period: Duration,
    ) -> ServiceResult<()> {
        let platform = self.platform()?;
        require_key("namespace", namespace)?;
        require_key("workload", workload)?;

        let _permit = self.locks.acquire(namespace, workload).await;
        let guard = ReleaseGuard::begin(Arc::clone(&self.history), namespace, workload);
        info!(
            namespace,
            workload,
            update_period_secs = update_period.as_secs(),
            bytes = definition.len(),
            "starting release"
        );

        let outcome = AssertUnwindSafe(platform.release(namespace, workload, definition, update_period))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(PlatformError::Panicked(panic_message(panic.as_ref()))));

        guard.finish(&outcome);
        Ok(outcome?)
    }

    // ── Automation ─────────────────────────────────────────────────

    /// Turn on automatic releases for a workload.
    pub fn automate(&self, namespace: &str, workload: &str) -> ServiceResult<()> {
        require_key("namespace", namespace)?;
        require_key("workload", workload)?;
        self.automator.enable(namespace, workload);
        info!(namespace, workload, "automation enabled");
        Ok(())
    }

    /// Turn off automatic releases for a workload.
    pub fn deautomate(&self, namespace: &str, workload: &str) -> ServiceResult<()> {
        require_key("namespace", namespace)?;
        require_key("workload", workload)?;
        self.automator.disable(namespace, workload);
        info!(namespace, workload, "automation disabled");
        Ok(())
    }
}

/// Reject empty identifiers. Defaulting is left to transports.
fn require(field: &str, value: &str) -> ServiceResult<()> {
    if value.is_empty() {
        return Err(ServiceError::InvalidInput(format!("{field} must not be empty")));
    }
    Ok(())
}

/// Namespace or workload: non-empty and free of `/`, which joins the two
/// into one leaf key.
fn require_key(field: &str, value: &str) -> ServiceResult<()> {
    require(field, value)?;
    if value.contains('/') {
        return Err(ServiceError::InvalidInput(format!("{field} must not contain '/'")));
    }
    Ok(())
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
