//! Catalog leaves — registry and platform backed by `skiff.toml`.
//!
//! These serve the repositories and workloads declared in configuration.
//! The platform applies releases in memory, replacing one container image
//! per step and spreading the steps across the update period.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use skiff_core::leaves::{Platform, Registry};
use skiff_core::config::{PlatformConfig, RegistryConfig};
use skiff_core::{workload_key, RepositoryImage, RunningContainer, Workload, WorkloadDefinition};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{PlatformError, RegistryError};

/// Registry serving a fixed set of repositories.
#[derive(Debug, Default)]
pub struct CatalogRegistry {
    repositories: HashMap<String, Vec<RepositoryImage>>,
}

impl CatalogRegistry {
    pub fn from_config(config: &RegistryConfig) -> Self {
        let mut registry = Self::default();
        for repo in &config.repositories {
            registry.insert(&repo.name, repo.images());
        }
        registry
    }

    /// Add or replace a repository. Images are stored newest first.
    pub fn insert(&mut self, repository: &str, mut images: Vec<RepositoryImage>) {
        images.sort_by(RepositoryImage::newest_first);
        self.repositories.insert(repository.to_string(), images);
    }

    pub fn len(&self) -> usize {
        self.repositories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.repositories.is_empty()
    }
}

#[async_trait]
impl Registry for CatalogRegistry {
    async fn repository(&self, repository: &str) -> Result<Vec<RepositoryImage>, RegistryError> {
        self.repositories
            .get(repository)
            .cloned()
            .ok_or_else(|| RegistryError::RepositoryNotFound(repository.to_string()))
    }
}

/// Platform running a fixed set of workloads in memory.
#[derive(Debug, Default)]
pub struct CatalogPlatform {
    /// `{namespace}/{name}` → workload.
    workloads: RwLock<BTreeMap<String, Workload>>,
}

impl CatalogPlatform {
    pub fn from_config(config: &PlatformConfig) -> Self {
        let workloads = config
            .workloads
            .iter()
            .map(|w| {
                let workload = Workload {
                    namespace: w.namespace.clone(),
                    name: w.name.clone(),
                    containers: w.containers.clone(),
                };
                (workload_key(&w.namespace, &w.name), workload)
            })
            .collect();
        Self {
            workloads: RwLock::new(workloads),
        }
    }

    async fn get(&self, namespace: &str, workload: &str) -> Result<Workload, PlatformError> {
        self.workloads
            .read()
            .await
            .get(&workload_key(namespace, workload))
            .cloned()
            .ok_or_else(|| PlatformError::WorkloadNotFound {
                namespace: namespace.to_string(),
                workload: workload.to_string(),
            })
    }
}

#[async_trait]
impl Platform for CatalogPlatform {
    async fn containers_for(
        &self,
        namespace: &str,
        workload: &str,
    ) -> Result<Vec<RunningContainer>, PlatformError> {
        Ok(self.get(namespace, workload).await?.containers)
    }

    async fn workloads(&self, namespace: &str) -> Result<Vec<Workload>, PlatformError> {
        let workloads = self.workloads.read().await;
        Ok(workloads
            .values()
            .filter(|w| w.namespace == namespace)
            .cloned()
            .collect())
    }

    async fn release(
        &self,
        namespace: &str,
        workload: &str,
        definition: &[u8],
        update_period: Duration,
    ) -> Result<(), PlatformError> {
        let definition = WorkloadDefinition::from_slice(definition)
            .map_err(|e| PlatformError::InvalidDefinition(e.to_string()))?;
        if definition.containers.is_empty() {
            return Err(PlatformError::InvalidDefinition(
                "definition has no containers".to_string(),
            ));
        }

        let current = self.get(namespace, workload).await?;
        if let Some(unknown) = definition
            .containers
            .iter()
            .find(|c| !current.containers.iter().any(|running| running.name == c.name))
        {
            return Err(PlatformError::InvalidDefinition(format!(
                "workload {workload} has no container {}",
                unknown.name
            )));
        }

        let steps = definition.containers.len() as u32;
        let step_delay = update_period / steps;
        let key = workload_key(namespace, workload);

        for (i, target) in definition.containers.iter().enumerate() {
            {
                let mut workloads = self.workloads.write().await;
                let running = workloads
                    .get_mut(&key)
                    .and_then(|w| w.containers.iter_mut().find(|c| c.name == target.name))
                    .ok_or_else(|| PlatformError::WorkloadNotFound {
                        namespace: namespace.to_string(),
                        workload: workload.to_string(),
                    })?;
                debug!(
                    namespace,
                    workload,
                    container = %target.name,
                    from = %running.image,
                    to = %target.image,
                    "updating container"
                );
                running.image = target.image.clone();
            }
            if i + 1 < definition.containers.len() {
                tokio::time::sleep(step_delay).await;
            }
        }

        info!(namespace, workload, containers = steps, "rolling update completed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skiff_core::config::{ImageConfig, RepositoryConfig, WorkloadConfig};

    fn registry_config() -> RegistryConfig {
        RegistryConfig {
            repositories: vec![RepositoryConfig {
                name: "app".to_string(),
                images: vec![
                    ImageConfig { tag: "v1".to_string(), created_at: 100 },
                    ImageConfig { tag: "v3".to_string(), created_at: 300 },
                    ImageConfig { tag: "v2".to_string(), created_at: 200 },
                ],
            }],
        }
    }

    fn platform_config() -> PlatformConfig {
        PlatformConfig {
            workloads: vec![
                WorkloadConfig {
                    namespace: "prod".to_string(),
                    name: "web".to_string(),
                    containers: vec![
                        RunningContainer::new("web", "app:v1"),
                        RunningContainer::new("sidecar", "proxy:v1"),
                    ],
                },
                WorkloadConfig {
                    namespace: "staging".to_string(),
                    name: "web".to_string(),
                    containers: vec![RunningContainer::new("web", "app:v2")],
                },
            ],
        }
    }

    fn definition(containers: &[(&str, &str)]) -> Vec<u8> {
        WorkloadDefinition {
            containers: containers
                .iter()
                .map(|(name, image)| RunningContainer::new(name, image))
                .collect(),
        }
        .to_vec()
    }

    #[tokio::test]
    async fn registry_sorts_newest_first() {
        let registry = CatalogRegistry::from_config(&registry_config());
        let images = registry.repository("app").await.unwrap();
        let tags: Vec<_> = images.iter().map(|i| i.tag.as_str()).collect();
        assert_eq!(tags, ["v3", "v2", "v1"]);
    }

    #[tokio::test]
    async fn registry_unknown_repository() {
        let registry = CatalogRegistry::from_config(&registry_config());
        let err = registry.repository("nope").await.unwrap_err();
        assert_eq!(err, RegistryError::RepositoryNotFound("nope".to_string()));
    }

    #[tokio::test]
    async fn platform_lists_by_namespace() {
        let platform = CatalogPlatform::from_config(&platform_config());
        let prod = platform.workloads("prod").await.unwrap();
        assert_eq!(prod.len(), 1);
        assert_eq!(prod[0].containers.len(), 2);
        assert!(platform.workloads("dev").await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn platform_release_replaces_images() {
        let platform = CatalogPlatform::from_config(&platform_config());
        platform
            .release(
                "prod",
                "web",
                &definition(&[("web", "app:v3"), ("sidecar", "proxy:v2")]),
                Duration::from_secs(30),
            )
            .await
            .unwrap();

        let containers = platform.containers_for("prod", "web").await.unwrap();
        assert_eq!(containers[0].image, "app:v3");
        assert_eq!(containers[1].image, "proxy:v2");

        // Other namespaces untouched.
        let staging = platform.containers_for("staging", "web").await.unwrap();
        assert_eq!(staging[0].image, "app:v2");
    }

    #[tokio::test]
    async fn platform_release_rejects_bad_definitions() {
        let platform = CatalogPlatform::from_config(&platform_config());
        let period = Duration::from_secs(1);

        let err = platform.release("prod", "web", b"not json", period).await.unwrap_err();
        assert!(matches!(err, PlatformError::InvalidDefinition(_)));

        let err = platform
            .release("prod", "web", &definition(&[]), period)
            .await
            .unwrap_err();
        assert!(matches!(err, PlatformError::InvalidDefinition(_)));

        let err = platform
            .release("prod", "web", &definition(&[("db", "pg:16")]), period)
            .await
            .unwrap_err();
        assert!(matches!(err, PlatformError::InvalidDefinition(_)));

        let err = platform
            .release("prod", "api", &definition(&[("api", "app:v3")]), period)
            .await
            .unwrap_err();
        assert!(matches!(err, PlatformError::WorkloadNotFound { .. }));

        // Nothing changed.
        let containers = platform.containers_for("prod", "web").await.unwrap();
        assert_eq!(containers[0].image, "app:v1");
    }
}
