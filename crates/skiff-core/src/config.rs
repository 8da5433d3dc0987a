//! skiff.toml configuration parser.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::types::{RepositoryImage, RunningContainer, DEFAULT_NAMESPACE};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to render config: {0}")]
    Render(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SkiffConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    /// Absent means the daemon runs without a platform.
    pub platform: Option<PlatformConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            data_dir: default_data_dir(),
        }
    }
}

fn default_port() -> u16 {
    3030
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("/var/lib/skiff")
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RegistryConfig {
    #[serde(default)]
    pub repositories: Vec<RepositoryConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryConfig {
    pub name: String,
    #[serde(default)]
    pub images: Vec<ImageConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageConfig {
    pub tag: String,
    pub created_at: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PlatformConfig {
    #[serde(default)]
    pub workloads: Vec<WorkloadConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadConfig {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub containers: Vec<RunningContainer>,
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

impl RepositoryConfig {
    /// Images of this repository, unordered.
    pub fn images(&self) -> Vec<RepositoryImage> {
        self.images
            .iter()
            .map(|i| RepositoryImage::new(&self.name, &i.tag, i.created_at))
            .collect()
    }
}

impl SkiffConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Scaffold a config with one repository and one workload running it.
    pub fn scaffold(repository: &str, workload: &str) -> Self {
        SkiffConfig {
            server: ServerConfig::default(),
            registry: RegistryConfig {
                repositories: vec![RepositoryConfig {
                    name: repository.to_string(),
                    images: vec![ImageConfig {
                        tag: "v1".to_string(),
                        created_at: 0,
                    }],
                }],
            },
            platform: Some(PlatformConfig {
                workloads: vec![WorkloadConfig {
                    namespace: default_namespace(),
                    name: workload.to_string(),
                    containers: vec![RunningContainer::new(
                        workload,
                        &format!("{repository}:v1"),
                    )],
                }],
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaffold() {
        let config = SkiffConfig::scaffold("app", "web");
        let toml_str = config.to_toml_string().unwrap();
        assert!(toml_str.contains("app:v1"));
        assert!(toml_str.contains("web"));

        let back = SkiffConfig::from_toml_str(&toml_str).unwrap();
        assert_eq!(back.platform.unwrap().workloads[0].name, "web");
    }

    #[test]
    fn test_parse_minimal() {
        let config = SkiffConfig::from_toml_str("").unwrap();
        assert_eq!(config.server.port, 3030);
        assert!(config.registry.repositories.is_empty());
        assert!(config.platform.is_none());
    }

    #[test]
    fn test_parse_full() {
        let toml_str = r#"
[server]
port = 9000
data_dir = "/tmp/skiff"

[[registry.repositories]]
name = "app"
images = [
    { tag = "v1", created_at = 100 },
    { tag = "v2", created_at = 200 },
]

[[platform.workloads]]
namespace = "prod"
name = "web"
containers = [{ name = "web", image = "app:v1" }]

[[platform.workloads]]
name = "worker"
"#;
        let config = SkiffConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.registry.repositories[0].images().len(), 2);

        let platform = config.platform.unwrap();
        assert_eq!(platform.workloads[0].namespace, "prod");
        assert_eq!(platform.workloads[1].namespace, DEFAULT_NAMESPACE);
        assert!(platform.workloads[1].containers.is_empty());
    }

    #[test]
    fn test_from_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = SkiffConfig::from_file(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
