//! Domain types shared across Skiff crates.
//!
//! Registry images, live containers, workloads, and the per-workload
//! release history. All types serialize to JSON for the REST API and for
//! the redb-backed history store.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// Namespace used by transports when a caller omits one.
pub const DEFAULT_NAMESPACE: &str = "default";

// ── Registry ──────────────────────────────────────────────────────

/// One tagged image in a repository.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RepositoryImage {
    pub repository: String,
    pub tag: String,
    /// Unix timestamp (seconds) when the image was built.
    pub created_at: u64,
}

impl RepositoryImage {
    pub fn new(repository: &str, tag: &str, created_at: u64) -> Self {
        Self {
            repository: repository.to_string(),
            tag: tag.to_string(),
            created_at,
        }
    }

    /// Newest-first ordering: creation time descending, then tag descending.
    ///
    /// The tag tie-break keeps the order stable for images pushed within
    /// the same second.
    pub fn newest_first(a: &Self, b: &Self) -> Ordering {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.tag.cmp(&a.tag))
    }

    /// Full reference, e.g. `registry.io/team/app:v3`.
    pub fn reference(&self) -> String {
        format!("{}:{}", self.repository, self.tag)
    }
}

/// True if `images` is already in newest-first order.
pub fn is_newest_first(images: &[RepositoryImage]) -> bool {
    images
        .windows(2)
        .all(|pair| RepositoryImage::newest_first(&pair[0], &pair[1]) != Ordering::Greater)
}

// ── Platform ──────────────────────────────────────────────────────

/// A container as observed live on the platform.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunningContainer {
    pub name: String,
    /// Current image reference, tag included.
    pub image: String,
}

impl RunningContainer {
    pub fn new(name: &str, image: &str) -> Self {
        Self {
            name: name.to_string(),
            image: image.to_string(),
        }
    }
}

/// A running container paired with every image of its repository.
///
/// The repository is derived from the container's current image, so the
/// list always shows what the container could move to from where it is.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContainerImages {
    pub container: RunningContainer,
    pub images: Vec<RepositoryImage>,
}

/// A workload as enumerated by the platform.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Workload {
    pub namespace: String,
    pub name: String,
    pub containers: Vec<RunningContainer>,
}

/// New definition for a workload, carried by a release as JSON bytes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct WorkloadDefinition {
    pub containers: Vec<RunningContainer>,
}

impl WorkloadDefinition {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    pub fn to_vec(&self) -> Vec<u8> {
        // A struct of strings always serializes.
        serde_json::to_vec(self).unwrap_or_default()
    }
}

// ── History ───────────────────────────────────────────────────────

/// Release state register for a workload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseState {
    /// No release running.
    Rest,
    /// A release is underway.
    InProgress,
    /// Nothing recorded yet. Reported, never stored.
    Unknown,
}

impl std::fmt::Display for ReleaseState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ReleaseState::Rest => "rest",
            ReleaseState::InProgress => "in_progress",
            ReleaseState::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// A single timestamped audit event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryEvent {
    /// Unix timestamp (seconds) when the event was logged.
    pub stamp: u64,
    pub message: String,
}

/// Release history of one workload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct History {
    pub workload: String,
    pub state: ReleaseState,
    pub events: Vec<HistoryEvent>,
}

impl History {
    /// History for a workload that has never been released.
    pub fn unknown(workload: &str) -> Self {
        Self {
            workload: workload.to_string(),
            state: ReleaseState::Unknown,
            events: Vec::new(),
        }
    }
}

/// Composite `{namespace}/{workload}` key used by stores and lock tables.
pub fn workload_key(namespace: &str, workload: &str) -> String {
    format!("{namespace}/{workload}")
}
