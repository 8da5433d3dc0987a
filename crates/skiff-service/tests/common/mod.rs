//! Scripted leaves shared by the service tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use skiff_core::{
    workload_key, History, HistoryEvent, ReleaseState, RepositoryImage, RunningContainer, Workload,
};
use skiff_service::*;

// ── Registry ───────────────────────────────────────────────────────

#[derive(Default)]
pub struct ScriptedRegistry {
    repos: HashMap<String, Result<Vec<RepositoryImage>, RegistryError>>,
    delays: HashMap<String, Duration>,
    pub calls: AtomicUsize,
    pub completed: Mutex<Vec<String>>,
}

impl ScriptedRegistry {
    /// Serve `images` exactly as given, without sorting.
    pub fn with_repo(mut self, name: &str, images: Vec<RepositoryImage>) -> Self {
        self.repos.insert(name.to_string(), Ok(images));
        self
    }

    pub fn with_error(mut self, name: &str, err: RegistryError) -> Self {
        self.repos.insert(name.to_string(), Err(err));
        self
    }

    pub fn with_delay(mut self, name: &str, delay: Duration) -> Self {
        self.delays.insert(name.to_string(), delay);
        self
    }
}

#[async_trait]
impl Registry for ScriptedRegistry {
    async fn repository(&self, repository: &str) -> Result<Vec<RepositoryImage>, RegistryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delays.get(repository) {
            tokio::time::sleep(*delay).await;
        }
        let result = self
            .repos
            .get(repository)
            .cloned()
            .unwrap_or_else(|| Err(RegistryError::RepositoryNotFound(repository.to_string())));
        self.completed.lock().unwrap().push(repository.to_string());
        result
    }
}

// ── Platform ───────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum ReleaseBehaviour {
    Succeed,
    Fail(PlatformError),
    Panic(&'static str),
}

pub struct ScriptedPlatform {
    containers: HashMap<String, Vec<RunningContainer>>,
    behaviour: Mutex<ReleaseBehaviour>,
    release_delay: Duration,
    pub releases: Mutex<Vec<(String, String, Vec<u8>, Duration)>>,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl Default for ScriptedPlatform {
    fn default() -> Self {
        Self {
            containers: HashMap::new(),
            behaviour: Mutex::new(ReleaseBehaviour::Succeed),
            release_delay: Duration::ZERO,
            releases: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }
}

impl ScriptedPlatform {
    pub fn with_workload(mut self, namespace: &str, workload: &str, containers: &[(&str, &str)]) -> Self {
        self.containers.insert(
            workload_key(namespace, workload),
            containers
                .iter()
                .map(|(name, image)| RunningContainer::new(name, image))
                .collect(),
        );
        self
    }

    pub fn with_behaviour(self, behaviour: ReleaseBehaviour) -> Self {
        *self.behaviour.lock().unwrap() = behaviour;
        self
    }

    pub fn with_release_delay(mut self, delay: Duration) -> Self {
        self.release_delay = delay;
        self
    }

    pub fn behaviour_mut(&self) -> std::sync::MutexGuard<'_, ReleaseBehaviour> {
        self.behaviour.lock().unwrap()
    }

    pub fn release_count(&self) -> usize {
        self.releases.lock().unwrap().len()
    }
}

#[async_trait]
impl Platform for ScriptedPlatform {
    async fn containers_for(
        &self,
        namespace: &str,
        workload: &str,
    ) -> Result<Vec<RunningContainer>, PlatformError> {
        self.containers
            .get(&workload_key(namespace, workload))
            .cloned()
            .ok_or_else(|| PlatformError::WorkloadNotFound {
                namespace: namespace.to_string(),
                workload: workload.to_string(),
            })
    }

    async fn workloads(&self, namespace: &str) -> Result<Vec<Workload>, PlatformError> {
        let prefix = format!("{namespace}/");
        let mut workloads: Vec<Workload> = self
            .containers
            .iter()
            .filter_map(|(key, containers)| {
                key.strip_prefix(&prefix).map(|name| Workload {
                    namespace: namespace.to_string(),
                    name: name.to_string(),
                    containers: containers.clone(),
                })
            })
            .collect();
        workloads.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(workloads)
    }

    async fn release(
        &self,
        namespace: &str,
        workload: &str,
        definition: &[u8],
        update_period: Duration,
    ) -> Result<(), PlatformError> {
        self.releases.lock().unwrap().push((
            namespace.to_string(),
            workload.to_string(),
            definition.to_vec(),
            update_period,
        ));
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.release_delay.is_zero() {
            tokio::time::sleep(self.release_delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let behaviour = self.behaviour.lock().unwrap().clone();
        match behaviour {
            ReleaseBehaviour::Succeed => Ok(()),
            ReleaseBehaviour::Fail(err) => Err(err),
            ReleaseBehaviour::Panic(msg) => panic!("{msg}"),
        }
    }
}

// ── History ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryCall {
    ChangeState(String, ReleaseState),
    LogEvent(String, String),
}

/// In-memory history that also records every mutation in call order.
#[derive(Default)]
pub struct RecordingHistory {
    states: Mutex<HashMap<String, ReleaseState>>,
    events: Mutex<BTreeMap<String, Vec<HistoryEvent>>>,
    pub calls: Mutex<Vec<HistoryCall>>,
    /// When set, every read fails with this error.
    pub read_error: Option<HistoryError>,
}

impl RecordingHistory {
    pub fn failing_reads(err: HistoryError) -> Self {
        Self {
            read_error: Some(err),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<HistoryCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn state(&self, namespace: &str, workload: &str) -> Option<ReleaseState> {
        self.states
            .lock()
            .unwrap()
            .get(&workload_key(namespace, workload))
            .copied()
    }

    pub fn messages(&self, namespace: &str, workload: &str) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .get(&workload_key(namespace, workload))
            .map(|events| events.iter().map(|e| e.message.clone()).collect())
            .unwrap_or_default()
    }
}

impl HistoryDb for RecordingHistory {
    fn all_events(&self, namespace: &str) -> Result<BTreeMap<String, History>, HistoryError> {
        if let Some(err) = &self.read_error {
            return Err(err.clone());
        }
        let prefix = format!("{namespace}/");
        let states = self.states.lock().unwrap();
        let events = self.events.lock().unwrap();
        let mut result = BTreeMap::new();
        for (key, state) in states.iter() {
            if let Some(name) = key.strip_prefix(&prefix) {
                result.insert(
                    name.to_string(),
                    History {
                        workload: name.to_string(),
                        state: *state,
                        events: events.get(key).cloned().unwrap_or_default(),
                    },
                );
            }
        }
        Ok(result)
    }

    fn events_for(&self, namespace: &str, workload: &str) -> Result<History, HistoryError> {
        if let Some(err) = &self.read_error {
            return Err(err.clone());
        }
        let key = workload_key(namespace, workload);
        let state = self.states.lock().unwrap().get(&key).copied();
        match state {
            Some(state) => Ok(History {
                workload: workload.to_string(),
                state,
                events: self.events.lock().unwrap().get(&key).cloned().unwrap_or_default(),
            }),
            None => Err(HistoryError::NoHistory {
                namespace: namespace.to_string(),
                workload: workload.to_string(),
            }),
        }
    }

    fn change_state(
        &self,
        namespace: &str,
        workload: &str,
        state: ReleaseState,
    ) -> Result<(), HistoryError> {
        let key = workload_key(namespace, workload);
        self.calls
            .lock()
            .unwrap()
            .push(HistoryCall::ChangeState(key.clone(), state));
        self.states.lock().unwrap().insert(key, state);
        Ok(())
    }

    fn log_event(&self, namespace: &str, workload: &str, message: &str) -> Result<(), HistoryError> {
        let key = workload_key(namespace, workload);
        self.calls
            .lock()
            .unwrap()
            .push(HistoryCall::LogEvent(key.clone(), message.to_string()));
        self.events.lock().unwrap().entry(key).or_default().push(HistoryEvent {
            stamp: 0,
            message: message.to_string(),
        });
        Ok(())
    }
}

// ── Automator ──────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingAutomator {
    flags: Mutex<HashMap<String, bool>>,
    pub calls: AtomicUsize,
}

impl RecordingAutomator {
    pub fn is_enabled(&self, namespace: &str, workload: &str) -> bool {
        self.flags
            .lock()
            .unwrap()
            .get(&workload_key(namespace, workload))
            .copied()
            .unwrap_or(false)
    }
}

impl Automator for RecordingAutomator {
    fn enable(&self, namespace: &str, workload: &str) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.flags
            .lock()
            .unwrap()
            .insert(workload_key(namespace, workload), true);
    }

    fn disable(&self, namespace: &str, workload: &str) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.flags
            .lock()
            .unwrap()
            .insert(workload_key(namespace, workload), false);
    }
}

// ── Fixtures ───────────────────────────────────────────────────────

pub fn app_images() -> Vec<RepositoryImage> {
    vec![
        RepositoryImage::new("app", "v3", 300),
        RepositoryImage::new("app", "v2", 200),
        RepositoryImage::new("app", "v1", 100),
    ]
}

pub fn tags(images: &[RepositoryImage]) -> Vec<&str> {
    images.iter().map(|i| i.tag.as_str()).collect()
}

/// Leaves plus the service wired over them.
pub struct Harness {
    pub registry: Arc<ScriptedRegistry>,
    pub platform: Option<Arc<ScriptedPlatform>>,
    pub history: Arc<RecordingHistory>,
    pub automator: Arc<RecordingAutomator>,
    pub service: Service,
}

impl Harness {
    pub fn new(registry: ScriptedRegistry, platform: Option<ScriptedPlatform>) -> Self {
        Self::with_history(registry, platform, RecordingHistory::default())
    }

    pub fn with_history(
        registry: ScriptedRegistry,
        platform: Option<ScriptedPlatform>,
        history: RecordingHistory,
    ) -> Self {
        let registry = Arc::new(registry);
        let platform = platform.map(Arc::new);
        let history = Arc::new(history);
        let automator = Arc::new(RecordingAutomator::default());
        let service = Service::new(
            registry.clone(),
            platform.clone().map(|p| p as Arc<dyn Platform>),
            history.clone(),
            automator.clone(),
        );
        Self {
            registry,
            platform,
            history,
            automator,
            service,
        }
    }

    pub fn platform(&self) -> &ScriptedPlatform {
        self.platform.as_deref().expect("harness built with a platform")
    }
}
