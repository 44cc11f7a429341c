//! In-memory container runtime for exercising lifecycle rules without Docker.
//!
//! [`FakeRuntime`] and [`FakeClient`] append every call to a shared
//! operation log (`"start:<name>"`, `"purge:<name>"`, `"disconnect:<label>"`
//! and so on) so tests can assert on the exact order of events.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::errors::{TestEnvError, TestEnvResult};
use crate::runtime::{ContainerHandle, ContainerRuntime, ManagedResource, NetworkHandle};
use crate::spec::{ContainerSpec, ImageSource, NetworkSpec, LABEL_MANAGED, LABEL_RUN, LABEL_SCENARIO};
use crate::teardown::ServiceClient;

/// Shared, ordered record of fake operations.
#[derive(Debug, Clone, Default)]
pub struct OperationLog(Arc<Mutex<Vec<String>>>);

impl OperationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, operation: impl Into<String>) {
        lock(&self.0).push(operation.into());
    }

    pub fn entries(&self) -> Vec<String> {
        lock(&self.0).clone()
    }

    /// Entries starting with `prefix`, e.g. `"purge:"`.
    pub fn with_prefix(&self, prefix: &str) -> Vec<String> {
        lock(&self.0)
            .iter()
            .filter(|entry| entry.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Position of the first entry containing `fragment`.
    pub fn position(&self, fragment: &str) -> Option<usize> {
        lock(&self.0).iter().position(|entry| entry.contains(fragment))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Clone)]
struct FakeResource {
    id: String,
    name: String,
    network: Option<String>,
    labels: BTreeMap<String, String>,
    created_at: DateTime<Utc>,
}

impl FakeResource {
    fn managed(&self) -> bool {
        self.labels.get(LABEL_MANAGED).map(String::as_str) == Some("true")
    }

    fn in_run(&self, run_id: Option<&str>) -> bool {
        run_id.is_none_or(|run| self.labels.get(LABEL_RUN).map(String::as_str) == Some(run))
    }

    fn describe(&self) -> ManagedResource {
        ManagedResource {
            id: self.id.clone(),
            name: self.name.clone(),
            created_at: Some(self.created_at),
            run_id: self.labels.get(LABEL_RUN).cloned(),
            scenario: self.labels.get(LABEL_SCENARIO).cloned(),
        }
    }
}

#[derive(Debug, Default)]
struct FakeState {
    next_id: u64,
    next_port: u16,
    unreachable: bool,
    images: BTreeSet<String>,
    containers: Vec<FakeResource>,
    networks: Vec<FakeResource>,
    fail_image: BTreeSet<String>,
    fail_start: BTreeSet<String>,
    fail_purge: BTreeSet<String>,
    fail_network_removal: BTreeSet<String>,
}

impl FakeState {
    fn next_id(&mut self, kind: &str) -> String {
        self.next_id += 1;
        format!("{}-{:04}", kind, self.next_id)
    }
}

fn matches_any(fragments: &BTreeSet<String>, name: &str) -> bool {
    fragments.iter().any(|fragment| name.contains(fragment.as_str()))
}

/// A [`ContainerRuntime`] that keeps containers and networks in memory.
///
/// Failures are injected by name fragment, so they apply to the unique
/// names the environment generates from a service's logical name.
#[derive(Debug, Clone)]
pub struct FakeRuntime {
    state: Arc<Mutex<FakeState>>,
    log: OperationLog,
}

impl Default for FakeRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self::with_log(OperationLog::new())
    }

    /// Runtime sharing `log` with clients created by the test.
    pub fn with_log(log: OperationLog) -> Self {
        let state = FakeState {
            next_port: 49152,
            ..Default::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
            log,
        }
    }

    pub fn log(&self) -> OperationLog {
        self.log.clone()
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        lock(&self.state).unreachable = unreachable;
    }

    pub fn fail_image(&self, reference: &str) {
        lock(&self.state).fail_image.insert(reference.to_string());
    }

    pub fn fail_start_of(&self, fragment: &str) {
        lock(&self.state).fail_start.insert(fragment.to_string());
    }

    pub fn fail_purge_of(&self, fragment: &str) {
        lock(&self.state).fail_purge.insert(fragment.to_string());
    }

    pub fn fail_network_removal_of(&self, fragment: &str) {
        lock(&self.state).fail_network_removal.insert(fragment.to_string());
    }

    /// Attach a container the harness does not own to `network`.
    pub fn attach_foreign_container(&self, network: &str, name: &str) {
        let mut state = lock(&self.state);
        let id = state.next_id("foreign");
        state.containers.push(FakeResource {
            id,
            name: name.to_string(),
            network: Some(network.to_string()),
            labels: BTreeMap::new(),
            created_at: Utc::now(),
        });
    }

    /// Insert a managed container left behind by an earlier run.
    pub fn seed_managed_container(&self, name: &str, run_id: &str, created_at: DateTime<Utc>) {
        let mut state = lock(&self.state);
        let id = state.next_id("container");
        state.containers.push(FakeResource {
            id,
            name: name.to_string(),
            network: None,
            labels: managed_labels(run_id),
            created_at,
        });
    }

    /// Insert a managed network left behind by an earlier run.
    pub fn seed_managed_network(&self, name: &str, run_id: &str, created_at: DateTime<Utc>) {
        let mut state = lock(&self.state);
        let id = state.next_id("network");
        state.networks.push(FakeResource {
            id,
            name: name.to_string(),
            network: None,
            labels: managed_labels(run_id),
            created_at,
        });
    }

    /// Names of containers currently present.
    pub fn container_names(&self) -> Vec<String> {
        lock(&self.state)
            .containers
            .iter()
            .map(|c| c.name.clone())
            .collect()
    }

    /// Names of networks currently present.
    pub fn network_names(&self) -> Vec<String> {
        lock(&self.state)
            .networks
            .iter()
            .map(|n| n.name.clone())
            .collect()
    }

    fn check_reachable(&self) -> TestEnvResult<()> {
        if lock(&self.state).unreachable {
            return Err(TestEnvError::RuntimeUnavailable {
                reason: "fake runtime marked unreachable".to_string(),
            });
        }
        Ok(())
    }
}

fn managed_labels(run_id: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (LABEL_MANAGED.to_string(), "true".to_string()),
        (LABEL_RUN.to_string(), run_id.to_string()),
    ])
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn ping(&self) -> TestEnvResult<()> {
        self.log.record("ping");
        self.check_reachable()
    }

    async fn ensure_image(&self, image: &ImageSource) -> TestEnvResult<String> {
        self.check_reachable()?;
        let reference = image.reference();
        self.log.record(format!("ensure_image:{}", reference));

        let mut state = lock(&self.state);
        if state.fail_image.contains(&reference) {
            return Err(match image {
                ImageSource::Registry { .. } => TestEnvError::ImageUnavailable {
                    image: reference,
                    reason: "injected pull failure".to_string(),
                },
                ImageSource::Build { context_dir, .. } => TestEnvError::ImageBuildFailed {
                    context: context_dir.display().to_string(),
                    reason: "injected build failure".to_string(),
                },
            });
        }
        state.images.insert(reference.clone());
        Ok(reference)
    }

    async fn start_container(
        &self,
        spec: &ContainerSpec,
        image: &str,
    ) -> TestEnvResult<ContainerHandle> {
        self.check_reachable()?;
        self.log.record(format!("start:{}", spec.name));

        let mut state = lock(&self.state);
        if !state.images.contains(image) {
            return Err(TestEnvError::ContainerStartFailed {
                container: spec.name.clone(),
                reason: format!("image '{}' not present", image),
            });
        }
        if matches_any(&state.fail_start, &spec.name) {
            return Err(TestEnvError::ContainerStartFailed {
                container: spec.name.clone(),
                reason: "injected start failure".to_string(),
            });
        }
        if let Some(attachment) = &spec.network {
            if !state.networks.iter().any(|n| n.name == attachment.network) {
                return Err(TestEnvError::ContainerStartFailed {
                    container: spec.name.clone(),
                    reason: format!("network '{}' not found", attachment.network),
                });
            }
        }

        let id = state.next_id("container");
        let mut ports = BTreeMap::new();
        for port in &spec.exposed_ports {
            ports.insert(*port, state.next_port);
            state.next_port += 1;
        }
        let network = spec.network.as_ref().map(|n| n.network.clone());
        state.containers.push(FakeResource {
            id: id.clone(),
            name: spec.name.clone(),
            network: network.clone(),
            labels: spec.labels.clone(),
            created_at: Utc::now(),
        });

        Ok(ContainerHandle {
            id,
            name: spec.name.clone(),
            ports,
            network,
        })
    }

    async fn purge_container(&self, container: &ContainerHandle) -> TestEnvResult<()> {
        self.log.record(format!("purge:{}", container.name));

        let mut state = lock(&self.state);
        if matches_any(&state.fail_purge, &container.name) {
            return Err(TestEnvError::ContainerRemovalFailed {
                container: container.name.clone(),
                reason: "injected purge failure".to_string(),
            });
        }
        state.containers.retain(|c| c.id != container.id);
        Ok(())
    }

    async fn create_network(&self, spec: &NetworkSpec) -> TestEnvResult<NetworkHandle> {
        self.check_reachable()?;
        self.log.record(format!("create_network:{}", spec.name));

        let mut state = lock(&self.state);
        if state.networks.iter().any(|n| n.name == spec.name) {
            return Err(TestEnvError::NetworkCreationFailed {
                network: spec.name.clone(),
                reason: "network already exists".to_string(),
            });
        }
        let id = state.next_id("network");
        state.networks.push(FakeResource {
            id: id.clone(),
            name: spec.name.clone(),
            network: None,
            labels: spec.labels.clone(),
            created_at: Utc::now(),
        });

        Ok(NetworkHandle {
            id,
            name: spec.name.clone(),
        })
    }

    async fn remove_network(&self, network: &NetworkHandle) -> TestEnvResult<()> {
        self.log.record(format!("remove_network:{}", network.name));

        let mut state = lock(&self.state);
        if matches_any(&state.fail_network_removal, &network.name) {
            return Err(TestEnvError::NetworkRemovalFailed {
                network: network.name.clone(),
                reason: "injected removal failure".to_string(),
            });
        }
        let attached: Vec<String> = state
            .containers
            .iter()
            .filter(|c| c.network.as_deref() == Some(network.name.as_str()))
            .map(|c| c.name.clone())
            .collect();
        if !attached.is_empty() {
            return Err(TestEnvError::NetworkInUse {
                network: network.name.clone(),
                attached,
            });
        }
        state
            .networks
            .retain(|n| n.id != network.id && n.name != network.name);
        Ok(())
    }

    async fn list_managed_containers(
        &self,
        run_id: Option<&str>,
    ) -> TestEnvResult<Vec<ManagedResource>> {
        self.check_reachable()?;
        Ok(lock(&self.state)
            .containers
            .iter()
            .filter(|c| c.managed() && c.in_run(run_id))
            .map(FakeResource::describe)
            .collect())
    }

    async fn list_managed_networks(
        &self,
        run_id: Option<&str>,
    ) -> TestEnvResult<Vec<ManagedResource>> {
        self.check_reachable()?;
        Ok(lock(&self.state)
            .networks
            .iter()
            .filter(|n| n.managed() && n.in_run(run_id))
            .map(FakeResource::describe)
            .collect())
    }

    async fn container_logs(
        &self,
        container: &ContainerHandle,
        _tail: usize,
    ) -> TestEnvResult<String> {
        Ok(format!("fake logs for {}\n", container.name))
    }
}

/// How a [`FakeClient`] behaves when disconnected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisconnectBehavior {
    #[default]
    Succeed,
    Fail,
    Hang,
}

/// A [`ServiceClient`] that records its disconnect in an [`OperationLog`].
#[derive(Debug, Clone)]
pub struct FakeClient {
    label: String,
    log: OperationLog,
    behavior: DisconnectBehavior,
}

impl FakeClient {
    pub fn new(label: impl Into<String>, log: OperationLog) -> Self {
        Self {
            label: label.into(),
            log,
            behavior: DisconnectBehavior::Succeed,
        }
    }

    pub fn with_behavior(mut self, behavior: DisconnectBehavior) -> Self {
        self.behavior = behavior;
        self
    }
}

#[async_trait]
impl ServiceClient for FakeClient {
    fn label(&self) -> &str {
        &self.label
    }

    async fn disconnect(&self) -> TestEnvResult<()> {
        self.log.record(format!("disconnect:{}", self.label));
        match self.behavior {
            DisconnectBehavior::Succeed => Ok(()),
            DisconnectBehavior::Fail => Err(TestEnvError::DisconnectFailed {
                client: self.label.clone(),
                reason: "injected disconnect failure".to_string(),
            }),
            DisconnectBehavior::Hang => std::future::pending().await,
        }
    }
}
