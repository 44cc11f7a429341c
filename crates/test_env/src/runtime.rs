//! Container runtime abstraction.
//!
//! The [`ContainerRuntime`] trait is the seam between the orchestrator and
//! the container engine. [`crate::docker::DockerRuntime`] talks to a Docker
//! daemon; [`crate::fake::FakeRuntime`] records calls in memory so the
//! lifecycle rules can be tested without one.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::errors::{TestEnvError, TestEnvResult};
use crate::spec::{ContainerSpec, ImageSource, NetworkSpec};

/// Host address published container ports are bound to.
pub const LOOPBACK: &str = "127.0.0.1";

/// A running container owned by one scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHandle {
    pub id: String,
    pub name: String,
    /// Container port to host port
    pub ports: BTreeMap<u16, u16>,
    /// Network the container joined, if any
    pub network: Option<String>,
}

impl ContainerHandle {
    /// Handle for a container found by listing rather than started by us.
    pub fn detached(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ports: BTreeMap::new(),
            network: None,
        }
    }

    /// Host port bound to `container_port`.
    pub fn host_port(&self, container_port: u16) -> TestEnvResult<u16> {
        self.ports
            .get(&container_port)
            .copied()
            .ok_or_else(|| TestEnvError::PortNotMapped {
                container: self.name.clone(),
                port: container_port,
            })
    }

    /// `127.0.0.1:{host_port}` for `container_port`.
    pub fn host_endpoint(&self, container_port: u16) -> TestEnvResult<String> {
        Ok(format!("{}:{}", LOOPBACK, self.host_port(container_port)?))
    }
}

/// A user-defined network owned by one scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkHandle {
    pub id: String,
    pub name: String,
}

/// A labelled resource discovered on the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedResource {
    pub id: String,
    pub name: String,
    pub created_at: Option<DateTime<Utc>>,
    pub run_id: Option<String>,
    pub scenario: Option<String>,
}

/// Operations the orchestrator needs from a container engine.
///
/// Implementations must be safe to share between scenarios of one test run;
/// they hold no per-scenario state.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Check that the engine is reachable.
    async fn ping(&self) -> TestEnvResult<()>;

    /// Make `image` available locally and return its reference.
    ///
    /// Registry images are pulled when missing; build images are built from
    /// their context every time.
    async fn ensure_image(&self, image: &ImageSource) -> TestEnvResult<String>;

    /// Create and start a container from an already available image.
    ///
    /// `spec.name` is used verbatim as the container name. A container that
    /// was created but could not be started is removed before the error is
    /// returned.
    async fn start_container(&self, spec: &ContainerSpec, image: &str)
        -> TestEnvResult<ContainerHandle>;

    /// Stop and remove a container together with its anonymous volumes.
    async fn purge_container(&self, container: &ContainerHandle) -> TestEnvResult<()>;

    async fn create_network(&self, spec: &NetworkSpec) -> TestEnvResult<NetworkHandle>;

    /// Remove a network.
    ///
    /// Fails with [`TestEnvError::NetworkInUse`] while containers are still
    /// attached.
    async fn remove_network(&self, network: &NetworkHandle) -> TestEnvResult<()>;

    /// Containers carrying the managed label, optionally limited to one run.
    async fn list_managed_containers(
        &self,
        run_id: Option<&str>,
    ) -> TestEnvResult<Vec<ManagedResource>>;

    /// Networks carrying the managed label, optionally limited to one run.
    async fn list_managed_networks(&self, run_id: Option<&str>)
        -> TestEnvResult<Vec<ManagedResource>>;

    /// Last `tail` lines of a container's output, for diagnostics.
    async fn container_logs(
        &self,
        _container: &ContainerHandle,
        _tail: usize,
    ) -> TestEnvResult<String> {
        Ok(String::new())
    }
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;
