//! Resource release stack and teardown reporting.
//!
//! Every resource a scenario acquires is pushed onto a [`ReleaseStack`] at
//! acquisition time. Unwinding disconnects service clients first (most
//! recent first), then purges containers and removes networks in strict
//! reverse order of creation.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::errors::{TestEnvError, TestEnvResult};
use crate::runtime::{ContainerHandle, ContainerRuntime, NetworkHandle};

/// A connection to a containerised service that must be closed before the
/// container behind it is purged.
#[async_trait]
pub trait ServiceClient: Send + Sync {
    /// Short name used in logs and teardown reports.
    fn label(&self) -> &str;

    /// Close the connection.
    async fn disconnect(&self) -> TestEnvResult<()>;
}

/// Kind of resource a [`ReleaseRecord`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseKind {
    Client,
    Container,
    Network,
}

impl fmt::Display for ReleaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReleaseKind::Client => write!(f, "client"),
            ReleaseKind::Container => write!(f, "container"),
            ReleaseKind::Network => write!(f, "network"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseOutcome {
    Released,
    Failed(String),
}

/// Result of releasing one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseRecord {
    pub kind: ReleaseKind,
    pub name: String,
    pub outcome: ReleaseOutcome,
}

/// Everything that happened during one unwind, in release order.
#[derive(Debug, Default)]
pub struct TeardownReport {
    pub records: Vec<ReleaseRecord>,
    pub errors: Vec<TestEnvError>,
}

impl TeardownReport {
    fn released(&mut self, kind: ReleaseKind, name: &str) {
        self.records.push(ReleaseRecord {
            kind,
            name: name.to_string(),
            outcome: ReleaseOutcome::Released,
        });
    }

    fn failed(&mut self, kind: ReleaseKind, name: &str, error: TestEnvError) {
        if error.is_escalated() {
            error!(kind = %kind, name = name, error = %error, "Release failed");
        } else {
            warn!(kind = %kind, name = name, error = %error, "Release failed, continuing teardown");
        }
        self.records.push(ReleaseRecord {
            kind,
            name: name.to_string(),
            outcome: ReleaseOutcome::Failed(error.to_string()),
        });
        self.errors.push(error);
    }

    /// Names of the resources released successfully, in release order.
    pub fn released_names(&self) -> Vec<&str> {
        self.records
            .iter()
            .filter(|r| r.outcome == ReleaseOutcome::Released)
            .map(|r| r.name.as_str())
            .collect()
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    /// First error that must fail the scenario.
    pub fn escalated(&self) -> Option<&TestEnvError> {
        self.errors.iter().find(|e| e.is_escalated())
    }

    /// Turn an escalated failure into an error; best-effort failures stay in
    /// the report.
    pub fn into_result(mut self) -> TestEnvResult<Self> {
        match self.errors.iter().position(TestEnvError::is_escalated) {
            Some(index) => Err(self.errors.remove(index)),
            None => Ok(self),
        }
    }
}

enum Resource {
    Network(NetworkHandle),
    Container(ContainerHandle),
}

struct RegisteredClient {
    client: Arc<dyn ServiceClient>,
    container: String,
}

/// LIFO record of acquired resources.
#[derive(Default)]
pub struct ReleaseStack {
    resources: Vec<Resource>,
    clients: Vec<RegisteredClient>,
}

impl ReleaseStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_network(&mut self, network: NetworkHandle) {
        self.resources.push(Resource::Network(network));
    }

    pub fn push_container(&mut self, container: ContainerHandle) {
        self.resources.push(Resource::Container(container));
    }

    /// Register a client bound to a container already on the stack.
    pub fn push_client(
        &mut self,
        client: Arc<dyn ServiceClient>,
        container: &ContainerHandle,
    ) -> TestEnvResult<()> {
        if !self.holds_container(&container.id) {
            return Err(TestEnvError::operation(
                format!("register client '{}'", client.label()),
                format!("container '{}' is not held by this scenario", container.name),
            ));
        }
        self.clients.push(RegisteredClient {
            client,
            container: container.name.clone(),
        });
        Ok(())
    }

    pub fn holds_container(&self, id: &str) -> bool {
        self.resources
            .iter()
            .any(|r| matches!(r, Resource::Container(c) if c.id == id))
    }

    pub fn len(&self) -> usize {
        self.resources.len() + self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Release everything on the stack, leaving it empty.
    ///
    /// Purge and network failures are recorded and the unwind continues.
    /// A network is only removed once every container attached to it was
    /// purged; a network the runtime still reports as in use is retried after
    /// all containers are gone.
    pub async fn unwind(
        &mut self,
        runtime: &dyn ContainerRuntime,
        disconnect_timeout: Duration,
    ) -> TeardownReport {
        let mut report = TeardownReport::default();

        while let Some(registered) = self.clients.pop() {
            let label = registered.client.label().to_string();
            debug!(client = %label, container = %registered.container, "Disconnecting client");

            let result =
                match tokio::time::timeout(disconnect_timeout, registered.client.disconnect()).await
                {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(e @ TestEnvError::DisconnectFailed { .. })) => Err(e),
                    Ok(Err(e)) => Err(TestEnvError::DisconnectFailed {
                        client: label.clone(),
                        reason: e.to_string(),
                    }),
                    Err(_) => Err(TestEnvError::DisconnectFailed {
                        client: label.clone(),
                        reason: format!("timed out after {:?}", disconnect_timeout),
                    }),
                };

            match result {
                Ok(()) => report.released(ReleaseKind::Client, &label),
                Err(e) => report.failed(ReleaseKind::Client, &label, e),
            }
        }

        // (network name, container name) of containers that could not be purged
        let mut stranded: Vec<(String, String)> = Vec::new();
        let mut deferred: Vec<NetworkHandle> = Vec::new();

        while let Some(resource) = self.resources.pop() {
            match resource {
                Resource::Container(container) => {
                    match runtime.purge_container(&container).await {
                        Ok(()) => report.released(ReleaseKind::Container, &container.name),
                        Err(e) => {
                            if let Some(network) = &container.network {
                                stranded.push((network.clone(), container.name.clone()));
                            }
                            report.failed(ReleaseKind::Container, &container.name, e);
                        }
                    }
                }
                Resource::Network(network) => {
                    let attached: Vec<String> = stranded
                        .iter()
                        .filter(|(net, _)| *net == network.name)
                        .map(|(_, name)| name.clone())
                        .collect();
                    if !attached.is_empty() {
                        let refusal = TestEnvError::NetworkInUse {
                            network: network.name.clone(),
                            attached,
                        };
                        report.failed(ReleaseKind::Network, &network.name, refusal);
                        continue;
                    }

                    match runtime.remove_network(&network).await {
                        Ok(()) => report.released(ReleaseKind::Network, &network.name),
                        Err(TestEnvError::NetworkInUse { attached, .. }) => {
                            debug!(
                                network = %network.name,
                                attached = ?attached,
                                "Network still in use, deferring removal"
                            );
                            deferred.push(network);
                        }
                        Err(e) => report.failed(ReleaseKind::Network, &network.name, e),
                    }
                }
            }
        }

        for network in deferred {
            match runtime.remove_network(&network).await {
                Ok(()) => report.released(ReleaseKind::Network, &network.name),
                Err(e) => report.failed(ReleaseKind::Network, &network.name, e),
            }
        }

        info!(
            released = report.released_names().len(),
            failed = report.errors.len(),
            "Teardown finished"
        );

        report
    }
}

#[cfg(test)]
#[path = "teardown_tests.rs"]
mod tests;
