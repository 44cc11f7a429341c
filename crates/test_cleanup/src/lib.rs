//! Test resource cleanup utilities.
//!
//! This crate removes containers and networks left behind by interrupted
//! integration test runs. It can be used both programmatically (from test
//! code) and via CLI binaries. Only resources carrying the harness labels
//! and following its naming convention are touched.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::env;
use std::sync::Arc;
use std::time::Duration;
use test_env::{
    ContainerHandle, ContainerRuntime, DockerRuntime, ManagedResource, NetworkHandle,
    TestEnvError,
};
use tracing::{debug, info, warn};

pub use test_env::init_logging;

/// Configuration for cleanup operations loaded from environment variables.
#[derive(Debug, Clone)]
pub struct CleanupConfig {
    /// Prefix shared by every resource the harness names
    pub resource_prefix: String,
    /// Grace period for stopping a container before it is killed
    pub stop_timeout: Duration,
}

impl CleanupConfig {
    /// Load cleanup configuration from environment variables.
    ///
    /// Optional environment variables:
    /// - `TEST_ENV_RESOURCE_PREFIX`: resource name prefix (default: "tenv")
    /// - `TEST_ENV_STOP_TIMEOUT_SECS`: container stop grace period (default: 5)
    pub fn from_env() -> Result<Self> {
        let resource_prefix = env::var("TEST_ENV_RESOURCE_PREFIX")
            .ok()
            .map(|p| test_utils::sanitize_resource_name(&p))
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| test_env::config::DEFAULT_RESOURCE_PREFIX.to_string());

        let stop_timeout = match env::var("TEST_ENV_STOP_TIMEOUT_SECS") {
            Ok(raw) => Duration::from_secs(
                raw.trim()
                    .parse::<u64>()
                    .context("TEST_ENV_STOP_TIMEOUT_SECS must be a whole number of seconds")?,
            ),
            Err(_) => Duration::from_secs(5),
        };

        Ok(Self {
            resource_prefix,
            stop_timeout,
        })
    }
}

/// Names of what one cleanup pass removed or failed to remove.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanupSummary {
    pub containers: Vec<String>,
    pub networks: Vec<String>,
    pub failures: Vec<String>,
}

impl CleanupSummary {
    pub fn removed_count(&self) -> usize {
        self.containers.len() + self.networks.len()
    }
}

/// Which leftovers a cleanup pass targets.
enum Selection<'a> {
    /// Older than the cutoff
    OlderThan(DateTime<Utc>),
    /// Labelled with this run id
    Run(&'a str),
    /// Named with this CI context, e.g. `pr123`
    Context(&'a str),
}

/// Container and network cleanup for test resources.
pub struct ResourceCleanup {
    runtime: Arc<dyn ContainerRuntime>,
    resource_prefix: String,
}

impl ResourceCleanup {
    /// Create a new cleanup instance.
    ///
    /// # Arguments
    ///
    /// * `runtime` - Container runtime holding the resources
    /// * `resource_prefix` - Prefix of the resource names the harness generates
    pub fn new(runtime: Arc<dyn ContainerRuntime>, resource_prefix: impl Into<String>) -> Self {
        Self {
            runtime,
            resource_prefix: resource_prefix.into(),
        }
    }

    /// Connect to the local Docker daemon.
    pub async fn connect(config: &CleanupConfig) -> Result<Self> {
        let runtime = DockerRuntime::connect(config.stop_timeout)
            .context("Failed to connect to Docker")?;
        runtime
            .ping()
            .await
            .context("Docker daemon is not responding")?;

        Ok(Self::new(Arc::new(runtime), config.resource_prefix.clone()))
    }

    /// Check if a resource name follows the harness naming convention.
    pub fn is_test_resource(&self, name: &str) -> bool {
        test_utils::is_generated_name(&self.resource_prefix, name)
    }

    /// Remove test containers and networks older than `max_age_hours`.
    pub async fn cleanup_orphaned_resources(&self, max_age_hours: u64) -> Result<CleanupSummary> {
        info!(max_age_hours = max_age_hours, "Searching for orphaned test resources");
        let cutoff = i64::try_from(max_age_hours)
            .ok()
            .and_then(chrono::Duration::try_hours)
            .and_then(|max_age| Utc::now().checked_sub_signed(max_age))
            .with_context(|| format!("max age of {} hours is out of range", max_age_hours))?;
        self.cleanup(Selection::OlderThan(cutoff), None).await
    }

    /// Remove every resource created by one container pool, regardless of age.
    pub async fn cleanup_run(&self, run_id: &str) -> Result<CleanupSummary> {
        info!(run_id = run_id, "Searching for resources of run");
        self.cleanup(Selection::Run(run_id), Some(run_id)).await
    }

    /// Remove every resource created from a pull request's CI runs.
    pub async fn cleanup_pr_resources(&self, pr_number: u32) -> Result<CleanupSummary> {
        let context = format!("pr{}", pr_number);
        info!(pr_number = pr_number, "Searching for resources of PR {}", pr_number);
        self.cleanup(Selection::Context(&context), None).await
    }

    fn selected(&self, resource: &ManagedResource, selection: &Selection<'_>) -> bool {
        if !self.is_test_resource(&resource.name) {
            debug!(name = %resource.name, "Not a harness name, skipping");
            return false;
        }

        match selection {
            Selection::OlderThan(cutoff) => match resource.created_at {
                Some(created_at) if created_at < *cutoff => true,
                Some(created_at) => {
                    debug!(
                        name = %resource.name,
                        age_hours = (Utc::now() - created_at).num_hours(),
                        "Resource is too new, skipping"
                    );
                    false
                }
                None => false,
            },
            Selection::Run(run_id) => resource.run_id.as_deref() == Some(*run_id),
            Selection::Context(context) => {
                let expected = format!("{}-{}-", self.resource_prefix, context);
                resource.name.trim_start_matches('/').starts_with(&expected)
            }
        }
    }

    /// Containers first so their networks are free by the time they are removed.
    async fn cleanup(
        &self,
        selection: Selection<'_>,
        run_filter: Option<&str>,
    ) -> Result<CleanupSummary> {
        let mut summary = CleanupSummary::default();

        let containers = self
            .runtime
            .list_managed_containers(run_filter)
            .await
            .context("Failed to list test containers")?;

        for container in containers
            .into_iter()
            .filter(|c| self.selected(c, &selection))
        {
            info!(container = %container.name, created_at = ?container.created_at, "Removing container");
            let handle = ContainerHandle::detached(&container.id, &container.name);
            match self.runtime.purge_container(&handle).await {
                Ok(()) => summary.containers.push(container.name),
                Err(e) => {
                    warn!(container = %container.name, error = %e, "Failed to remove container");
                    summary.failures.push(format!("{}: {}", container.name, e));
                }
            }
        }

        let networks = self
            .runtime
            .list_managed_networks(run_filter)
            .await
            .context("Failed to list test networks")?;

        for network in networks
            .into_iter()
            .filter(|n| self.selected(n, &selection))
        {
            info!(network = %network.name, "Removing network");
            let handle = NetworkHandle {
                id: network.id.clone(),
                name: network.name.clone(),
            };
            match self.runtime.remove_network(&handle).await {
                Ok(()) => summary.networks.push(network.name),
                Err(e @ TestEnvError::NetworkInUse { .. }) => {
                    warn!(network = %network.name, error = %e, "Network still in use, leaving it");
                    summary.failures.push(format!("{}: {}", network.name, e));
                }
                Err(e) => {
                    warn!(network = %network.name, error = %e, "Failed to remove network");
                    summary.failures.push(format!("{}: {}", network.name, e));
                }
            }
        }

        info!(
            containers = summary.containers.len(),
            networks = summary.networks.len(),
            failures = summary.failures.len(),
            "Cleanup completed"
        );

        Ok(summary)
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
