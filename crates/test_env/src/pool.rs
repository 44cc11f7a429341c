//! Container pool shared by the scenarios of one test run.

use std::sync::Arc;
use tracing::info;

use crate::config::EnvironmentConfig;
use crate::docker::DockerRuntime;
use crate::environment::TestEnvironment;
use crate::errors::TestEnvResult;
use crate::runtime::ContainerRuntime;

/// Entry point for provisioning: owns the runtime connection and the run id
/// every resource of this run is labelled with.
///
/// Scenarios get their own [`TestEnvironment`]; nothing is shared between
/// them except the runtime connection.
#[derive(Clone)]
pub struct ContainerPool {
    runtime: Arc<dyn ContainerRuntime>,
    config: EnvironmentConfig,
    run_id: String,
}

impl ContainerPool {
    /// Connect to the local Docker daemon and verify it responds.
    pub async fn connect(config: EnvironmentConfig) -> TestEnvResult<Self> {
        let runtime = DockerRuntime::connect(config.stop_timeout)?;
        runtime.ping().await?;
        info!("✓ Connected to Docker daemon");

        Ok(Self::with_runtime(Arc::new(runtime), config))
    }

    /// Pool over an existing runtime, e.g. [`crate::fake::FakeRuntime`].
    pub fn with_runtime(runtime: Arc<dyn ContainerRuntime>, config: EnvironmentConfig) -> Self {
        let run_id = test_utils::generate_resource_name(&config.resource_prefix, "run");
        info!(run_id = %run_id, "Container pool ready");

        Self {
            runtime,
            config,
            run_id,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn config(&self) -> &EnvironmentConfig {
        &self.config
    }

    pub fn runtime(&self) -> Arc<dyn ContainerRuntime> {
        Arc::clone(&self.runtime)
    }

    /// Fresh environment for one scenario.
    pub fn environment(&self, scenario: &str) -> TestEnvironment {
        TestEnvironment::new(
            test_utils::sanitize_resource_name(scenario),
            self.run_id.clone(),
            self.config.clone(),
            Arc::clone(&self.runtime),
        )
    }
}

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;
