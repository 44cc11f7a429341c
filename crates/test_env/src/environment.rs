//! Per-scenario test environment and its lifecycle phases.

use futures_util::future::BoxFuture;
use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::EnvironmentConfig;
use crate::errors::{TestEnvError, TestEnvResult};
use crate::readiness::wait_until_ready;
use crate::runtime::{ContainerHandle, ContainerRuntime, NetworkHandle};
use crate::spec::{ContainerSpec, NetworkSpec, LABEL_MANAGED, LABEL_RUN, LABEL_SCENARIO};
use crate::teardown::{ReleaseStack, ServiceClient, TeardownReport};

/// Lines of container output logged when a readiness wait gives up.
const DIAGNOSTIC_LOG_LINES: usize = 50;

/// Lifecycle phase of one scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScenarioPhase {
    Init,
    Provisioning,
    AwaitingReady,
    Executing,
    TearingDown,
    Failed,
    Done,
}

impl ScenarioPhase {
    /// Whether moving from `self` to `next` is a legal step.
    pub fn can_transition_to(self, next: ScenarioPhase) -> bool {
        use ScenarioPhase::*;

        matches!(
            (self, next),
            (Init, Provisioning)
                | (Init, TearingDown)
                | (Provisioning, Provisioning)
                | (Provisioning, AwaitingReady)
                | (Provisioning, Failed)
                | (AwaitingReady, AwaitingReady)
                | (AwaitingReady, Provisioning)
                | (AwaitingReady, Executing)
                | (AwaitingReady, Failed)
                | (Executing, TearingDown)
                | (Executing, Failed)
                | (Failed, TearingDown)
                | (TearingDown, Done)
        )
    }

    pub fn is_terminal(self) -> bool {
        self == ScenarioPhase::Done
    }
}

impl fmt::Display for ScenarioPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScenarioPhase::Init => "init",
            ScenarioPhase::Provisioning => "provisioning",
            ScenarioPhase::AwaitingReady => "awaiting-ready",
            ScenarioPhase::Executing => "executing",
            ScenarioPhase::TearingDown => "tearing-down",
            ScenarioPhase::Failed => "failed",
            ScenarioPhase::Done => "done",
        };
        f.write_str(name)
    }
}

/// Resources and lifecycle state of one scenario.
///
/// Obtained from [`crate::ContainerPool::environment`]. Everything the
/// environment acquires is released by [`TestEnvironment::teardown`], which
/// [`TestEnvironment::run`] calls whatever the scenario body returns.
pub struct TestEnvironment {
    scenario: String,
    run_id: String,
    config: EnvironmentConfig,
    runtime: Arc<dyn ContainerRuntime>,
    phase: ScenarioPhase,
    history: Vec<ScenarioPhase>,
    releases: ReleaseStack,
    ready: BTreeSet<String>,
    torn_down: bool,
}

impl TestEnvironment {
    pub(crate) fn new(
        scenario: impl Into<String>,
        run_id: impl Into<String>,
        config: EnvironmentConfig,
        runtime: Arc<dyn ContainerRuntime>,
    ) -> Self {
        Self {
            scenario: scenario.into(),
            run_id: run_id.into(),
            config,
            runtime,
            phase: ScenarioPhase::Init,
            history: vec![ScenarioPhase::Init],
            releases: ReleaseStack::new(),
            ready: BTreeSet::new(),
            torn_down: false,
        }
    }

    pub fn scenario(&self) -> &str {
        &self.scenario
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn config(&self) -> &EnvironmentConfig {
        &self.config
    }

    pub fn phase(&self) -> ScenarioPhase {
        self.phase
    }

    /// Every phase entered so far, starting with [`ScenarioPhase::Init`].
    pub fn history(&self) -> &[ScenarioPhase] {
        &self.history
    }

    fn transition(&mut self, next: ScenarioPhase) -> TestEnvResult<()> {
        if !self.phase.can_transition_to(next) {
            return Err(TestEnvError::InvalidTransition {
                from: self.phase,
                to: next,
            });
        }
        if self.phase != next {
            debug!(scenario = %self.scenario, from = %self.phase, to = %next, "Phase change");
            self.history.push(next);
        }
        self.phase = next;
        Ok(())
    }

    /// Record `error` as fatal for the scenario and hand it back.
    fn fail(&mut self, error: TestEnvError) -> TestEnvError {
        error!(scenario = %self.scenario, phase = %self.phase, error = %error, "Scenario failed");
        if self.phase.can_transition_to(ScenarioPhase::Failed) {
            self.phase = ScenarioPhase::Failed;
            self.history.push(ScenarioPhase::Failed);
        }
        error
    }

    fn resource_name(&self, logical: &str) -> String {
        test_utils::generate_resource_name(
            &self.config.resource_prefix,
            &format!("{}-{}", self.scenario, logical),
        )
    }

    /// Create an isolated network for the scenario's containers.
    pub async fn create_network(&mut self, logical_name: &str) -> TestEnvResult<NetworkHandle> {
        self.transition(ScenarioPhase::Provisioning)?;

        let spec = NetworkSpec::new(self.resource_name(logical_name))
            .with_label(LABEL_MANAGED, "true")
            .with_label(LABEL_RUN, self.run_id.as_str())
            .with_label(LABEL_SCENARIO, self.scenario.as_str());

        info!(scenario = %self.scenario, network = %spec.name, "Creating network");

        match self.runtime.create_network(&spec).await {
            Ok(network) => {
                self.releases.push_network(network.clone());
                Ok(network)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Obtain the image and start one container.
    ///
    /// The container gets a unique name derived from `spec.name` and the
    /// harness labels; it is registered for teardown before this returns.
    pub async fn provision(&mut self, spec: ContainerSpec) -> TestEnvResult<ContainerHandle> {
        self.transition(ScenarioPhase::Provisioning)?;

        let logical_name = spec.name.clone();
        let mut spec = spec
            .with_label(LABEL_MANAGED, "true")
            .with_label(LABEL_RUN, self.run_id.as_str())
            .with_label(LABEL_SCENARIO, self.scenario.as_str());
        spec.name = self.resource_name(&logical_name);

        info!(
            scenario = %self.scenario,
            service = %logical_name,
            container = %spec.name,
            image = %spec.image.reference(),
            "Provisioning container"
        );

        let image = match self.runtime.ensure_image(&spec.image).await {
            Ok(image) => image,
            Err(e) => return Err(self.fail(e)),
        };

        match self.runtime.start_container(&spec, &image).await {
            Ok(container) => {
                self.releases.push_container(container.clone());
                info!(service = %logical_name, container = %container.name, "✓ Container provisioned");
                Ok(container)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Poll `probe` until it succeeds or the readiness budget runs out.
    ///
    /// On success `container` counts as ready and clients may be registered
    /// against it. On exhaustion the container's recent output is logged and
    /// the scenario fails.
    pub async fn await_ready<T, E, F, Fut>(
        &mut self,
        service: &str,
        container: &ContainerHandle,
        probe: F,
    ) -> TestEnvResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        self.transition(ScenarioPhase::AwaitingReady)?;

        let policy = self.config.backoff_policy();
        match wait_until_ready(service, &policy, probe).await {
            Ok(value) => {
                self.ready.insert(container.id.clone());
                Ok(value)
            }
            Err(e) => {
                match self
                    .runtime
                    .container_logs(container, DIAGNOSTIC_LOG_LINES)
                    .await
                {
                    Ok(logs) if !logs.is_empty() => {
                        warn!(container = %container.name, "Container output:\n{}", logs);
                    }
                    Ok(_) => {}
                    Err(log_err) => {
                        debug!(container = %container.name, error = %log_err, "No container logs");
                    }
                }
                Err(self.fail(e))
            }
        }
    }

    /// Hand a connected client to the environment so teardown closes it
    /// before `container` is purged.
    pub fn register_client(
        &mut self,
        client: Arc<dyn ServiceClient>,
        container: &ContainerHandle,
    ) -> TestEnvResult<()> {
        if !self.ready.contains(&container.id) {
            return Err(TestEnvError::operation(
                format!("register client '{}'", client.label()),
                format!("container '{}' has not passed readiness", container.name),
            ));
        }
        self.releases.push_client(client, container)
    }

    /// Enter [`ScenarioPhase::Executing`]; all services must be ready.
    pub fn begin_execution(&mut self) -> TestEnvResult<()> {
        self.transition(ScenarioPhase::Executing)?;
        info!(scenario = %self.scenario, "Executing scenario");
        Ok(())
    }

    /// Release every acquired resource exactly once.
    ///
    /// Best-effort failures stay in the returned report. An escalated
    /// failure (a client that could not be disconnected) is returned as the
    /// error after the remaining resources were released anyway.
    pub async fn teardown(&mut self) -> TestEnvResult<TeardownReport> {
        if self.torn_down {
            return Err(TestEnvError::InvalidTransition {
                from: self.phase,
                to: ScenarioPhase::TearingDown,
            });
        }

        if matches!(
            self.phase,
            ScenarioPhase::Provisioning | ScenarioPhase::AwaitingReady
        ) {
            self.transition(ScenarioPhase::Failed)?;
        }
        self.transition(ScenarioPhase::TearingDown)?;
        self.torn_down = true;

        info!(scenario = %self.scenario, resources = self.releases.len(), "Tearing down");

        let report = self
            .releases
            .unwind(self.runtime.as_ref(), self.config.disconnect_timeout)
            .await;
        self.transition(ScenarioPhase::Done)?;

        if report.is_clean() {
            info!(scenario = %self.scenario, "✓ Teardown complete");
        } else {
            warn!(
                scenario = %self.scenario,
                failures = report.errors.len(),
                "Teardown completed with failures"
            );
        }

        report.into_result()
    }

    /// Run `body` and tear down afterwards regardless of its outcome.
    ///
    /// When both the body and teardown fail, the escalated teardown error is
    /// returned and the body's error is logged.
    pub async fn run<T, E, F>(mut self, body: F) -> Result<T, E>
    where
        E: From<TestEnvError> + fmt::Display,
        F: for<'a> FnOnce(&'a mut TestEnvironment) -> BoxFuture<'a, Result<T, E>>,
    {
        let mut outcome = body(&mut self).await;

        if outcome.is_ok()
            && matches!(
                self.phase,
                ScenarioPhase::Provisioning | ScenarioPhase::AwaitingReady
            )
        {
            warn!(
                scenario = %self.scenario,
                phase = ?self.phase,
                "Scenario body returned without entering execution"
            );
            outcome = Err(TestEnvError::InvalidTransition {
                from: self.phase,
                to: ScenarioPhase::TearingDown,
            }
            .into());
        }

        if outcome.is_err() && self.phase.can_transition_to(ScenarioPhase::Failed) {
            self.phase = ScenarioPhase::Failed;
            self.history.push(ScenarioPhase::Failed);
        }

        if self.torn_down {
            return outcome;
        }

        match (outcome, self.teardown().await) {
            (Ok(value), Ok(_)) => Ok(value),
            (Ok(_), Err(teardown_err)) => Err(teardown_err.into()),
            (Err(body_err), Ok(_)) => Err(body_err),
            (Err(body_err), Err(teardown_err)) => {
                error!(
                    scenario = %self.scenario,
                    error = %body_err,
                    "Scenario failed; reporting teardown error instead"
                );
                Err(teardown_err.into())
            }
        }
    }
}

impl Drop for TestEnvironment {
    fn drop(&mut self) {
        if self.torn_down || self.releases.is_empty() {
            return;
        }

        warn!(
            scenario = %self.scenario,
            resources = self.releases.len(),
            "Environment dropped without teardown, releasing in background"
        );

        let mut releases = std::mem::take(&mut self.releases);
        let runtime = Arc::clone(&self.runtime);
        let disconnect_timeout = self.config.disconnect_timeout;

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    let report = releases.unwind(runtime.as_ref(), disconnect_timeout).await;
                    if !report.is_clean() {
                        warn!(failures = report.errors.len(), "Background teardown incomplete");
                    }
                });
            }
            Err(_) => {
                warn!("No async runtime available; leftover resources need orphan cleanup");
            }
        }
    }
}

#[cfg(test)]
#[path = "environment_tests.rs"]
mod tests;
