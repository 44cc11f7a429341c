//! Integration test runner for the container harness.
//!
//! Runs the scenarios one after another against a shared [`ContainerPool`],
//! records how far each one got and whether its fixtures matched, and
//! offers the orphan cleanup used before and after a run.

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use test_cleanup::{CleanupSummary, ResourceCleanup};
use test_env::{ContainerPool, EnvironmentConfig, ErrorCategory, TestEnvError};
use tracing::{error, info, warn};

use crate::config::HarnessConfig;
use crate::scenarios::{
    run_object_storage, run_restaurant_lookup, OBJECT_STORAGE_SCENARIO,
    RESTAURANT_LOOKUP_SCENARIO,
};
use crate::verification::FixtureVerification;

/// Scenarios the runner knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestScenario {
    /// Fake GCS server: list, read, write, read back, delete
    ObjectStorage,
    /// MongoDB plus seeder: look up one restaurant by business key
    RestaurantLookup,
}

impl TestScenario {
    /// Every scenario, in the order a full run executes them.
    pub fn all() -> [TestScenario; 2] {
        [TestScenario::ObjectStorage, TestScenario::RestaurantLookup]
    }

    /// Name used for container names and on the command line.
    pub fn test_name(&self) -> &'static str {
        match self {
            TestScenario::ObjectStorage => OBJECT_STORAGE_SCENARIO,
            TestScenario::RestaurantLookup => RESTAURANT_LOOKUP_SCENARIO,
        }
    }

    /// Human readable title for reports.
    pub fn title(&self) -> &'static str {
        match self {
            TestScenario::ObjectStorage => "Object Storage Round Trip",
            TestScenario::RestaurantLookup => "Restaurant Lookup",
        }
    }
}

impl fmt::Display for TestScenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.test_name())
    }
}

impl FromStr for TestScenario {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        TestScenario::all()
            .into_iter()
            .find(|scenario| scenario.test_name() == s)
            .ok_or_else(|| anyhow::anyhow!("Unknown scenario '{}'", s))
    }
}

/// Result of running a single test scenario
#[derive(Debug)]
pub struct TestResult {
    pub scenario: TestScenario,
    pub success: bool,
    pub error: Option<String>,
    pub duration: Duration,
    pub details: TestDetails,
    /// Fixture comparison, present when the scenario got to run its checks
    pub verification: Option<FixtureVerification>,
}

/// How far a scenario got.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TestDetails {
    /// Every container and network was created
    pub provisioned: bool,
    /// Every service passed its readiness probe
    pub ready: bool,
    /// The domain operations completed
    pub executed: bool,
    /// Observed data matched the fixtures
    pub verified: bool,
    /// Teardown released everything without an escalated failure
    pub teardown_clean: bool,
}

impl TestDetails {
    /// Details of a scenario that ran to completion.
    pub fn completed(verified: bool) -> Self {
        Self {
            provisioned: true,
            ready: true,
            executed: true,
            verified,
            teardown_clean: true,
        }
    }

    /// Furthest step reached by a scenario that failed with `error`.
    ///
    /// Errors that did not come from the orchestrator are client failures
    /// during execution.
    pub fn from_error(error: &anyhow::Error) -> Self {
        let category = error
            .downcast_ref::<TestEnvError>()
            .map(TestEnvError::category)
            .unwrap_or(ErrorCategory::Operation);

        match category {
            ErrorCategory::Infrastructure => Self {
                teardown_clean: true,
                ..Self::default()
            },
            ErrorCategory::Readiness => Self {
                provisioned: true,
                teardown_clean: true,
                ..Self::default()
            },
            ErrorCategory::Operation => Self {
                provisioned: true,
                ready: true,
                teardown_clean: true,
                ..Self::default()
            },
            ErrorCategory::Teardown => Self {
                provisioned: true,
                ready: true,
                executed: true,
                ..Self::default()
            },
        }
    }
}

/// Integration test runner that orchestrates all test scenarios
pub struct IntegrationTestRunner {
    pool: ContainerPool,
    config: HarnessConfig,
    cleanup: ResourceCleanup,
}

impl IntegrationTestRunner {
    /// Connect to Docker and prepare a runner for `config`.
    pub async fn new(env_config: EnvironmentConfig, config: HarnessConfig) -> Result<Self> {
        info!("Initializing integration test runner");

        let pool = ContainerPool::connect(env_config)
            .await
            .context("Failed to connect to the container runtime")?;

        Ok(Self::with_pool(pool, config))
    }

    /// Runner over an existing pool.
    pub fn with_pool(pool: ContainerPool, config: HarnessConfig) -> Self {
        let cleanup = ResourceCleanup::new(pool.runtime(), pool.config().resource_prefix.clone());

        Self {
            pool,
            config,
            cleanup,
        }
    }

    pub fn run_id(&self) -> &str {
        self.pool.run_id()
    }

    /// Run all integration test scenarios
    pub async fn run_all_tests(&self) -> Vec<TestResult> {
        info!(run_id = %self.run_id(), "Starting integration test suite");

        let mut results = Vec::new();
        for scenario in TestScenario::all() {
            results.push(self.run_single_test(scenario).await);
        }

        let total_tests = results.len();
        let passed_tests = results.iter().filter(|r| r.success).count();

        info!(
            total = total_tests,
            passed = passed_tests,
            failed = total_tests - passed_tests,
            "Integration test suite completed"
        );

        results
    }

    /// Run a single test scenario
    pub async fn run_single_test(&self, scenario: TestScenario) -> TestResult {
        let start_time = Instant::now();
        info!(scenario = %scenario, "Starting test scenario");

        let outcome = match scenario {
            TestScenario::ObjectStorage => run_object_storage(&self.pool, &self.config)
                .await
                .map(|outcome| outcome.verification),
            TestScenario::RestaurantLookup => run_restaurant_lookup(&self.pool, &self.config)
                .await
                .map(|outcome| outcome.verification),
        };

        let duration = start_time.elapsed();

        match outcome {
            Ok(verification) if verification.passed => {
                info!(
                    scenario = %scenario,
                    checks = verification.checks.len(),
                    "Test scenario completed successfully"
                );
                TestResult {
                    scenario,
                    success: true,
                    error: None,
                    duration,
                    details: TestDetails::completed(true),
                    verification: Some(verification),
                }
            }
            Ok(verification) => {
                warn!(
                    scenario = %scenario,
                    failures = ?verification.failures,
                    "Test scenario did not match its fixtures"
                );
                TestResult {
                    scenario,
                    success: false,
                    error: Some(verification.failures.join("; ")),
                    duration,
                    details: TestDetails::completed(false),
                    verification: Some(verification),
                }
            }
            Err(e) => {
                error!(scenario = %scenario, error = %format!("{:#}", e), "Test scenario failed");
                TestResult {
                    scenario,
                    success: false,
                    error: Some(format!("{:#}", e)),
                    duration,
                    details: TestDetails::from_error(&e),
                    verification: None,
                }
            }
        }
    }

    /// Remove harness resources older than `max_age_hours`.
    pub async fn cleanup_orphaned_resources(&self, max_age_hours: u64) -> Result<CleanupSummary> {
        self.cleanup.cleanup_orphaned_resources(max_age_hours).await
    }

    /// Remove anything this run left behind.
    pub async fn cleanup_run_resources(&self) -> Result<CleanupSummary> {
        self.cleanup.cleanup_run(self.pool.run_id()).await
    }
}

#[cfg(test)]
#[path = "test_runner_tests.rs"]
mod tests;
