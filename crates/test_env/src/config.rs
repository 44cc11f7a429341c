//! Environment-driven configuration for the orchestrator.

use std::env;
use std::time::Duration;

use crate::errors::{TestEnvError, TestEnvResult};
use crate::readiness::BackoffPolicy;

/// Default prefix for every container and network name the harness creates.
pub const DEFAULT_RESOURCE_PREFIX: &str = "tenv";

/// Timing and naming configuration shared by every scenario of a test run.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvironmentConfig {
    /// Total time budget for one readiness wait
    pub max_wait: Duration,

    /// First delay between readiness probes
    pub initial_interval: Duration,

    /// Upper bound for a single delay between readiness probes
    pub max_interval: Duration,

    /// Budget for disconnecting one service client during teardown
    pub disconnect_timeout: Duration,

    /// Grace period given to a container before it is killed
    pub stop_timeout: Duration,

    /// Prefix for generated container and network names
    pub resource_prefix: String,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            max_wait: Duration::from_secs(60),
            initial_interval: Duration::from_millis(500),
            max_interval: Duration::from_secs(60),
            disconnect_timeout: Duration::from_secs(10),
            stop_timeout: Duration::from_secs(5),
            resource_prefix: DEFAULT_RESOURCE_PREFIX.to_string(),
        }
    }
}

impl EnvironmentConfig {
    /// Load configuration from environment variables.
    ///
    /// Optional environment variables:
    /// - `TEST_ENV_MAX_WAIT_SECS`: readiness budget in seconds (default: 60)
    /// - `TEST_ENV_RETRY_INITIAL_MS`: first probe delay in milliseconds (default: 500)
    /// - `TEST_ENV_RETRY_MAX_INTERVAL_SECS`: longest probe delay in seconds (default: 60)
    /// - `TEST_ENV_DISCONNECT_TIMEOUT_SECS`: client disconnect budget (default: 10)
    /// - `TEST_ENV_STOP_TIMEOUT_SECS`: container stop grace period (default: 5)
    /// - `TEST_ENV_RESOURCE_PREFIX`: name prefix for containers and networks (default: "tenv")
    pub fn from_env() -> TestEnvResult<Self> {
        let defaults = Self::default();

        let max_wait = duration_var("TEST_ENV_MAX_WAIT_SECS", Duration::from_secs)?
            .unwrap_or(defaults.max_wait);
        let initial_interval = duration_var("TEST_ENV_RETRY_INITIAL_MS", Duration::from_millis)?
            .unwrap_or(defaults.initial_interval);
        let max_interval = duration_var("TEST_ENV_RETRY_MAX_INTERVAL_SECS", Duration::from_secs)?
            .unwrap_or(defaults.max_interval);
        let disconnect_timeout =
            duration_var("TEST_ENV_DISCONNECT_TIMEOUT_SECS", Duration::from_secs)?
                .unwrap_or(defaults.disconnect_timeout);
        let stop_timeout = duration_var("TEST_ENV_STOP_TIMEOUT_SECS", Duration::from_secs)?
            .unwrap_or(defaults.stop_timeout);
        let resource_prefix = env::var("TEST_ENV_RESOURCE_PREFIX")
            .ok()
            .map(|p| test_utils::sanitize_resource_name(&p))
            .filter(|p| !p.is_empty())
            .unwrap_or(defaults.resource_prefix);

        if max_wait.is_zero() {
            return Err(TestEnvError::Config {
                key: "TEST_ENV_MAX_WAIT_SECS".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(Self {
            max_wait,
            initial_interval,
            max_interval,
            disconnect_timeout,
            stop_timeout,
            resource_prefix,
        })
    }

    /// Backoff policy used by readiness waits.
    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy {
            initial_interval: self.initial_interval,
            max_interval: self.max_interval,
            max_elapsed: self.max_wait,
            ..BackoffPolicy::default()
        }
    }
}

fn duration_var(key: &str, unit: fn(u64) -> Duration) -> TestEnvResult<Option<Duration>> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(|value| Some(unit(value)))
            .map_err(|e| TestEnvError::Config {
                key: key.to_string(),
                reason: format!("'{}' is not a whole number: {}", raw, e),
            }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
