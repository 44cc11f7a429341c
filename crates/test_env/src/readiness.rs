//! Readiness gate.
//!
//! A started container does not mean the service inside it accepts
//! connections yet. [`wait_until_ready`] retries a caller-supplied probe
//! with exponential backoff until it succeeds or the elapsed-time budget
//! runs out.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};

use crate::errors::{TestEnvError, TestEnvResult};

/// Least time any probe attempt gets, including the one made when the
/// budget is already spent.
pub const MIN_PROBE_TIME: Duration = Duration::from_millis(500);

/// Exponential backoff settings for readiness probing.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    /// Delay after the first failed probe
    pub initial_interval: Duration,

    /// Factor applied to the delay after every failed probe
    pub multiplier: f64,

    /// Upper bound for a single delay
    pub max_interval: Duration,

    /// Total budget, measured from the first probe
    pub max_elapsed: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(500),
            multiplier: 1.5,
            max_interval: Duration::from_secs(60),
            max_elapsed: Duration::from_secs(60),
        }
    }
}

impl BackoffPolicy {
    /// Policy with the given total budget and default intervals.
    pub fn with_max_elapsed(max_elapsed: Duration) -> Self {
        Self {
            max_elapsed,
            ..Self::default()
        }
    }

    /// Delay that follows `current`.
    pub fn next_interval(&self, current: Duration) -> Duration {
        let multiplier = if self.multiplier.is_finite() && self.multiplier >= 1.0 {
            self.multiplier
        } else {
            1.0
        };
        let next = current.as_secs_f64() * multiplier;
        if next >= self.max_interval.as_secs_f64() {
            self.max_interval
        } else {
            Duration::from_secs_f64(next)
        }
    }
}

/// Retry `probe` until it succeeds or `policy.max_elapsed` is exhausted.
///
/// Every attempt is bounded by the remaining budget (never less than
/// [`MIN_PROBE_TIME`]), so a probe that never completes still ends the wait
/// on time. The value produced by the first
/// successful probe is returned.
///
/// # Errors
///
/// Returns [`TestEnvError::NotReady`] with the attempt count and the last
/// probe error once the budget is spent.
pub async fn wait_until_ready<T, E, F, Fut>(
    service: &str,
    policy: &BackoffPolicy,
    mut probe: F,
) -> TestEnvResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let start = Instant::now();
    let mut interval = policy.initial_interval.min(policy.max_interval);
    let mut attempts = 0u32;

    info!(
        service = service,
        max_elapsed_ms = policy.max_elapsed.as_millis() as u64,
        "Waiting for service to become ready"
    );

    loop {
        attempts += 1;
        let remaining = policy
            .max_elapsed
            .saturating_sub(start.elapsed())
            .max(MIN_PROBE_TIME);

        let last_error = match timeout(remaining, probe()).await {
            Ok(Ok(value)) => {
                info!(
                    service = service,
                    attempts = attempts,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "✓ Service is ready"
                );
                return Ok(value);
            }
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("probe did not complete within {:?}", remaining),
        };

        let elapsed = start.elapsed();
        if elapsed >= policy.max_elapsed {
            warn!(
                service = service,
                attempts = attempts,
                elapsed_ms = elapsed.as_millis() as u64,
                error = %last_error,
                "Readiness budget exhausted"
            );
            return Err(TestEnvError::NotReady {
                service: service.to_string(),
                attempts,
                elapsed,
                last_error,
            });
        }

        let delay = interval.min(policy.max_elapsed - elapsed);
        debug!(
            service = service,
            attempt = attempts,
            delay_ms = delay.as_millis() as u64,
            error = %last_error,
            "Service not ready yet"
        );
        sleep(delay).await;
        interval = policy.next_interval(interval);
    }
}

#[cfg(test)]
#[path = "readiness_tests.rs"]
mod tests;
