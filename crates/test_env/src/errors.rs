//! Test environment error types.
//!
//! Every failure the orchestrator can report falls into one of four
//! categories, see [`ErrorCategory`]. The category decides whether the
//! scenario aborts, retries, fails an assertion or merely logs.

use std::time::Duration;
use thiserror::Error;

use crate::environment::ScenarioPhase;

/// Broad classification of [`TestEnvError`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Container runtime, image or network problems. Fatal, never retried.
    Infrastructure,
    /// The service did not become ready within the retry budget.
    Readiness,
    /// A client call against a ready service failed.
    Operation,
    /// Resource release failed during teardown.
    Teardown,
}

/// Errors raised while provisioning, probing, exercising or tearing down
/// a scenario's containers.
#[derive(Error, Debug)]
pub enum TestEnvError {
    #[error("Container runtime unavailable: {reason}")]
    RuntimeUnavailable { reason: String },

    #[error("Image '{image}' could not be obtained: {reason}")]
    ImageUnavailable { image: String, reason: String },

    #[error("Image build from '{context}' failed: {reason}")]
    ImageBuildFailed { context: String, reason: String },

    #[error("Failed to create network '{network}': {reason}")]
    NetworkCreationFailed { network: String, reason: String },

    #[error("Failed to start container '{container}': {reason}")]
    ContainerStartFailed { container: String, reason: String },

    #[error("Container '{container}' has no host binding for port {port}")]
    PortNotMapped { container: String, port: u16 },

    #[error("Service '{service}' not ready after {attempts} attempt(s) in {elapsed:?}: {last_error}")]
    NotReady {
        service: String,
        attempts: u32,
        elapsed: Duration,
        last_error: String,
    },

    #[error("Operation '{operation}' failed: {reason}")]
    OperationFailed { operation: String, reason: String },

    #[error("Failed to purge container '{container}': {reason}")]
    ContainerRemovalFailed { container: String, reason: String },

    #[error("Network '{network}' still has attached containers: {attached:?}")]
    NetworkInUse {
        network: String,
        attached: Vec<String>,
    },

    #[error("Failed to remove network '{network}': {reason}")]
    NetworkRemovalFailed { network: String, reason: String },

    #[error("Failed to disconnect client '{client}': {reason}")]
    DisconnectFailed { client: String, reason: String },

    #[error("Invalid scenario transition from {from:?} to {to:?}")]
    InvalidTransition {
        from: ScenarioPhase,
        to: ScenarioPhase,
    },

    #[error("Invalid configuration: {key} - {reason}")]
    Config { key: String, reason: String },
}

impl TestEnvError {
    /// Category of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            TestEnvError::RuntimeUnavailable { .. }
            | TestEnvError::ImageUnavailable { .. }
            | TestEnvError::ImageBuildFailed { .. }
            | TestEnvError::NetworkCreationFailed { .. }
            | TestEnvError::ContainerStartFailed { .. }
            | TestEnvError::PortNotMapped { .. }
            | TestEnvError::InvalidTransition { .. }
            | TestEnvError::Config { .. } => ErrorCategory::Infrastructure,
            TestEnvError::NotReady { .. } => ErrorCategory::Readiness,
            TestEnvError::OperationFailed { .. } => ErrorCategory::Operation,
            TestEnvError::ContainerRemovalFailed { .. }
            | TestEnvError::NetworkInUse { .. }
            | TestEnvError::NetworkRemovalFailed { .. }
            | TestEnvError::DisconnectFailed { .. } => ErrorCategory::Teardown,
        }
    }

    /// Whether a teardown error must be escalated instead of logged.
    ///
    /// A lingering client connection can corrupt the next scenario run, so
    /// disconnect failures are the only escalated teardown errors.
    pub fn is_escalated(&self) -> bool {
        matches!(self, TestEnvError::DisconnectFailed { .. })
    }

    /// Wrap any displayable client error as an operation failure.
    pub fn operation(operation: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        TestEnvError::OperationFailed {
            operation: operation.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result type alias for test environment operations.
pub type TestEnvResult<T> = Result<T, TestEnvError>;

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;
