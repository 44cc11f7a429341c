//! Container-backed integration scenarios.
//!
//! This library defines the service containers (fake GCS server, MongoDB
//! and its seeder), the fixtures they are expected to hold, the scenario
//! executors that exercise the storage and document clients against them,
//! and the runner the `integration_tests` binary drives.

pub mod config;
pub mod fixtures;
pub mod scenarios;
pub mod services;
pub mod test_runner;
pub mod verification;

// Re-export commonly used types for convenience
pub use config::HarnessConfig;
pub use scenarios::{
    exercise_storage, lookup_restaurant, run_object_storage, run_restaurant_lookup,
    RestaurantOutcome, StorageOutcome,
};
pub use test_runner::{IntegrationTestRunner, TestDetails, TestResult, TestScenario};
pub use verification::FixtureVerification;

// Re-export test_utils functions
pub use test_utils::{generate_resource_name, get_workflow_context};
