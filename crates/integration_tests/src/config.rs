//! Images and fixture locations used by the scenarios.

use std::env;
use std::path::PathBuf;

use test_utils::workspace_path;

/// Default location of the object storage seed data, relative to the workspace root.
pub const DEFAULT_GCS_DATA_DIR: &str = "crates/integration_tests/testdata/gcs";

/// Default seeder build context, relative to the workspace root.
pub const DEFAULT_SEEDER_CONTEXT: &str = "crates/integration_tests/seeder";

/// Per-run settings for the service containers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    /// Object storage emulator image
    pub gcs_image: String,
    pub gcs_tag: String,

    /// Document database image
    pub mongo_image: String,
    pub mongo_tag: String,

    /// Directory mounted into the emulator as its initial bucket contents
    pub gcs_data_dir: PathBuf,

    /// Directory holding the seeder's Dockerfile and data
    pub seeder_context: PathBuf,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            gcs_image: "fsouza/fake-gcs-server".to_string(),
            gcs_tag: "latest".to_string(),
            mongo_image: "mongo".to_string(),
            mongo_tag: "latest".to_string(),
            gcs_data_dir: workspace_path(DEFAULT_GCS_DATA_DIR),
            seeder_context: workspace_path(DEFAULT_SEEDER_CONTEXT),
        }
    }
}

impl HarnessConfig {
    /// Load configuration from environment variables.
    ///
    /// Optional environment variables:
    /// - `TEST_GCS_IMAGE` / `TEST_GCS_TAG`: emulator image (default: fsouza/fake-gcs-server:latest)
    /// - `TEST_MONGO_IMAGE` / `TEST_MONGO_TAG`: database image (default: mongo:latest)
    /// - `TEST_GCS_DATA_DIR`: seed data directory, relative paths resolve against the workspace root
    /// - `TEST_SEEDER_CONTEXT`: seeder build context, resolved the same way
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            gcs_image: env::var("TEST_GCS_IMAGE").unwrap_or(defaults.gcs_image),
            gcs_tag: env::var("TEST_GCS_TAG").unwrap_or(defaults.gcs_tag),
            mongo_image: env::var("TEST_MONGO_IMAGE").unwrap_or(defaults.mongo_image),
            mongo_tag: env::var("TEST_MONGO_TAG").unwrap_or(defaults.mongo_tag),
            gcs_data_dir: env::var("TEST_GCS_DATA_DIR")
                .map(workspace_path)
                .unwrap_or(defaults.gcs_data_dir),
            seeder_context: env::var("TEST_SEEDER_CONTEXT")
                .map(workspace_path)
                .unwrap_or(defaults.seeder_context),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
