//! Tests for harness configuration.

use super::*;
use serial_test::serial;

const VARS: &[&str] = &[
    "TEST_GCS_IMAGE",
    "TEST_GCS_TAG",
    "TEST_MONGO_IMAGE",
    "TEST_MONGO_TAG",
    "TEST_GCS_DATA_DIR",
    "TEST_SEEDER_CONTEXT",
];

fn clear_vars() {
    for var in VARS {
        unsafe {
            std::env::remove_var(var);
        }
    }
}

#[test]
#[serial]
fn test_from_env_uses_defaults() {
    clear_vars();

    let config = HarnessConfig::from_env();

    assert_eq!(config, HarnessConfig::default());
    assert_eq!(config.gcs_image, "fsouza/fake-gcs-server");
    assert_eq!(config.mongo_tag, "latest");
    assert!(config.gcs_data_dir.ends_with("crates/integration_tests/testdata/gcs"));
    assert!(config.seeder_context.ends_with("crates/integration_tests/seeder"));
}

#[test]
#[serial]
fn test_from_env_reads_overrides() {
    clear_vars();
    let data_dir = std::env::temp_dir().join("gcs-seed");
    unsafe {
        std::env::set_var("TEST_MONGO_TAG", "7.0");
        std::env::set_var("TEST_GCS_DATA_DIR", &data_dir);
        std::env::set_var("TEST_SEEDER_CONTEXT", "fixtures/seeder");
    }

    let config = HarnessConfig::from_env();
    clear_vars();

    assert_eq!(config.mongo_image, "mongo");
    assert_eq!(config.mongo_tag, "7.0");
    assert_eq!(config.gcs_data_dir, data_dir);
    assert_eq!(
        config.seeder_context,
        test_utils::workspace_root().join("fixtures/seeder")
    );
}

#[test]
fn test_default_fixture_directories_exist() {
    let config = HarnessConfig::default();

    assert!(config.gcs_data_dir.join("sample-bucket").is_dir());
    assert!(config.seeder_context.join("Dockerfile").is_file());
}
