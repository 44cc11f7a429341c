//! Tests for environment configuration.

use super::*;
use serial_test::serial;

const VARS: [&str; 6] = [
    "TEST_ENV_MAX_WAIT_SECS",
    "TEST_ENV_RETRY_INITIAL_MS",
    "TEST_ENV_RETRY_MAX_INTERVAL_SECS",
    "TEST_ENV_DISCONNECT_TIMEOUT_SECS",
    "TEST_ENV_STOP_TIMEOUT_SECS",
    "TEST_ENV_RESOURCE_PREFIX",
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

    let config = EnvironmentConfig::from_env().unwrap();

    assert_eq!(config, EnvironmentConfig::default());
    assert_eq!(config.max_wait, Duration::from_secs(60));
    assert_eq!(config.resource_prefix, "tenv");
}

#[test]
#[serial]
fn test_from_env_reads_overrides() {
    clear_vars();
    unsafe {
        std::env::set_var("TEST_ENV_MAX_WAIT_SECS", "15");
        std::env::set_var("TEST_ENV_RETRY_INITIAL_MS", "100");
        std::env::set_var("TEST_ENV_DISCONNECT_TIMEOUT_SECS", "2");
        std::env::set_var("TEST_ENV_RESOURCE_PREFIX", "CI Harness");
    }

    let config = EnvironmentConfig::from_env().unwrap();

    assert_eq!(config.max_wait, Duration::from_secs(15));
    assert_eq!(config.initial_interval, Duration::from_millis(100));
    assert_eq!(config.disconnect_timeout, Duration::from_secs(2));
    assert_eq!(config.resource_prefix, "ci-harness");
    clear_vars();
}

#[test]
#[serial]
fn test_from_env_rejects_invalid_numbers() {
    clear_vars();
    unsafe {
        std::env::set_var("TEST_ENV_MAX_WAIT_SECS", "soon");
    }

    let error = EnvironmentConfig::from_env().unwrap_err();

    match error {
        TestEnvError::Config { key, reason } => {
            assert_eq!(key, "TEST_ENV_MAX_WAIT_SECS");
            assert!(reason.contains("soon"));
        }
        other => panic!("Expected Config error, got {:?}", other),
    }
    clear_vars();
}

#[test]
#[serial]
fn test_from_env_rejects_zero_wait() {
    clear_vars();
    unsafe {
        std::env::set_var("TEST_ENV_MAX_WAIT_SECS", "0");
    }

    assert!(matches!(
        EnvironmentConfig::from_env(),
        Err(TestEnvError::Config { .. })
    ));
    clear_vars();
}

#[test]
fn test_backoff_policy_follows_config() {
    let config = EnvironmentConfig {
        max_wait: Duration::from_secs(5),
        initial_interval: Duration::from_millis(50),
        max_interval: Duration::from_secs(1),
        ..EnvironmentConfig::default()
    };

    let policy = config.backoff_policy();

    assert_eq!(policy.max_elapsed, Duration::from_secs(5));
    assert_eq!(policy.initial_interval, Duration::from_millis(50));
    assert_eq!(policy.max_interval, Duration::from_secs(1));
}
