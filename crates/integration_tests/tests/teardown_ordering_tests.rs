//! Lifecycle of the service containers against an in-memory runtime.
//!
//! These tests use the real container definitions with a fake runtime, so
//! they check acquisition and release order without a Docker daemon.

use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use integration_tests::services::{
    fake_gcs_spec, mongodb_spec, seeder_spec, GCS_PORT, MONGO_PORT,
};
use integration_tests::HarnessConfig;
use test_env::fake::{DisconnectBehavior, FakeClient, FakeRuntime, OperationLog};
use test_env::{
    init_test_logging, ContainerPool, EnvironmentConfig, ReleaseKind, ReleaseOutcome,
    ScenarioPhase, TestEnvError, TestEnvironment,
};

fn pool_on(runtime: &FakeRuntime) -> ContainerPool {
    let config = EnvironmentConfig {
        max_wait: Duration::from_secs(1),
        initial_interval: Duration::from_millis(10),
        disconnect_timeout: Duration::from_millis(100),
        ..EnvironmentConfig::default()
    };
    ContainerPool::with_runtime(Arc::new(runtime.clone()), config)
}

/// Provision the restaurant lookup services the way the scenario does.
async fn provision_database_stack(
    env: &mut TestEnvironment,
    log: &OperationLog,
    disconnect: DisconnectBehavior,
) -> Result<(), TestEnvError> {
    let config = HarnessConfig::default();

    let network = env.create_network("mongo").await?;
    let mongo = env.provision(mongodb_spec(&config, &network.name)).await?;
    let published = &mongo;
    env.await_ready("mongodb", &mongo, move || async move {
        published.host_port(MONGO_PORT).map(|_| ())
    })
    .await?;
    env.register_client(
        Arc::new(FakeClient::new("mongodb", log.clone()).with_behavior(disconnect)),
        &mongo,
    )?;

    let seeder = env.provision(seeder_spec(&config, &network.name)).await?;
    env.await_ready("mongoseeder", &seeder, || async { Ok::<_, String>(()) })
        .await?;
    env.begin_execution()
}

fn position_of(log: &OperationLog, operation: &str, fragment: &str) -> usize {
    log.entries()
        .iter()
        .position(|entry| entry.starts_with(operation) && entry.contains(fragment))
        .unwrap_or_else(|| panic!("no {} entry for {}: {:?}", operation, fragment, log.entries()))
}

#[tokio::test]
async fn test_database_stack_releases_in_reverse_order() {
    init_test_logging();
    let runtime = FakeRuntime::new();
    let log = runtime.log();
    let env = pool_on(&runtime).environment("restaurant-lookup");

    let client_log = log.clone();
    env.run(move |env| {
        async move { provision_database_stack(env, &client_log, DisconnectBehavior::Succeed).await }
            .boxed()
    })
    .await
    .unwrap();

    let disconnect = position_of(&log, "disconnect:", "mongodb");
    let purge_seeder = position_of(&log, "purge:", "restaurant-lookup-mongoseeder");
    let purge_mongo = position_of(&log, "purge:", "restaurant-lookup-mongodb");
    let remove_network = position_of(&log, "remove_network:", "restaurant-lookup-mongo");

    assert!(disconnect < purge_seeder);
    assert!(purge_seeder < purge_mongo);
    assert!(purge_mongo < remove_network);
    assert!(runtime.container_names().is_empty());
    assert!(runtime.network_names().is_empty());
}

#[tokio::test]
async fn test_database_stack_is_released_when_scenario_fails() {
    let runtime = FakeRuntime::new();
    let log = runtime.log();
    let env = pool_on(&runtime).environment("restaurant-lookup");

    let client_log = log.clone();
    let result: Result<(), TestEnvError> = env
        .run(move |env| {
            async move {
                provision_database_stack(env, &client_log, DisconnectBehavior::Succeed).await?;
                Err(TestEnvError::operation("find restaurant", "no document"))
            }
            .boxed()
        })
        .await;

    assert!(matches!(result, Err(TestEnvError::OperationFailed { .. })));
    assert_eq!(log.with_prefix("disconnect:").len(), 1);
    assert_eq!(log.with_prefix("purge:").len(), 2);
    assert_eq!(log.with_prefix("remove_network:").len(), 1);
    assert!(runtime.container_names().is_empty());
    assert!(runtime.network_names().is_empty());
}

#[tokio::test]
async fn test_seeder_build_failure_still_releases_database() {
    let runtime = FakeRuntime::new();
    runtime.fail_image("tenv-mongoseeder:latest");
    let log = runtime.log();
    let env = pool_on(&runtime).environment("restaurant-lookup");

    let client_log = log.clone();
    let result = env
        .run(move |env| {
            async move { provision_database_stack(env, &client_log, DisconnectBehavior::Succeed).await }
                .boxed()
        })
        .await;

    assert!(matches!(result, Err(TestEnvError::ImageBuildFailed { .. })));
    assert_eq!(log.with_prefix("purge:").len(), 1);
    assert!(position_of(&log, "disconnect:", "mongodb") < position_of(&log, "purge:", "mongodb"));
    assert!(runtime.container_names().is_empty());
    assert!(runtime.network_names().is_empty());
}

#[tokio::test]
async fn test_stuck_seeder_keeps_network_and_is_not_escalated() {
    let runtime = FakeRuntime::new();
    runtime.fail_purge_of("mongoseeder");
    let log = runtime.log();
    let mut env = pool_on(&runtime).environment("restaurant-lookup");

    provision_database_stack(&mut env, &log, DisconnectBehavior::Succeed)
        .await
        .unwrap();
    let report = env.teardown().await.unwrap();

    assert!(!report.is_clean());
    assert!(report.escalated().is_none());
    let network = report
        .records
        .iter()
        .find(|r| r.kind == ReleaseKind::Network)
        .unwrap();
    assert!(matches!(network.outcome, ReleaseOutcome::Failed(_)));
    assert!(log.with_prefix("remove_network:").is_empty());
    assert_eq!(runtime.network_names().len(), 1);
    assert_eq!(env.phase(), ScenarioPhase::Done);
}

#[tokio::test]
async fn test_hanging_disconnect_is_escalated_after_containers_are_gone() {
    let runtime = FakeRuntime::new();
    let log = runtime.log();
    let env = pool_on(&runtime).environment("restaurant-lookup");

    let client_log = log.clone();
    let result = env
        .run(move |env| {
            async move { provision_database_stack(env, &client_log, DisconnectBehavior::Hang).await }
                .boxed()
        })
        .await;

    assert!(matches!(result, Err(TestEnvError::DisconnectFailed { .. })));
    assert!(runtime.container_names().is_empty());
    assert!(runtime.network_names().is_empty());
}

#[tokio::test]
async fn test_storage_container_publishes_emulator_port() {
    let runtime = FakeRuntime::new();
    let mut env = pool_on(&runtime).environment("object-storage");

    let gcs = env
        .provision(fake_gcs_spec(&HarnessConfig::default()))
        .await
        .unwrap();

    assert!(gcs.host_endpoint(GCS_PORT).unwrap().starts_with("127.0.0.1:"));
    assert!(gcs.name.contains("object-storage-gcs"));
    assert!(gcs.network.is_none());

    env.teardown().await.unwrap();
    assert!(runtime.container_names().is_empty());
}
