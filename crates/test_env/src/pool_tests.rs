use super::*;
use crate::environment::ScenarioPhase;
use crate::fake::FakeRuntime;

#[test]
fn test_run_id_uses_resource_prefix() {
    let config = EnvironmentConfig {
        resource_prefix: "ci".to_string(),
        ..EnvironmentConfig::default()
    };
    let pool = ContainerPool::with_runtime(Arc::new(FakeRuntime::new()), config);

    assert!(pool.run_id().starts_with("ci-"));
    assert!(pool.run_id().contains("-run-"));
}

#[test]
fn test_environments_start_in_init_with_sanitized_scenario() {
    let pool = ContainerPool::with_runtime(Arc::new(FakeRuntime::new()), EnvironmentConfig::default());

    let env = pool.environment("Object Storage");

    assert_eq!(env.scenario(), "object-storage");
    assert_eq!(env.run_id(), pool.run_id());
    assert_eq!(env.phase(), ScenarioPhase::Init);
}

#[tokio::test]
async fn test_pools_have_distinct_run_ids() {
    let runtime = Arc::new(FakeRuntime::new());
    let first = ContainerPool::with_runtime(runtime.clone(), EnvironmentConfig::default());
    let second = ContainerPool::with_runtime(runtime, EnvironmentConfig::default());

    assert_ne!(first.run_id(), second.run_id());
}
