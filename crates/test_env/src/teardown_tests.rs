use super::*;
use crate::fake::{DisconnectBehavior, FakeClient, FakeRuntime};
use crate::spec::{ContainerSpec, NetworkSpec};

async fn start(runtime: &FakeRuntime, name: &str, network: Option<&str>) -> ContainerHandle {
    let mut spec = ContainerSpec::from_registry(name, "mongo", "latest").with_exposed_port(27017);
    if let Some(network) = network {
        spec = spec.on_network(network, Vec::<String>::new());
    }
    let image = runtime.ensure_image(&spec.image).await.unwrap();
    runtime.start_container(&spec, &image).await.unwrap()
}

async fn network(runtime: &FakeRuntime, name: &str) -> NetworkHandle {
    runtime.create_network(&NetworkSpec::new(name)).await.unwrap()
}

#[tokio::test]
async fn test_unwind_releases_clients_first_then_lifo() {
    let runtime = FakeRuntime::new();
    let log = runtime.log();
    let mut stack = ReleaseStack::new();

    let net = network(&runtime, "mongo_network").await;
    stack.push_network(net);
    let db = start(&runtime, "mongodb", Some("mongo_network")).await;
    stack.push_container(db.clone());
    let seeder = start(&runtime, "seeder", Some("mongo_network")).await;
    stack.push_container(seeder);
    stack
        .push_client(Arc::new(FakeClient::new("mongo-client", log.clone())), &db)
        .unwrap();

    let report = stack.unwind(&runtime, Duration::from_secs(1)).await;

    assert!(report.is_clean());
    assert_eq!(
        report.released_names(),
        vec!["mongo-client", "seeder", "mongodb", "mongo_network"]
    );
    assert_eq!(
        log.entries()[log.position("disconnect:").unwrap()..],
        [
            "disconnect:mongo-client",
            "purge:seeder",
            "purge:mongodb",
            "remove_network:mongo_network"
        ]
    );
    assert!(stack.is_empty());
    assert!(runtime.container_names().is_empty());
    assert!(runtime.network_names().is_empty());
}

#[tokio::test]
async fn test_unwind_disconnects_clients_most_recent_first() {
    let runtime = FakeRuntime::new();
    let log = runtime.log();
    let mut stack = ReleaseStack::new();

    let gcs = start(&runtime, "gcs", None).await;
    stack.push_container(gcs.clone());
    stack
        .push_client(Arc::new(FakeClient::new("first", log.clone())), &gcs)
        .unwrap();
    stack
        .push_client(Arc::new(FakeClient::new("second", log.clone())), &gcs)
        .unwrap();

    stack.unwind(&runtime, Duration::from_secs(1)).await;

    assert_eq!(
        log.with_prefix("disconnect:"),
        vec!["disconnect:second", "disconnect:first"]
    );
}

#[tokio::test]
async fn test_purge_failure_is_recorded_and_network_refused() {
    let runtime = FakeRuntime::new();
    let log = runtime.log();
    runtime.fail_purge_of("seeder");
    let mut stack = ReleaseStack::new();

    stack.push_network(network(&runtime, "mongo_network").await);
    stack.push_container(start(&runtime, "mongodb", Some("mongo_network")).await);
    stack.push_container(start(&runtime, "seeder", Some("mongo_network")).await);

    let report = stack.unwind(&runtime, Duration::from_secs(1)).await;

    // The database is still purged after the seeder failed.
    assert_eq!(report.released_names(), vec!["mongodb"]);
    assert_eq!(report.errors.len(), 2);
    assert!(matches!(
        report.errors[0],
        TestEnvError::ContainerRemovalFailed { .. }
    ));
    assert!(matches!(
        &report.errors[1],
        TestEnvError::NetworkInUse { attached, .. } if attached == &vec!["seeder".to_string()]
    ));
    assert!(log.with_prefix("remove_network:").is_empty());
    assert!(report.escalated().is_none());
    assert!(report.into_result().is_ok());
}

#[tokio::test]
async fn test_network_in_use_by_foreign_container_is_retried_then_recorded() {
    let runtime = FakeRuntime::new();
    let log = runtime.log();
    let mut stack = ReleaseStack::new();

    stack.push_network(network(&runtime, "shared").await);
    stack.push_container(start(&runtime, "gcs", Some("shared")).await);
    runtime.attach_foreign_container("shared", "someone-else");

    let report = stack.unwind(&runtime, Duration::from_secs(1)).await;

    assert_eq!(log.with_prefix("remove_network:").len(), 2);
    assert_eq!(report.released_names(), vec!["gcs"]);
    assert!(matches!(
        report.errors.as_slice(),
        [TestEnvError::NetworkInUse { network, .. }] if network == "shared"
    ));
    assert_eq!(runtime.network_names(), vec!["shared".to_string()]);
}

#[tokio::test]
async fn test_network_removal_failure_is_best_effort() {
    let runtime = FakeRuntime::new();
    runtime.fail_network_removal_of("net");
    let mut stack = ReleaseStack::new();

    stack.push_network(network(&runtime, "net").await);
    stack.push_container(start(&runtime, "gcs", Some("net")).await);

    let report = stack.unwind(&runtime, Duration::from_secs(1)).await;

    assert_eq!(report.released_names(), vec!["gcs"]);
    assert!(matches!(
        report.errors.as_slice(),
        [TestEnvError::NetworkRemovalFailed { .. }]
    ));
    assert!(report.into_result().is_ok());
}

#[tokio::test]
async fn test_disconnect_failure_is_escalated_but_teardown_continues() {
    let runtime = FakeRuntime::new();
    let log = runtime.log();
    let mut stack = ReleaseStack::new();

    let db = start(&runtime, "mongodb", None).await;
    stack.push_container(db.clone());
    let client = FakeClient::new("mongo-client", log.clone()).with_behavior(DisconnectBehavior::Fail);
    stack.push_client(Arc::new(client), &db).unwrap();

    let report = stack.unwind(&runtime, Duration::from_secs(1)).await;

    assert_eq!(report.released_names(), vec!["mongodb"]);
    assert!(report.escalated().is_some());
    let err = report.into_result().unwrap_err();
    assert!(matches!(err, TestEnvError::DisconnectFailed { ref client, .. } if client == "mongo-client"));
}

#[tokio::test(start_paused = true)]
async fn test_hanging_disconnect_times_out_and_is_escalated() {
    let runtime = FakeRuntime::new();
    let log = runtime.log();
    let mut stack = ReleaseStack::new();

    let db = start(&runtime, "mongodb", None).await;
    stack.push_container(db.clone());
    let client = FakeClient::new("stuck", log.clone()).with_behavior(DisconnectBehavior::Hang);
    stack.push_client(Arc::new(client), &db).unwrap();

    let report = stack.unwind(&runtime, Duration::from_secs(2)).await;

    let escalated = report.escalated().unwrap();
    assert!(escalated.to_string().contains("timed out"));
    assert_eq!(log.with_prefix("purge:"), vec!["purge:mongodb"]);
}

#[tokio::test]
async fn test_client_for_unknown_container_is_rejected() {
    let runtime = FakeRuntime::new();
    let mut stack = ReleaseStack::new();
    let stranger = ContainerHandle::detached("nope", "not-ours");

    let err = stack
        .push_client(Arc::new(FakeClient::new("c", runtime.log())), &stranger)
        .unwrap_err();

    assert!(matches!(err, TestEnvError::OperationFailed { .. }));
    assert!(stack.is_empty());
}

#[tokio::test]
async fn test_second_unwind_releases_nothing() {
    let runtime = FakeRuntime::new();
    let log = runtime.log();
    let mut stack = ReleaseStack::new();
    stack.push_container(start(&runtime, "gcs", None).await);

    stack.unwind(&runtime, Duration::from_secs(1)).await;
    let second = stack.unwind(&runtime, Duration::from_secs(1)).await;

    assert!(second.records.is_empty());
    assert_eq!(log.with_prefix("purge:").len(), 1);
}
