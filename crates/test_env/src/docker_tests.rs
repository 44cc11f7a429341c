use super::*;
use std::io::Read;

fn binding(host_port: Option<&str>) -> PortBinding {
    PortBinding {
        host_ip: Some(LOOPBACK.to_string()),
        host_port: host_port.map(str::to_string),
    }
}

#[test]
fn test_resolve_host_ports_reads_tcp_bindings() {
    let port_map = HashMap::from([
        ("27017/tcp".to_string(), Some(vec![binding(Some("49153"))])),
        ("4443/tcp".to_string(), Some(vec![binding(Some("0")), binding(Some("50001"))])),
    ]);

    let ports = resolve_host_ports(&port_map);

    assert_eq!(ports.get(&27017), Some(&49153));
    assert_eq!(ports.get(&4443), Some(&50001));
}

#[test]
fn test_resolve_host_ports_skips_unbound_and_udp() {
    let port_map = HashMap::from([
        ("27017/tcp".to_string(), None),
        ("53/udp".to_string(), Some(vec![binding(Some("5353"))])),
        ("8080/tcp".to_string(), Some(vec![binding(None)])),
    ]);

    assert!(resolve_host_ports(&port_map).is_empty());
}

#[test]
fn test_restart_policy_mapping() {
    let never = docker_restart_policy(RestartPolicy::Never);
    assert_eq!(never.name, Some(RestartPolicyNameEnum::NO));
    assert_eq!(never.maximum_retry_count, None);

    let on_failure = docker_restart_policy(RestartPolicy::OnFailure { max_retries: 5 });
    assert_eq!(on_failure.name, Some(RestartPolicyNameEnum::ON_FAILURE));
    assert_eq!(on_failure.maximum_retry_count, Some(5));

    assert_eq!(
        docker_restart_policy(RestartPolicy::UnlessStopped).name,
        Some(RestartPolicyNameEnum::UNLESS_STOPPED)
    );
}

#[test]
fn test_label_filters_scope_to_run() {
    let all = label_filters(None);
    assert_eq!(all["label"], vec!["test_env.managed=true".to_string()]);

    let run = label_filters(Some("run-42"));
    assert_eq!(
        run["label"],
        vec![
            "test_env.managed=true".to_string(),
            "test_env.run=run-42".to_string()
        ]
    );
}

#[tokio::test]
async fn test_archive_build_context_contains_files() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("Dockerfile"), "FROM mongo\n").unwrap();
    std::fs::write(dir.path().join("restaurants.json"), "[]").unwrap();

    let archived = archive_build_context(dir.path().to_path_buf()).await.unwrap();

    let mut archive = tar::Archive::new(archived.as_ref());
    let mut dockerfile = None;
    let mut names = Vec::new();
    for entry in archive.entries().unwrap() {
        let mut entry = entry.unwrap();
        let path = entry.path().unwrap().to_string_lossy().to_string();
        if path.ends_with("Dockerfile") {
            let mut content = String::new();
            entry.read_to_string(&mut content).unwrap();
            dockerfile = Some(content);
        }
        names.push(path);
    }

    assert!(names.iter().any(|n| n.ends_with("restaurants.json")));
    assert_eq!(dockerfile.as_deref(), Some("FROM mongo\n"));
}

#[tokio::test]
async fn test_archive_build_context_missing_directory() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("does-not-exist");

    let err = archive_build_context(missing).await.unwrap_err();

    assert!(matches!(err, TestEnvError::ImageBuildFailed { .. }));
}

mod purge {
    use super::*;
    use wiremock::matchers::{method, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn runtime_for(server: &MockServer) -> DockerRuntime {
        let docker =
            Docker::connect_with_http(&server.uri(), 5, bollard::API_DEFAULT_VERSION).unwrap();
        DockerRuntime {
            docker,
            stop_timeout: Duration::from_secs(1),
        }
    }

    async fn mount_stop(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path_regex(r"/containers/abc/stop$"))
            .respond_with(ResponseTemplate::new(204))
            .mount(server)
            .await;
    }

    fn error_body(status: u16, message: &str) -> ResponseTemplate {
        ResponseTemplate::new(status)
            .set_body_raw(format!(r#"{{"message":"{}"}}"#, message), "application/json")
    }

    #[tokio::test]
    async fn test_purge_tolerates_daemon_side_auto_removal() {
        let server = MockServer::start().await;
        mount_stop(&server).await;
        Mock::given(method("DELETE"))
            .and(path_regex(r"/containers/abc$"))
            .respond_with(error_body(409, "removal of container abc is already in progress"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path_regex(r"/containers/abc/json$"))
            .respond_with(error_body(404, "No such container: abc"))
            .expect(1..)
            .mount(&server)
            .await;

        let result = runtime_for(&server)
            .purge_container(&ContainerHandle::detached("abc", "tenv-mongodb"))
            .await;

        assert!(result.is_ok(), "{:?}", result);
    }

    #[tokio::test]
    async fn test_purge_treats_missing_container_as_removed() {
        let server = MockServer::start().await;
        mount_stop(&server).await;
        Mock::given(method("DELETE"))
            .and(path_regex(r"/containers/abc$"))
            .respond_with(error_body(404, "No such container: abc"))
            .mount(&server)
            .await;

        let result = runtime_for(&server)
            .purge_container(&ContainerHandle::detached("abc", "tenv-mongodb"))
            .await;

        assert!(result.is_ok(), "{:?}", result);
    }

    #[tokio::test]
    async fn test_purge_reports_other_conflicts() {
        let server = MockServer::start().await;
        mount_stop(&server).await;
        Mock::given(method("DELETE"))
            .and(path_regex(r"/containers/abc$"))
            .respond_with(error_body(409, "container abc is paused"))
            .mount(&server)
            .await;

        let result = runtime_for(&server)
            .purge_container(&ContainerHandle::detached("abc", "tenv-mongodb"))
            .await;

        assert!(matches!(
            result,
            Err(TestEnvError::ContainerRemovalFailed { ref container, .. }) if container == "tenv-mongodb"
        ));
    }
}
