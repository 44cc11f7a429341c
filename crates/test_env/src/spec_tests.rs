//! Tests for container specifications.

use super::*;

#[test]
fn test_registry_image_reference() {
    let spec = ContainerSpec::from_registry("mongodb", "mongo", "7.0");
    assert_eq!(spec.image.reference(), "mongo:7.0");
    assert_eq!(spec.restart_policy, RestartPolicy::Never);
    assert!(!spec.auto_remove);
}

#[test]
fn test_build_image_reference_is_tag() {
    let spec = ContainerSpec::from_build("mongoseeder", "seeder", "Dockerfile", "mongoseeder:test");
    assert_eq!(spec.image.reference(), "mongoseeder:test");
    match spec.image {
        ImageSource::Build {
            context_dir,
            dockerfile,
            ..
        } => {
            assert_eq!(context_dir, PathBuf::from("seeder"));
            assert_eq!(dockerfile, "Dockerfile");
        }
        other => panic!("Expected Build image, got {:?}", other),
    }
}

#[test]
fn test_env_list_formats_pairs() {
    let spec = ContainerSpec::from_registry("mongodb", "mongo", "latest")
        .with_env("MONGO_INITDB_ROOT_USERNAME", "mongoadmin")
        .with_env("MONGO_INITDB_DATABASE", "test_db");

    assert_eq!(
        spec.env_list(),
        vec![
            "MONGO_INITDB_ROOT_USERNAME=mongoadmin".to_string(),
            "MONGO_INITDB_DATABASE=test_db".to_string(),
        ]
    );
}

#[test]
fn test_exposed_ports_are_deduplicated() {
    let spec = ContainerSpec::from_registry("gcs", "fsouza/fake-gcs-server", "latest")
        .with_exposed_port(4443)
        .with_exposed_port(4443);
    assert_eq!(spec.exposed_ports, vec![4443]);
}

#[test]
fn test_on_network_registers_logical_name_as_alias() {
    let spec = ContainerSpec::from_registry("mongodb", "mongo", "latest")
        .on_network("tenv-local-mongo-net", ["db", "mongodb"]);

    let attachment = spec.network.unwrap();
    assert_eq!(attachment.network, "tenv-local-mongo-net");
    assert_eq!(attachment.aliases, vec!["mongodb".to_string(), "db".to_string()]);
}

#[test]
fn test_network_spec_labels() {
    let spec = NetworkSpec::new("mongo_network").with_label(LABEL_MANAGED, "true");
    assert_eq!(spec.labels.get(LABEL_MANAGED).map(String::as_str), Some("true"));
}
