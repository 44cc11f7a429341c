//! Container definitions for the services the scenarios run against.

use std::time::Duration;

use anyhow::{Context, Result};
use document_client::MongoUri;
use test_env::{ContainerHandle, ContainerSpec, RestartPolicy, LOOPBACK};

use crate::config::HarnessConfig;

/// Logical name of the object storage emulator.
pub const GCS_SERVICE: &str = "gcs";

/// Port the emulator listens on inside its container.
pub const GCS_PORT: u16 = 4443;

/// Authority the emulator puts into the URLs it hands out.
pub const GCS_VIRTUAL_HOST: &str = "gcs:4443";

/// Where the emulator looks for its initial buckets.
pub const GCS_DATA_MOUNT: &str = "/data";

/// Logical name of the database; the seeder reaches it under this alias.
pub const MONGO_SERVICE: &str = "mongodb";

pub const MONGO_PORT: u16 = 27017;
pub const MONGO_USERNAME: &str = "mongoadmin";
pub const MONGO_PASSWORD: &str = "secret";
pub const MONGO_DATABASE: &str = "test_db";
pub const MONGO_AUTH_SOURCE: &str = "admin";

/// Logical name of the data seeding helper.
pub const SEEDER_SERVICE: &str = "mongoseeder";

/// Tag of the image built from the seeder context.
pub const SEEDER_IMAGE: &str = "tenv-mongoseeder:latest";

/// How often Docker restarts the seeder while the database still refuses it.
pub const SEEDER_MAX_RESTARTS: u32 = 5;

/// Fake GCS server holding the mounted seed data in memory.
pub fn fake_gcs_spec(config: &HarnessConfig) -> ContainerSpec {
    let port = GCS_PORT.to_string();
    let external_url = format!("http://{}", GCS_VIRTUAL_HOST);

    ContainerSpec::from_registry(GCS_SERVICE, &config.gcs_image, &config.gcs_tag)
        .with_cmd([
            "-backend",
            "memory",
            "-scheme",
            "http",
            "-port",
            port.as_str(),
            "-public-host",
            GCS_VIRTUAL_HOST,
            "-external-url",
            external_url.as_str(),
        ])
        .with_exposed_port(GCS_PORT)
        .with_bind_mount(config.gcs_data_dir.clone(), GCS_DATA_MOUNT)
        .with_restart_policy(RestartPolicy::Never)
        .with_auto_remove(true)
}

/// MongoDB with a root user, attached to `network`.
pub fn mongodb_spec(config: &HarnessConfig, network: &str) -> ContainerSpec {
    ContainerSpec::from_registry(MONGO_SERVICE, &config.mongo_image, &config.mongo_tag)
        .with_env("MONGO_INITDB_ROOT_USERNAME", MONGO_USERNAME)
        .with_env("MONGO_INITDB_ROOT_PASSWORD", MONGO_PASSWORD)
        .with_env("MONGO_INITDB_DATABASE", MONGO_DATABASE)
        .with_exposed_port(MONGO_PORT)
        .with_restart_policy(RestartPolicy::Never)
        .with_auto_remove(true)
        .on_network(network, Vec::<String>::new())
}

/// One-shot importer built from the seeder context, attached to `network`.
///
/// The importer exits once the data is loaded. It is restarted while the
/// database still rejects it, and kept around afterwards so its output can
/// be inspected until teardown.
pub fn seeder_spec(config: &HarnessConfig, network: &str) -> ContainerSpec {
    ContainerSpec::from_build(
        SEEDER_SERVICE,
        config.seeder_context.clone(),
        "Dockerfile",
        SEEDER_IMAGE,
    )
    .with_restart_policy(RestartPolicy::OnFailure {
        max_retries: SEEDER_MAX_RESTARTS,
    })
    .on_network(network, Vec::<String>::new())
}

/// Base URL of the emulator as reachable from the host.
pub fn storage_base_url(gcs: &ContainerHandle) -> Result<String> {
    let endpoint = gcs
        .host_endpoint(GCS_PORT)
        .context("Object storage port is not published")?;
    Ok(format!("http://{}", endpoint))
}

/// Credentialed connection string for the database container.
///
/// Server selection is bounded by `selection_timeout` so a single readiness
/// probe cannot outlast it.
pub fn mongo_uri(mongo: &ContainerHandle, selection_timeout: Duration) -> Result<String> {
    let port = mongo
        .host_port(MONGO_PORT)
        .context("Database port is not published")?;

    MongoUri::new(LOOPBACK, port)
        .with_credentials(MONGO_USERNAME, MONGO_PASSWORD)
        .with_database(MONGO_DATABASE)
        .with_auth_source(MONGO_AUTH_SOURCE)
        .with_server_selection_timeout(selection_timeout)
        .build()
        .context("Failed to build database connection string")
}

#[cfg(test)]
#[path = "services_tests.rs"]
mod tests;
