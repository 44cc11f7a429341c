//! Scenario executors: provision the services, wait for them, exercise the
//! clients and compare what they return with the fixtures.
//!
//! Every executor runs inside [`TestEnvironment::run`], so containers,
//! networks and clients are released whether the scenario passes or not.
//!
//! [`TestEnvironment::run`]: test_env::TestEnvironment::run

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use document_client::{DocumentClient, Restaurant};
use futures_util::FutureExt;
use storage_client::{ObjectAttributes, StorageClient};
use test_env::ContainerPool;
use tracing::{debug, info};

use crate::config::HarnessConfig;
use crate::fixtures::restaurants::{regina_caterers, RESTAURANT_ID};
use crate::fixtures::storage::{
    new_object_chunks, new_object_content, NEW_OBJECT, NEW_OBJECT_CONTENT_TYPE,
    NEW_OBJECT_METADATA, SAMPLE_BUCKET, SEEDED_CONTENT, SEEDED_OBJECT,
};
use crate::services::{
    fake_gcs_spec, mongo_uri, mongodb_spec, seeder_spec, storage_base_url, GCS_SERVICE,
    GCS_VIRTUAL_HOST, MONGO_DATABASE, MONGO_SERVICE, SEEDER_SERVICE,
};
use crate::verification::{
    verify_attributes, verify_content, verify_listing, verify_restaurant, FixtureVerification,
};

pub const OBJECT_STORAGE_SCENARIO: &str = "object-storage";
pub const RESTAURANT_LOOKUP_SCENARIO: &str = "restaurant-lookup";

/// Server selection bound for the database client, and so for each probe.
const SERVER_SELECTION_TIMEOUT: Duration = Duration::from_secs(2);

/// What the object storage scenario observed.
#[derive(Debug, Clone)]
pub struct StorageOutcome {
    /// Objects listed in the sample bucket before anything was written
    pub listed: Vec<String>,
    pub seeded_content: Vec<u8>,
    pub written: ObjectAttributes,
    pub read_back: Vec<u8>,
    pub verification: FixtureVerification,
}

/// What the restaurant lookup scenario observed.
#[derive(Debug, Clone)]
pub struct RestaurantOutcome {
    pub restaurant: Restaurant,
    pub verification: FixtureVerification,
}

/// Run the fake GCS server and list, read, write and delete objects.
pub async fn run_object_storage(
    pool: &ContainerPool,
    config: &HarnessConfig,
) -> Result<StorageOutcome> {
    let env = pool.environment(OBJECT_STORAGE_SCENARIO);
    let config = config.clone();

    env.run(move |env| {
        async move {
            let gcs = env.provision(fake_gcs_spec(&config)).await?;

            let base_url = storage_base_url(&gcs)?;
            let client = StorageClient::with_virtual_host(&base_url, GCS_VIRTUAL_HOST)
                .context("Failed to create object storage client")?
                .with_label(GCS_SERVICE);

            let probe_client = &client;
            env.await_ready(GCS_SERVICE, &gcs, move || async move {
                probe_client.list_buckets().await
            })
            .await?;
            env.register_client(Arc::new(client.clone()), &gcs)?;

            env.begin_execution()?;
            exercise_storage(&client).await
        }
        .boxed()
    })
    .await
}

/// The storage round trip against a ready emulator.
pub async fn exercise_storage(client: &StorageClient) -> Result<StorageOutcome> {
    let mut verification = FixtureVerification::success();

    let objects = client
        .list_objects(SAMPLE_BUCKET, None)
        .await
        .context("Failed to list sample bucket")?;
    let listed: Vec<String> = objects.iter().map(|o| o.name.clone()).collect();
    info!(bucket = SAMPLE_BUCKET, objects = ?listed, "Listed objects");
    verification.merge(verify_listing(&objects, &[SEEDED_OBJECT]));

    let seeded_content = client
        .read_object(SAMPLE_BUCKET, SEEDED_OBJECT)
        .await
        .context("Failed to read seeded object")?;
    debug!(
        object = SEEDED_OBJECT,
        content = %String::from_utf8_lossy(&seeded_content),
        "Read seeded object"
    );
    verification.merge(verify_content(
        "seeded content",
        SEEDED_CONTENT,
        &seeded_content,
    ));

    let mut writer = client
        .writer(SAMPLE_BUCKET, NEW_OBJECT)
        .with_content_type(NEW_OBJECT_CONTENT_TYPE);
    for (key, value) in NEW_OBJECT_METADATA {
        writer = writer.with_metadata(*key, *value);
    }
    for chunk in new_object_chunks() {
        writer
            .write_all(&chunk)
            .context("Failed to buffer object chunk")?;
    }
    let written = writer.close().await.context("Failed to upload new object")?;
    info!(object = NEW_OBJECT, size = written.size, "✓ Object created");

    let expected = new_object_content();
    verification.merge(verify_attributes(
        &written,
        expected.len(),
        NEW_OBJECT_CONTENT_TYPE,
        NEW_OBJECT_METADATA,
    ));

    let read_back = client
        .read_object(SAMPLE_BUCKET, NEW_OBJECT)
        .await
        .context("Failed to read new object back")?;
    verification.merge(verify_content("round trip", &expected, &read_back));

    client
        .delete_object(SAMPLE_BUCKET, NEW_OBJECT)
        .await
        .context("Failed to delete new object")?;
    info!(object = NEW_OBJECT, "✓ Object deleted");

    let still_readable = match client.read_object(SAMPLE_BUCKET, NEW_OBJECT).await {
        Ok(content) => Some(format!(
            "object still readable after delete ({} bytes)",
            content.len()
        )),
        Err(e) if e.is_not_found() => None,
        Err(e) => return Err(e).context("Failed to read deleted object"),
    };
    verification.check("deleted", still_readable);

    Ok(StorageOutcome {
        listed,
        seeded_content,
        written,
        read_back,
        verification,
    })
}

/// Run MongoDB plus the seeder on a private network and look up the
/// fixture restaurant.
pub async fn run_restaurant_lookup(
    pool: &ContainerPool,
    config: &HarnessConfig,
) -> Result<RestaurantOutcome> {
    let env = pool.environment(RESTAURANT_LOOKUP_SCENARIO);
    let config = config.clone();

    env.run(move |env| {
        async move {
            let network = env.create_network("mongo").await?;
            let mongo = env.provision(mongodb_spec(&config, &network.name)).await?;

            let uri = mongo_uri(&mongo, SERVER_SELECTION_TIMEOUT)?;
            let client = DocumentClient::connect(&uri, MONGO_DATABASE)
                .await
                .context("Failed to create database client")?
                .with_label(MONGO_SERVICE);

            let probe_client = &client;
            env.await_ready(MONGO_SERVICE, &mongo, move || probe_client.ping())
                .await?;
            env.register_client(Arc::new(client.clone()), &mongo)?;

            let seeder = env.provision(seeder_spec(&config, &network.name)).await?;
            env.await_ready(SEEDER_SERVICE, &seeder, move || async move {
                match probe_client.find_restaurant(RESTAURANT_ID).await {
                    Ok(Some(restaurant)) => Ok(restaurant),
                    Ok(None) => Err(format!("restaurant {} not seeded yet", RESTAURANT_ID)),
                    Err(e) => Err(e.to_string()),
                }
            })
            .await?;

            env.begin_execution()?;
            lookup_restaurant(&client).await
        }
        .boxed()
    })
    .await
}

/// The point query against a seeded database.
pub async fn lookup_restaurant(client: &DocumentClient) -> Result<RestaurantOutcome> {
    let restaurant = client
        .get_restaurant(RESTAURANT_ID)
        .await
        .with_context(|| format!("Could not find restaurant '{}'", RESTAURANT_ID))?;

    info!(
        restaurant_id = %restaurant.restaurant_id,
        name = %restaurant.name,
        "Found restaurant"
    );

    let verification = verify_restaurant(&restaurant, &regina_caterers());
    Ok(RestaurantOutcome {
        restaurant,
        verification,
    })
}
