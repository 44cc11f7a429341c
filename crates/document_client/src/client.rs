//! Thin wrapper around the MongoDB driver.

use async_trait::async_trait;
use mongodb::bson::{doc, Document};
use mongodb::Client;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use test_env::{ServiceClient, TestEnvError, TestEnvResult};

use crate::errors::{DocumentError, DocumentResult};
use crate::restaurant::{Restaurant, RESTAURANTS_COLLECTION};

/// Connection to one database on a MongoDB server.
#[derive(Debug, Clone)]
pub struct DocumentClient {
    client: Client,
    database: String,
    label: String,
}

impl DocumentClient {
    /// Parse `uri` and prepare a connection pool for `database`.
    ///
    /// The driver connects lazily; use [`DocumentClient::ping`] to find out
    /// whether the server is reachable.
    pub async fn connect(uri: &str, database: impl Into<String>) -> DocumentResult<Self> {
        let client = Client::with_uri_str(uri).await?;
        let database = database.into();
        debug!(database = %database, "MongoDB client created");

        Ok(Self {
            client,
            database,
            label: "mongodb".to_string(),
        })
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    /// Round trip to the server; readiness probe for the database.
    pub async fn ping(&self) -> DocumentResult<()> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await?;
        Ok(())
    }

    /// First document in `collection` matching `filter`.
    pub async fn find_one<T>(&self, collection: &str, filter: Document) -> DocumentResult<Option<T>>
    where
        T: DeserializeOwned + Send + Sync,
    {
        debug!(collection = collection, filter = %filter, "find_one");
        Ok(self
            .client
            .database(&self.database)
            .collection::<T>(collection)
            .find_one(filter)
            .await?)
    }

    /// Restaurant with the given business key, if seeded.
    pub async fn find_restaurant(&self, restaurant_id: &str) -> DocumentResult<Option<Restaurant>> {
        self.find_one(RESTAURANTS_COLLECTION, doc! { "restaurant_id": restaurant_id })
            .await
    }

    /// Like [`DocumentClient::find_restaurant`] but a missing document is an error.
    pub async fn get_restaurant(&self, restaurant_id: &str) -> DocumentResult<Restaurant> {
        self.find_restaurant(restaurant_id)
            .await?
            .ok_or_else(|| DocumentError::NotFound {
                collection: RESTAURANTS_COLLECTION.to_string(),
                filter: doc! { "restaurant_id": restaurant_id }.to_string(),
            })
    }

    /// Close every pooled connection.
    ///
    /// Waits for outstanding cursors and sessions to be dropped, so callers
    /// should bound it with a timeout.
    pub async fn shutdown(&self) {
        self.client.clone().shutdown().await;
        info!(client = %self.label, "MongoDB client shut down");
    }
}

#[async_trait]
impl ServiceClient for DocumentClient {
    fn label(&self) -> &str {
        &self.label
    }

    async fn disconnect(&self) -> TestEnvResult<()> {
        self.shutdown().await;
        Ok(())
    }
}

impl From<DocumentError> for TestEnvError {
    fn from(error: DocumentError) -> Self {
        TestEnvError::operation("document database", error)
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
