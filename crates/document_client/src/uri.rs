//! Connection string construction.

use std::time::Duration;
use url::form_urlencoded::byte_serialize;

use crate::errors::{DocumentError, DocumentResult};

/// Single-host MongoDB connection string.
///
/// Connections go straight to the one node (`directConnection=true`) with
/// TLS disabled, authenticating against `authSource`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MongoUri {
    host: String,
    port: u16,
    credentials: Option<(String, String)>,
    database: Option<String>,
    auth_source: String,
    server_selection_timeout: Option<Duration>,
}

impl MongoUri {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            credentials: None,
            database: None,
            auth_source: "admin".to_string(),
            server_selection_timeout: None,
        }
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some((username.into(), password.into()));
        self
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn with_auth_source(mut self, auth_source: impl Into<String>) -> Self {
        self.auth_source = auth_source.into();
        self
    }

    /// Bound on how long one operation waits for a usable server.
    ///
    /// Readiness probes set this low so a probe fails fast instead of
    /// consuming the whole readiness budget.
    pub fn with_server_selection_timeout(mut self, timeout: Duration) -> Self {
        self.server_selection_timeout = Some(timeout);
        self
    }

    pub fn build(&self) -> DocumentResult<String> {
        if self.host.is_empty() {
            return Err(DocumentError::InvalidUri("host must not be empty".to_string()));
        }

        let credentials = match &self.credentials {
            Some((user, password)) => format!("{}:{}@", encode(user), encode(password)),
            None => String::new(),
        };

        let mut uri = format!(
            "mongodb://{}{}:{}/{}?authSource={}&readPreference=primary&directConnection=true&ssl=false",
            credentials,
            self.host,
            self.port,
            self.database.as_deref().map(encode).unwrap_or_default(),
            encode(&self.auth_source),
        );
        if let Some(timeout) = self.server_selection_timeout {
            uri.push_str(&format!("&serverSelectionTimeoutMS={}", timeout.as_millis()));
        }

        Ok(uri)
    }
}

fn encode(value: &str) -> String {
    byte_serialize(value.as_bytes()).collect()
}

#[cfg(test)]
#[path = "uri_tests.rs"]
mod tests;
