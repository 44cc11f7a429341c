//! Virtual host handling for the storage emulator.

use reqwest::header::{HeaderMap, HeaderValue, LOCATION};
use tracing::debug;
use url::Url;

use crate::errors::{StorageError, StorageResult};

/// Maps between the emulator's virtual authority and the local endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostRewrite {
    virtual_host: String,
    virtual_port: Option<u16>,
    local_host: String,
    local_port: Option<u16>,
}

impl HostRewrite {
    /// `virtual_authority` and `local_authority` are `host[:port]` pairs,
    /// e.g. `gcs:4443` and `127.0.0.1:49153`.
    pub fn new(virtual_authority: &str, local_authority: &str) -> StorageResult<Self> {
        let (virtual_host, virtual_port) = split_authority(virtual_authority)?;
        let (local_host, local_port) = split_authority(local_authority)?;

        Ok(Self {
            virtual_host,
            virtual_port,
            local_host,
            local_port,
        })
    }

    /// Value sent as the `Host` header.
    pub fn virtual_authority(&self) -> String {
        join_authority(&self.virtual_host, self.virtual_port)
    }

    pub fn local_authority(&self) -> String {
        join_authority(&self.local_host, self.local_port)
    }

    fn points_at_virtual_host(&self, url: &Url) -> bool {
        url.host_str()
            .is_some_and(|host| host.eq_ignore_ascii_case(&self.virtual_host))
            && (self.virtual_port.is_none() || url.port_or_known_default() == self.virtual_port)
    }

    /// Redirect `url` to the local endpoint when it addresses the virtual host.
    ///
    /// Returns `None` for URLs that address any other host.
    pub fn rewrite_url(&self, url: &Url) -> Option<Url> {
        if !self.points_at_virtual_host(url) {
            return None;
        }

        let mut rewritten = url.clone();
        rewritten.set_host(Some(&self.local_host)).ok()?;
        rewritten.set_port(self.local_port).ok()?;
        Some(rewritten)
    }

    /// Rewrite a `Location` header value; relative or foreign locations are
    /// returned unchanged.
    pub fn rewrite_location(&self, location: &str) -> String {
        match Url::parse(location) {
            Ok(url) => self
                .rewrite_url(&url)
                .map(String::from)
                .unwrap_or_else(|| location.to_string()),
            Err(_) => location.to_string(),
        }
    }

    /// Rewrite the `Location` header of a response in place.
    pub fn apply_to_headers(&self, headers: &mut HeaderMap) {
        let Some(location) = headers.get(LOCATION).and_then(|v| v.to_str().ok()) else {
            return;
        };

        let rewritten = self.rewrite_location(location);
        if rewritten != location {
            debug!(from = location, to = %rewritten, "Rewrote Location header");
            if let Ok(value) = HeaderValue::from_str(&rewritten) {
                headers.insert(LOCATION, value);
            }
        }
    }
}

fn split_authority(authority: &str) -> StorageResult<(String, Option<u16>)> {
    let invalid = |reason: &str| StorageError::InvalidEndpoint {
        endpoint: authority.to_string(),
        reason: reason.to_string(),
    };

    let url = Url::parse(&format!("http://{}", authority)).map_err(|e| invalid(&e.to_string()))?;
    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| invalid("missing host"))?;
    if url.path() != "/" || url.query().is_some() {
        return Err(invalid("expected host[:port] only"));
    }

    Ok((host.to_string(), url.port()))
}

fn join_authority(host: &str, port: Option<u16>) -> String {
    match port {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    }
}

#[cfg(test)]
#[path = "host_fix_tests.rs"]
mod tests;
