//! HTTP client for the storage emulator's JSON API.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{CONTENT_TYPE, HOST, LOCATION};
use reqwest::redirect::Policy;
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use test_env::{ServiceClient, TestEnvError, TestEnvResult};

use crate::errors::{StorageError, StorageResult};
use crate::host_fix::HostRewrite;
use crate::models::{Bucket, ListPage, ObjectAttributes, UploadMetadata};
use crate::objects::{ObjectReader, ObjectWriter};

/// Redirects followed before giving up.
pub const MAX_REDIRECTS: usize = 10;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

struct Payload {
    bytes: Bytes,
    content_type: String,
}

/// Unauthenticated client bound to one emulator endpoint.
#[derive(Debug, Clone)]
pub struct StorageClient {
    http: Client,
    base: Url,
    rewrite: Option<HostRewrite>,
    label: String,
}

impl StorageClient {
    /// Client for `base_url`, e.g. `http://127.0.0.1:49153`.
    pub fn new(base_url: &str) -> StorageResult<Self> {
        let invalid = |reason: String| StorageError::InvalidEndpoint {
            endpoint: base_url.to_string(),
            reason,
        };

        let base = Url::parse(base_url).map_err(|e| invalid(e.to_string()))?;
        if !matches!(base.scheme(), "http" | "https") || base.cannot_be_a_base() {
            return Err(invalid("expected an http(s) base URL".to_string()));
        }
        if base.host_str().is_none() {
            return Err(invalid("missing host".to_string()));
        }

        // Redirects are followed by hand so their targets can be rewritten.
        let http = Client::builder()
            .redirect(Policy::none())
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base,
            rewrite: None,
            label: "storage".to_string(),
        })
    }

    /// Client for an emulator that advertises itself as `virtual_authority`
    /// but is reachable at `base_url`.
    pub fn with_virtual_host(base_url: &str, virtual_authority: &str) -> StorageResult<Self> {
        let mut client = Self::new(base_url)?;
        let host = client.base.host_str().unwrap_or_default();
        let local_authority = match client.base.port_or_known_default() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };
        client.rewrite = Some(HostRewrite::new(virtual_authority, &local_authority)?);
        Ok(client)
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    pub fn host_rewrite(&self) -> Option<&HostRewrite> {
        self.rewrite.as_ref()
    }

    fn endpoint<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn json_api<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Url {
        self.endpoint(["storage", "v1"].into_iter().chain(segments))
    }

    fn upload_api<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Url {
        self.endpoint(["upload", "storage", "v1"].into_iter().chain(segments))
    }

    /// Send a request, following redirects through the host rewrite.
    ///
    /// 307 and 308 repeat the original method and body; every other
    /// redirect continues with a bodiless GET.
    async fn send(
        &self,
        method: Method,
        url: Url,
        payload: Option<Payload>,
    ) -> StorageResult<Response> {
        let mut method = method;
        let mut url = url;
        let mut payload = payload;

        for _ in 0..=MAX_REDIRECTS {
            let mut request = self.http.request(method.clone(), url.clone());
            if let Some(rewrite) = &self.rewrite {
                request = request.header(HOST, rewrite.virtual_authority());
            }
            if let Some(payload) = &payload {
                request = request
                    .header(CONTENT_TYPE, payload.content_type.as_str())
                    .body(payload.bytes.clone());
            }

            let mut response = request.send().await?;
            if let Some(rewrite) = &self.rewrite {
                rewrite.apply_to_headers(response.headers_mut());
            }

            let status = response.status();
            if !status.is_redirection() {
                return Ok(response);
            }
            let Some(location) = response.headers().get(LOCATION) else {
                return Ok(response);
            };

            let location = location
                .to_str()
                .map_err(|_| StorageError::InvalidRedirect(format!("{:?}", location)))?;
            let next = url
                .join(location)
                .map_err(|_| StorageError::InvalidRedirect(location.to_string()))?;

            debug!(status = status.as_u16(), from = %url, to = %next, "Following redirect");

            if !matches!(
                status,
                StatusCode::TEMPORARY_REDIRECT | StatusCode::PERMANENT_REDIRECT
            ) {
                method = Method::GET;
                payload = None;
            }
            url = next;
        }

        Err(StorageError::TooManyRedirects(MAX_REDIRECTS))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        operation: &str,
        not_found: impl FnOnce() -> StorageError,
    ) -> StorageResult<T> {
        let response = self.send(Method::GET, url, None).await?;
        let response = expect_success(response, operation, not_found).await?;
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn list_all<T: DeserializeOwned>(
        &self,
        url: Url,
        operation: &str,
        not_found: impl Fn() -> StorageError,
    ) -> StorageResult<Vec<T>> {
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut page_url = url.clone();
            if let Some(token) = &page_token {
                page_url.query_pairs_mut().append_pair("pageToken", token);
            }

            let page: ListPage<T> = self.get_json(page_url, operation, &not_found).await?;
            items.extend(page.items);

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => return Ok(items),
            }
        }
    }

    /// All buckets. Doubles as the readiness probe for the emulator.
    pub async fn list_buckets(&self) -> StorageResult<Vec<Bucket>> {
        self.list_all(self.json_api(["b"]), "list buckets", || {
            StorageError::BucketNotFound(String::new())
        })
        .await
    }

    pub async fn create_bucket(&self, name: &str) -> StorageResult<Bucket> {
        let payload = Payload {
            bytes: Bytes::from(serde_json::to_vec(&json!({ "name": name }))?),
            content_type: "application/json".to_string(),
        };

        let response = self
            .send(Method::POST, self.json_api(["b"]), Some(payload))
            .await?;
        let response = expect_success(response, "create bucket", || {
            StorageError::BucketNotFound(name.to_string())
        })
        .await?;

        info!(bucket = name, "Bucket created");
        Ok(serde_json::from_slice(&response.bytes().await?)?)
    }

    /// Every object in `bucket`, optionally limited to names starting with `prefix`.
    pub async fn list_objects(
        &self,
        bucket: &str,
        prefix: Option<&str>,
    ) -> StorageResult<Vec<ObjectAttributes>> {
        let mut url = self.json_api(["b", bucket, "o"]);
        if let Some(prefix) = prefix {
            url.query_pairs_mut().append_pair("prefix", prefix);
        }

        let objects: Vec<ObjectAttributes> = self
            .list_all(url, "list objects", || {
                StorageError::BucketNotFound(bucket.to_string())
            })
            .await?;

        debug!(bucket = bucket, count = objects.len(), "Listed objects");
        Ok(objects)
    }

    pub async fn object_attributes(
        &self,
        bucket: &str,
        object: &str,
    ) -> StorageResult<ObjectAttributes> {
        self.get_json(self.json_api(["b", bucket, "o", object]), "get object", || {
            object_not_found(bucket, object)
        })
        .await
    }

    /// Start streaming the content of an object.
    pub async fn open_reader(&self, bucket: &str, object: &str) -> StorageResult<ObjectReader> {
        let mut url = self.json_api(["b", bucket, "o", object]);
        url.query_pairs_mut().append_pair("alt", "media");

        let response = self.send(Method::GET, url, None).await?;
        let response =
            expect_success(response, "read object", || object_not_found(bucket, object)).await?;

        Ok(ObjectReader::new(bucket, object, response))
    }

    /// Whole content of an object.
    pub async fn read_object(&self, bucket: &str, object: &str) -> StorageResult<Vec<u8>> {
        self.open_reader(bucket, object).await?.read_to_end().await
    }

    /// Buffered writer that uploads `object` when closed.
    pub fn writer(&self, bucket: &str, object: &str) -> ObjectWriter {
        ObjectWriter::new(self.clone(), bucket, object)
    }

    pub async fn delete_object(&self, bucket: &str, object: &str) -> StorageResult<()> {
        let response = self
            .send(Method::DELETE, self.json_api(["b", bucket, "o", object]), None)
            .await?;
        expect_success(response, "delete object", || object_not_found(bucket, object)).await?;

        info!(bucket = bucket, object = object, "Object deleted");
        Ok(())
    }

    /// Single-request multipart upload of `data` with its metadata.
    pub(crate) async fn upload(
        &self,
        bucket: &str,
        object: &str,
        content_type: Option<&str>,
        metadata: &BTreeMap<String, String>,
        data: &[u8],
    ) -> StorageResult<ObjectAttributes> {
        let mut url = self.upload_api(["b", bucket, "o"]);
        url.query_pairs_mut().append_pair("uploadType", "multipart");

        let metadata_json = serde_json::to_vec(&UploadMetadata {
            name: object,
            content_type,
            metadata,
        })?;
        let boundary = format!("boundary-{}", uuid::Uuid::new_v4().simple());
        let body = multipart_related(
            &boundary,
            &metadata_json,
            content_type.unwrap_or("application/octet-stream"),
            data,
        );

        let payload = Payload {
            bytes: Bytes::from(body),
            content_type: format!("multipart/related; boundary={}", boundary),
        };

        let response = self.send(Method::POST, url, Some(payload)).await?;
        let response = expect_success(response, "upload object", || {
            StorageError::BucketNotFound(bucket.to_string())
        })
        .await?;
        let attributes: ObjectAttributes = serde_json::from_slice(&response.bytes().await?)?;

        info!(
            bucket = bucket,
            object = object,
            size = data.len(),
            "Object uploaded"
        );
        Ok(attributes)
    }
}

#[async_trait]
impl ServiceClient for StorageClient {
    fn label(&self) -> &str {
        &self.label
    }

    /// HTTP connections are pooled per request; nothing outlives the client.
    async fn disconnect(&self) -> TestEnvResult<()> {
        debug!(client = %self.label, endpoint = %self.base, "Storage client released");
        Ok(())
    }
}

impl From<StorageError> for TestEnvError {
    fn from(error: StorageError) -> Self {
        TestEnvError::operation("object storage", error)
    }
}

fn object_not_found(bucket: &str, object: &str) -> StorageError {
    StorageError::ObjectNotFound {
        bucket: bucket.to_string(),
        object: object.to_string(),
    }
}

async fn expect_success(
    response: Response,
    operation: &str,
    not_found: impl FnOnce() -> StorageError,
) -> StorageResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::NOT_FOUND {
        return Err(not_found());
    }

    let body = response.text().await.unwrap_or_default();
    Err(StorageError::UnexpectedStatus {
        operation: operation.to_string(),
        status: status.as_u16(),
        body,
    })
}

/// Body of a `multipart/related` upload: JSON metadata, then the content.
fn multipart_related(
    boundary: &str,
    metadata_json: &[u8],
    content_type: &str,
    data: &[u8],
) -> Vec<u8> {
    let mut body = Vec::with_capacity(metadata_json.len() + data.len() + 256);
    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.extend_from_slice(metadata_json);
    body.extend_from_slice(format!("\r\n--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    body
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
