//! Streaming reads and buffered writes of object content.

use bytes::Bytes;
use reqwest::Response;
use std::collections::BTreeMap;
use std::io;

use crate::client::StorageClient;
use crate::errors::StorageResult;
use crate::models::ObjectAttributes;

/// Open download of one object.
#[derive(Debug)]
pub struct ObjectReader {
    bucket: String,
    object: String,
    response: Response,
}

impl ObjectReader {
    pub(crate) fn new(bucket: &str, object: &str, response: Response) -> Self {
        Self {
            bucket: bucket.to_string(),
            object: object.to_string(),
            response,
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn object(&self) -> &str {
        &self.object
    }

    /// Content length announced by the server, if any.
    pub fn content_length(&self) -> Option<u64> {
        self.response.content_length()
    }

    /// Next chunk of content, `None` once the body is exhausted.
    pub async fn chunk(&mut self) -> StorageResult<Option<Bytes>> {
        Ok(self.response.chunk().await?)
    }

    pub async fn read_to_end(mut self) -> StorageResult<Vec<u8>> {
        let mut content = Vec::new();
        while let Some(chunk) = self.chunk().await? {
            content.extend_from_slice(&chunk);
        }
        Ok(content)
    }
}

/// Buffers written content and uploads it with its metadata on [`close`].
///
/// Nothing is sent before `close`; a writer dropped without closing leaves
/// no object behind.
///
/// [`close`]: ObjectWriter::close
#[derive(Debug)]
pub struct ObjectWriter {
    client: StorageClient,
    bucket: String,
    object: String,
    content_type: Option<String>,
    metadata: BTreeMap<String, String>,
    buffer: Vec<u8>,
}

impl ObjectWriter {
    pub(crate) fn new(client: StorageClient, bucket: &str, object: &str) -> Self {
        Self {
            client,
            bucket: bucket.to_string(),
            object: object.to_string(),
            content_type: None,
            metadata: BTreeMap::new(),
            buffer: Vec::new(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Bytes written so far.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Upload the buffered content and return the stored object's attributes.
    pub async fn close(self) -> StorageResult<ObjectAttributes> {
        self.client
            .upload(
                &self.bucket,
                &self.object,
                self.content_type.as_deref(),
                &self.metadata,
                &self.buffer,
            )
            .await
    }
}

impl io::Write for ObjectWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
