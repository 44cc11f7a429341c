//! Client for the JSON API of `fsouza/fake-gcs-server`.
//!
//! The emulator believes it is served from a virtual host (`gcs:4443`) and
//! embeds that host in the URLs it hands out. [`HostRewrite`] sends the
//! virtual host on every request and points redirects back at the locally
//! mapped port, so the client works from outside the container network.

pub mod client;
pub mod errors;
pub mod host_fix;
pub mod models;
pub mod objects;

pub use client::StorageClient;
pub use errors::{StorageError, StorageResult};
pub use host_fix::HostRewrite;
pub use models::{Bucket, ObjectAttributes};
pub use objects::{ObjectReader, ObjectWriter};
