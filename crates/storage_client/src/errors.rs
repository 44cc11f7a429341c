//! Error types for object storage operations.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Invalid storage endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("Bucket not found: {0}")]
    BucketNotFound(String),

    #[error("Object not found: {bucket}/{object}")]
    ObjectNotFound { bucket: String, object: String },

    #[error("Unexpected HTTP {status} from {operation}: {body}")]
    UnexpectedStatus {
        operation: String,
        status: u16,
        body: String,
    },

    #[error("Redirect limit of {0} exceeded")]
    TooManyRedirects(usize),

    #[error("Invalid redirect target '{0}'")]
    InvalidRedirect(String),

    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Failed to decode storage response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl StorageError {
    /// Whether the bucket or object addressed does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StorageError::BucketNotFound(_) | StorageError::ObjectNotFound { .. }
        )
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;
