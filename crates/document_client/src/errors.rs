//! Error types for document database operations.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("Invalid connection settings: {0}")]
    InvalidUri(String),

    #[error("No document in '{collection}' matches {filter}")]
    NotFound { collection: String, filter: String },

    #[error("MongoDB driver error: {0}")]
    Driver(#[from] mongodb::error::Error),
}

pub type DocumentResult<T> = Result<T, DocumentError>;
