//! Error types for statusbook

use thiserror::Error;

/// Result type alias for statusbook operations
pub type Result<T> = std::result::Result<T, StatusbookError>;

/// Failure reported by a document store
///
/// Duplicate keys are a distinct variant so callers can branch on them with an
/// ordinary `match` instead of inspecting backend error codes.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Duplicate key '{id}' in collection '{collection}'")]
    DuplicateKey { collection: String, id: String },

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Store backend error: {0}")]
    Backend(String),

    #[error("Document serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Create a duplicate key error
    pub fn duplicate_key(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self::DuplicateKey {
            collection: collection.into(),
            id: id.into(),
        }
    }

    /// Create a backend error
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, Self::DuplicateKey { .. })
    }
}

/// Main error type for statusbook
#[derive(Error, Debug)]
pub enum StatusbookError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(String),

    /// The user was deleted but removing its statuses failed; statuses
    /// referencing `user_id` may remain.
    #[error("User '{user_id}' was deleted but its statuses were not: {source}")]
    CascadeIncomplete {
        user_id: String,
        #[source]
        source: StoreError,
    },

    #[error("Shard worker error: {0}")]
    Worker(String),
}

impl StatusbookError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a shard worker error
    pub fn worker(msg: impl Into<String>) -> Self {
        Self::Worker(msg.into())
    }
}
