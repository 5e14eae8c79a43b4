//! Error types for the account repositories.

use accountd_cache::CacheError;

/// Errors raised by a backing store (the relational layer).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A record with the same unique key already exists.
    #[error("Record already exists: {entity}/{key}")]
    AlreadyExists { entity: String, key: String },

    /// The store could not be reached.
    #[error("Connection error: {message}")]
    Connection { message: String },

    /// Any other failure inside the store.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl StoreError {
    #[must_use]
    pub fn already_exists(entity: impl Into<String>, key: impl Into<String>) -> Self {
        Self::AlreadyExists {
            entity: entity.into(),
            key: key.into(),
        }
    }

    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// Errors returned by the repositories.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("corrupt cache entry {key}: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RepositoryError {
    /// True when a lookup gave up waiting on another caller's recomputation.
    /// Callers usually surface this as a "service busy" condition.
    pub fn is_busy(&self) -> bool {
        matches!(self, RepositoryError::Cache(e) if e.is_wait_too_long())
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Errors that stop the service from starting.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Cache(#[from] CacheError),
}
