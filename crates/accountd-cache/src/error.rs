//! Error types for the cache-aside layer.
//!
//! Most of these never reach a repository: the manager logs transport errors
//! on its read path and degrades to a cache miss. [`CacheError::WaitTooLong`]
//! is the one outcome callers are expected to handle explicitly.

use std::time::Duration;

/// Errors that can occur while talking to the cache or lock backend.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// A pooled connection could not be checked out.
    #[error("cache pool error: {0}")]
    Pool(#[from] deadpool_redis::PoolError),

    /// The backend rejected a command or the connection broke mid-flight.
    #[error("cache backend error: {0}")]
    Redis(#[from] redis::RedisError),

    /// The key was reported as existing but its value could not be read.
    #[error("cache entry {key} exists but could not be retrieved")]
    NotRetrievable {
        /// The key that could not be read.
        key: String,
    },

    /// A counter operation hit a value that is not an integer.
    #[error("cache entry {key} does not hold an integer")]
    NotAnInteger {
        /// The key holding the non-integer value.
        key: String,
    },

    /// Incrementing the counter would overflow `i64`.
    #[error("incrementing {key} would overflow")]
    Overflow {
        /// The saturated counter key.
        key: String,
    },

    /// Neither a value nor lock ownership could be obtained in time.
    #[error("waited {waited:?} for {key} without obtaining a value or the lock")]
    WaitTooLong {
        /// The contended cache key.
        key: String,
        /// Time spent polling before giving up.
        waited: Duration,
    },

    /// The manager or pool was configured with unusable settings.
    #[error("invalid cache configuration: {0}")]
    InvalidConfig(String),
}

impl CacheError {
    /// Creates a new `InvalidConfig` error.
    #[must_use]
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Returns true when the caller got neither a value nor ownership.
    ///
    /// Callers should surface this as a retryable, service-busy condition
    /// rather than fall back to an empty answer.
    pub fn is_wait_too_long(&self) -> bool {
        matches!(self, Self::WaitTooLong { .. })
    }

    /// Returns true for connection and protocol failures.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Pool(_) | Self::Redis(_) | Self::NotRetrievable { .. }
        )
    }
}

/// Type alias for cache results.
pub type CacheResult<T> = Result<T, CacheError>;
