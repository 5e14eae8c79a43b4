//! Redis connection pool construction.

use deadpool_redis::{Pool, PoolConfig, Runtime};
use redis::IntoConnectionInfo;
use std::time::Duration;

use crate::error::{CacheError, CacheResult};

/// Settings for one Redis connection pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisPoolConfig {
    /// Connection URL, e.g. `redis://localhost:6379/0`.
    pub url: String,
    /// Maximum number of pooled connections.
    pub pool_size: usize,
    /// Wait, create and recycle timeout for pooled connections.
    pub timeout: Duration,
}

impl RedisPoolConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            pool_size: 10,
            timeout: Duration::from_secs(5),
        }
    }
}

/// Check that `url` is a usable standalone Redis URL.
pub fn validate_redis_url(url: &str) -> CacheResult<()> {
    url.into_connection_info()
        .map(|_| ())
        .map_err(|e| CacheError::invalid_config(format!("invalid redis URL {url:?}: {e}")))
}

/// Build a connection pool.
///
/// The URL is validated up front so a malformed URL fails at startup rather
/// than on the first request. No connection is opened here; connections are
/// created lazily as callers check them out.
pub fn create_redis_pool(config: &RedisPoolConfig) -> CacheResult<Pool> {
    validate_redis_url(&config.url)?;
    if config.pool_size == 0 {
        return Err(CacheError::invalid_config("redis pool_size must be > 0"));
    }

    let mut pool_config = PoolConfig::new(config.pool_size);
    pool_config.timeouts.wait = Some(config.timeout);
    pool_config.timeouts.create = Some(config.timeout);
    pool_config.timeouts.recycle = Some(config.timeout);

    let mut redis_config = deadpool_redis::Config::from_url(config.url.clone());
    redis_config.pool = Some(pool_config);

    redis_config
        .create_pool(Some(Runtime::Tokio1))
        .map_err(|e| CacheError::invalid_config(format!("failed to create redis pool: {e}")))
}
