//! Key-value store abstraction and its Redis implementation.

use async_trait::async_trait;
use deadpool_redis::Pool;
use redis::AsyncCommands;
use std::time::Duration;

use crate::error::{CacheError, CacheResult};

/// A single write with a TTL already resolved to whole seconds.
#[derive(Debug, Clone, Copy)]
pub struct StoreEntry<'a> {
    pub key: &'a str,
    pub value: &'a [u8],
    pub ttl_secs: u64,
}

/// String-keyed remote store used by the cache manager.
///
/// Every call is a single bounded round trip. Implementations must not hold
/// a connection beyond the call that checked it out.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Atomically check existence and fetch a value.
    ///
    /// Returns `Ok(None)` when the key does not exist. A key that exists but
    /// cannot be read is reported as [`CacheError::NotRetrievable`].
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>>;

    /// Write one value with an expiry.
    async fn set_with_ttl(&self, entry: StoreEntry<'_>) -> CacheResult<()>;

    /// Write several values as one all-or-nothing batch.
    async fn set_multi_with_ttl(&self, entries: &[StoreEntry<'_>]) -> CacheResult<()>;

    /// Delete keys. An empty slice is a no-op.
    async fn delete_keys(&self, keys: &[String]) -> CacheResult<()>;

    /// Increment an integer counter, creating it at 0 first if absent.
    /// Returns the new value.
    async fn increment(&self, key: &str) -> CacheResult<i64>;

    /// Reset the TTL of an existing key. Returns false if the key is missing.
    async fn expire(&self, key: &str, ttl: Duration) -> CacheResult<bool>;

    /// Remaining TTL in seconds: `-2` if missing, `-1` if the key never expires.
    async fn ttl_of(&self, key: &str) -> CacheResult<i64>;
}

/// Redis-backed [`KeyValueStore`].
///
/// Each operation checks a connection out of the pool; the connection goes
/// back to the pool when it is dropped, including on early returns.
#[derive(Clone)]
pub struct RedisStore {
    pool: Pool,
}

impl RedisStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Round-trip a `PING` to verify connectivity.
    pub async fn ping(&self) -> CacheResult<()> {
        let mut conn = self.pool.get().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let mut conn = self.pool.get().await?;
        let (exists, value): (bool, Option<Vec<u8>>) = redis::pipe()
            .atomic()
            .exists(key)
            .get(key)
            .query_async(&mut conn)
            .await?;

        match (exists, value) {
            (false, _) => Ok(None),
            (true, Some(data)) => Ok(Some(data)),
            (true, None) => Err(CacheError::NotRetrievable {
                key: key.to_string(),
            }),
        }
    }

    async fn set_with_ttl(&self, entry: StoreEntry<'_>) -> CacheResult<()> {
        let mut conn = self.pool.get().await?;
        conn.set_ex::<_, _, ()>(entry.key, entry.value, entry.ttl_secs)
            .await?;
        Ok(())
    }

    async fn set_multi_with_ttl(&self, entries: &[StoreEntry<'_>]) -> CacheResult<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let mut pipe = redis::pipe();
        pipe.atomic();
        for entry in entries {
            pipe.set_ex(entry.key, entry.value, entry.ttl_secs).ignore();
        }

        let mut conn = self.pool.get().await?;
        let _: () = pipe.query_async(&mut conn).await?;
        Ok(())
    }

    async fn delete_keys(&self, keys: &[String]) -> CacheResult<()> {
        if keys.is_empty() {
            return Ok(());
        }

        let mut conn = self.pool.get().await?;
        conn.del::<_, ()>(keys).await?;
        Ok(())
    }

    async fn increment(&self, key: &str) -> CacheResult<i64> {
        let mut conn = self.pool.get().await?;
        let value: i64 = conn.incr(key, 1).await?;
        Ok(value)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> CacheResult<bool> {
        let mut conn = self.pool.get().await?;
        let updated: bool = conn.expire(key, ttl.as_secs() as i64).await?;
        Ok(updated)
    }

    async fn ttl_of(&self, key: &str) -> CacheResult<i64> {
        let mut conn = self.pool.get().await?;
        let ttl: i64 = conn.ttl(key).await?;
        Ok(ttl)
    }
}
