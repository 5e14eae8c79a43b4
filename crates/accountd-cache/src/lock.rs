//! Distributed per-key lock stored next to the cache entries.
//!
//! A lock is a plain key (`lock:{cache_key}`) holding a random owner token
//! with a self-expiring TTL, so a crashed owner cannot block other waiters
//! for longer than the lock duration. Release compares the token before
//! deleting, which keeps an owner whose lock already expired from removing
//! a lock that has since been granted to someone else.

use async_trait::async_trait;
use deadpool_redis::Pool;
use redis::{AsyncCommands, Script};
use std::sync::LazyLock;
use std::time::Duration;
use uuid::Uuid;

use crate::error::CacheResult;
use crate::keys::lock_key;

static RELEASE_SCRIPT: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#,
    )
});

/// Proof of ownership of the recomputation right for one cache key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lock {
    key: String,
    cache_key: String,
    token: String,
    expiry: Duration,
}

impl Lock {
    /// Create a lock value with a fresh owner token for `cache_key`.
    pub fn new(cache_key: &str, expiry: Duration) -> Self {
        Self {
            key: lock_key(cache_key),
            cache_key: cache_key.to_string(),
            token: Uuid::new_v4().to_string(),
            expiry,
        }
    }

    /// The lock key, `lock:{cache_key}`.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The cache key this lock guards.
    pub fn cache_key(&self) -> &str {
        &self.cache_key
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn expiry(&self) -> Duration {
        self.expiry
    }
}

/// Mutual exclusion over cache keys, shared by every process using the store.
#[async_trait]
pub trait DistributedLock: Send + Sync {
    /// Try to take the lock for `cache_key`.
    ///
    /// Makes at most `max_tries` immediate attempts and never sleeps.
    /// Returns `Ok(None)` when another owner holds the lock; contention is
    /// not an error at this level.
    async fn acquire(
        &self,
        cache_key: &str,
        expiry: Duration,
        max_tries: u32,
    ) -> CacheResult<Option<Lock>>;

    /// Release a lock if it is still owned by `lock`'s token.
    /// Returns false when the lock had already expired or changed hands.
    async fn release(&self, lock: &Lock) -> CacheResult<bool>;

    /// Probe whether anyone currently holds the lock for `cache_key`.
    async fn is_held(&self, cache_key: &str) -> CacheResult<bool>;
}

/// Redis-backed [`DistributedLock`] using `SET NX PX`.
#[derive(Clone)]
pub struct RedisLock {
    pool: Pool,
}

impl RedisLock {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DistributedLock for RedisLock {
    async fn acquire(
        &self,
        cache_key: &str,
        expiry: Duration,
        max_tries: u32,
    ) -> CacheResult<Option<Lock>> {
        let lock = Lock::new(cache_key, expiry);
        let expiry_ms = expiry.as_millis().max(1) as u64;
        let mut conn = self.pool.get().await?;

        for attempt in 1..=max_tries.max(1) {
            let reply: Option<String> = redis::cmd("SET")
                .arg(lock.key())
                .arg(lock.token())
                .arg("NX")
                .arg("PX")
                .arg(expiry_ms)
                .query_async(&mut conn)
                .await?;

            if reply.is_some() {
                tracing::debug!(key = %lock.key(), attempt, "lock acquired");
                return Ok(Some(lock));
            }
        }

        tracing::debug!(key = %lock.key(), max_tries, "lock contended");
        Ok(None)
    }

    async fn release(&self, lock: &Lock) -> CacheResult<bool> {
        let mut conn = self.pool.get().await?;
        let deleted: i64 = RELEASE_SCRIPT
            .key(lock.key())
            .arg(lock.token())
            .invoke_async(&mut conn)
            .await?;
        Ok(deleted > 0)
    }

    async fn is_held(&self, cache_key: &str) -> CacheResult<bool> {
        let mut conn = self.pool.get().await?;
        let held: bool = conn.exists(lock_key(cache_key)).await?;
        Ok(held)
    }
}
