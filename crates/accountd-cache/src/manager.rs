//! Cache-aside manager with stampede protection.
//!
//! ## Get-or-lock protocol
//!
//! ```text
//! get_or_lock(key)
//!   CheckCache ── hit ──────────────────────────────► Hit(value)
//!       │ miss
//!   TryLock ───── acquired ─────────────────────────► Owner(lock)
//!       │ contended
//!   WaitPoll ─┬─ lock released → CheckCache, TryLock
//!             ├─ lock held     → sleep(backoff)
//!             └─ budget spent  ─────────────────────► Err(WaitTooLong)
//! ```
//!
//! The owner loads the value from the backing store, stores it (or the
//! negative marker), and then releases the lock. Exclusion is delegated
//! entirely to the [`DistributedLock`], so it holds across processes; the
//! manager keeps no in-process lock of its own.
//!
//! ## Failure handling
//!
//! Caching is an optimisation. Transport errors on the read path are logged
//! and treated as a miss, and a lock backend that cannot be reached yields
//! [`CacheLookup::Bypass`] so the caller reads through without coordination.
//! Only [`CacheError::WaitTooLong`] and errors from explicit writes reach the
//! caller.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::backoff::Backoff;
use crate::config::CacheManagerConfig;
use crate::error::{CacheError, CacheResult};
use crate::item::{CacheItem, CachedValue, KeyTtl};
use crate::keys::NIL_VALUE;
use crate::lock::{DistributedLock, Lock};
use crate::store::{KeyValueStore, StoreEntry};

/// Outcome of [`CacheManager::get_or_lock`].
#[derive(Debug)]
pub enum CacheLookup {
    /// The key was cached (possibly as a negative entry).
    Hit(CachedValue),
    /// The caller owns recomputation of the key and must store the result
    /// and then release the lock.
    Owner(Lock),
    /// No value and no lock: caching is disabled or the lock backend is
    /// unreachable. Read the backing store directly.
    Bypass,
}

impl CacheLookup {
    pub fn is_owner(&self) -> bool {
        matches!(self, CacheLookup::Owner(_))
    }

    pub fn is_hit(&self) -> bool {
        matches!(self, CacheLookup::Hit(_))
    }
}

enum LockAttempt {
    Acquired(Lock),
    Contended,
    Unavailable,
}

/// Cache-aside entry point shared by every repository.
pub struct CacheManager {
    config: CacheManagerConfig,
    store: Arc<dyn KeyValueStore>,
    lock: Arc<dyn DistributedLock>,
}

impl CacheManager {
    /// Create a manager over the given store and lock clients.
    ///
    /// Fails with [`CacheError::InvalidConfig`] if the configuration is
    /// unusable.
    pub fn new(
        config: CacheManagerConfig,
        store: Arc<dyn KeyValueStore>,
        lock: Arc<dyn DistributedLock>,
    ) -> CacheResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            store,
            lock,
        })
    }

    pub fn config(&self) -> &CacheManagerConfig {
        &self.config
    }

    pub fn is_disabled(&self) -> bool {
        self.config.disabled
    }

    /// Look up a key without taking part in the lock protocol.
    ///
    /// Misses, disabled mode and backend errors all yield `None`.
    pub async fn get(&self, key: &str) -> Option<CachedValue> {
        if self.config.disabled {
            return None;
        }
        self.check_cache(key).await
    }

    /// Return the cached value, or the right to recompute it.
    ///
    /// Blocks for at most `wait_budget` (plus one backoff interval) when
    /// another owner is recomputing the key.
    pub async fn get_or_lock(&self, key: &str) -> CacheResult<CacheLookup> {
        if self.config.disabled {
            return Ok(CacheLookup::Bypass);
        }

        if let Some(value) = self.check_cache(key).await {
            return Ok(CacheLookup::Hit(value));
        }

        match self.try_lock(key).await {
            LockAttempt::Acquired(lock) => return Ok(CacheLookup::Owner(lock)),
            LockAttempt::Unavailable => return Ok(CacheLookup::Bypass),
            LockAttempt::Contended => {}
        }

        self.wait_for_owner(key).await
    }

    /// Poll until the current owner finishes, we become the owner, or the
    /// wait budget runs out.
    async fn wait_for_owner(&self, key: &str) -> CacheResult<CacheLookup> {
        let started = Instant::now();
        let deadline = started + self.config.wait_budget;
        let mut backoff = Backoff::default();

        loop {
            if !self.is_locked(key).await {
                if let Some(value) = self.check_cache(key).await {
                    tracing::debug!(key = %key, waited = ?started.elapsed(), "cache filled by owner");
                    return Ok(CacheLookup::Hit(value));
                }
                // Released without populating; take over.
                match self.try_lock(key).await {
                    LockAttempt::Acquired(lock) => return Ok(CacheLookup::Owner(lock)),
                    LockAttempt::Unavailable => return Ok(CacheLookup::Bypass),
                    LockAttempt::Contended => {}
                }
            }

            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let delay = backoff.next_delay().min(deadline - now);
            tracing::trace!(key = %key, attempt = backoff.attempt(), delay = ?delay, "waiting for lock owner");
            tokio::time::sleep(delay).await;
        }

        let waited = started.elapsed();
        tracing::warn!(key = %key, waited = ?waited, "gave up waiting for lock owner");
        Err(CacheError::WaitTooLong {
            key: key.to_string(),
            waited,
        })
    }

    /// Take the lock for `key` without consulting the cache.
    pub async fn acquire_lock(&self, key: &str) -> CacheResult<Option<Lock>> {
        if self.config.disabled {
            return Ok(None);
        }
        self.lock
            .acquire(key, self.config.lock_duration, self.config.lock_max_tries)
            .await
    }

    /// Release a lock obtained from [`CacheManager::get_or_lock`].
    ///
    /// Best effort: failures are logged, and the lock expires on its own.
    pub async fn release(&self, lock: Lock) {
        match self.lock.release(&lock).await {
            Ok(true) => tracing::debug!(key = %lock.key(), "lock released"),
            Ok(false) => {
                tracing::warn!(key = %lock.key(), "lock expired before release")
            }
            Err(e) => {
                tracing::warn!(key = %lock.key(), error = %e, "failed to release lock")
            }
        }
    }

    /// Write a value. The TTL is the item's own, or the default TTL if zero.
    pub async fn store_without_blocking(&self, item: &CacheItem) -> CacheResult<()> {
        if self.config.disabled {
            return Ok(());
        }

        let ttl_secs = self.decide_ttl(item);
        self.store
            .set_with_ttl(StoreEntry {
                key: item.key(),
                value: item.value(),
                ttl_secs,
            })
            .await?;
        tracing::debug!(key = %item.key(), ttl_secs, "cache set");
        Ok(())
    }

    /// Write several values atomically, each with its own resolved TTL.
    pub async fn store_multi_without_blocking(&self, items: &[CacheItem]) -> CacheResult<()> {
        if self.config.disabled || items.is_empty() {
            return Ok(());
        }

        let entries: Vec<StoreEntry<'_>> = items
            .iter()
            .map(|item| StoreEntry {
                key: item.key(),
                value: item.value(),
                ttl_secs: self.decide_ttl(item),
            })
            .collect();
        self.store.set_multi_with_ttl(&entries).await?;
        tracing::debug!(count = entries.len(), "cache multi set");
        Ok(())
    }

    /// Record that the backing store has no entry for `key`.
    pub async fn store_nil(&self, key: &str) -> CacheResult<()> {
        let item = CacheItem::with_ttl(key, NIL_VALUE, self.config.nil_ttl);
        self.store_without_blocking(&item).await
    }

    /// Invalidate keys after a write to the backing store.
    pub async fn delete_by_keys(&self, keys: &[String]) -> CacheResult<()> {
        if self.config.disabled || keys.is_empty() {
            return Ok(());
        }
        self.store.delete_keys(keys).await?;
        tracing::debug!(keys = ?keys, "cache invalidated");
        Ok(())
    }

    /// Increment a counter, creating it at zero first. Returns the new
    /// value, or 0 when caching is disabled.
    pub async fn increase_by_one(&self, key: &str) -> CacheResult<i64> {
        if self.config.disabled {
            return Ok(0);
        }
        self.store.increment(key).await
    }

    /// Reset the TTL of an existing key.
    pub async fn expire(&self, key: &str, ttl: Duration) -> CacheResult<()> {
        if self.config.disabled {
            return Ok(());
        }
        let existed = self.store.expire(key, ttl).await?;
        if !existed {
            tracing::debug!(key = %key, "expire on missing key");
        }
        Ok(())
    }

    /// Remaining lifetime of `key`.
    pub async fn ttl_of(&self, key: &str) -> CacheResult<KeyTtl> {
        if self.config.disabled {
            return Ok(KeyTtl::Missing);
        }
        let seconds = self.store.ttl_of(key).await?;
        Ok(KeyTtl::from_seconds(seconds))
    }

    fn decide_ttl(&self, item: &CacheItem) -> u64 {
        match item.ttl_seconds() {
            0 => self.config.default_ttl.as_secs(),
            ttl => ttl,
        }
    }

    async fn check_cache(&self, key: &str) -> Option<CachedValue> {
        match self.store.get(key).await {
            Ok(Some(data)) => {
                tracing::debug!(key = %key, "cache hit");
                Some(CachedValue::from_bytes(data))
            }
            Ok(None) => {
                tracing::debug!(key = %key, "cache miss");
                None
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "cache GET failed, treating as miss");
                None
            }
        }
    }

    async fn try_lock(&self, key: &str) -> LockAttempt {
        match self
            .lock
            .acquire(key, self.config.lock_duration, self.config.lock_max_tries)
            .await
        {
            Ok(Some(lock)) => LockAttempt::Acquired(lock),
            Ok(None) => LockAttempt::Contended,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "lock backend unavailable, bypassing cache");
                LockAttempt::Unavailable
            }
        }
    }

    async fn is_locked(&self, key: &str) -> bool {
        match self.lock.is_held(key).await {
            Ok(held) => held,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "lock probe failed");
                false
            }
        }
    }
}
