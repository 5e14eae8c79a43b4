//! In-process store for single-instance deployments and tests.
//!
//! Mirrors the Redis semantics the manager relies on: per-key expiry,
//! `-2`/`-1` TTL sentinels, counters that keep their TTL when incremented,
//! and `SET NX` style lock acquisition. Locks live in the same keyspace as
//! cache entries, exactly as they do on the shared store.

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::error::{CacheError, CacheResult};
use crate::keys::lock_key;
use crate::lock::{DistributedLock, Lock};
use crate::store::{KeyValueStore, StoreEntry};

/// Entry count above which writes start sweeping expired entries.
pub const DEFAULT_SWEEP_THRESHOLD: usize = 10_000;

/// Minimum spacing between two sweeps.
const SWEEP_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl MemoryEntry {
    fn new(value: Vec<u8>, ttl: Option<Duration>) -> Self {
        Self {
            value,
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// DashMap-backed implementation of [`KeyValueStore`] and [`DistributedLock`].
///
/// Clones share the same underlying map. Expired entries are dropped lazily
/// on read, and swept in bulk by writes once the map holds more than the
/// sweep threshold.
#[derive(Clone)]
pub struct MemoryStore {
    entries: Arc<DashMap<String, MemoryEntry>>,
    // Held exclusively by multi-key writes so reads never observe half a batch.
    batch: Arc<RwLock<()>>,
    last_sweep: Arc<Mutex<Instant>>,
    sweep_threshold: usize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::with_sweep_threshold(DEFAULT_SWEEP_THRESHOLD)
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that sweeps expired entries once it holds `threshold` or more.
    pub fn with_sweep_threshold(threshold: usize) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            batch: Arc::new(RwLock::new(())),
            last_sweep: Arc::new(Mutex::new(Instant::now())),
            sweep_threshold: threshold,
        }
    }

    /// Number of live entries, locks included.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.iter().filter(|e| !e.is_expired(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop expired entries. Returns how many were removed.
    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            if entry.is_expired(now) {
                removed += 1;
                false
            } else {
                true
            }
        });
        removed
    }

    /// Sweep when the map is over the threshold and the last sweep is at
    /// least [`SWEEP_INTERVAL`] old. Must not be called while holding an
    /// entry guard.
    fn maybe_sweep(&self) {
        if self.entries.len() < self.sweep_threshold {
            return;
        }
        // Another writer is already sweeping.
        let Ok(mut last) = self.last_sweep.try_lock() else {
            return;
        };
        let now = Instant::now();
        if now.duration_since(*last) < SWEEP_INTERVAL {
            return;
        }
        *last = now;
        let removed = self.cleanup_expired();
        debug!(
            removed,
            remaining = self.entries.len(),
            "swept expired memory cache entries"
        );
    }

    fn live_value(&self, key: &str) -> Option<Vec<u8>> {
        let _batch = self.batch.read().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired(now) {
                return Some(entry.value.clone());
            }
        }
        self.entries.remove_if(key, |_, entry| entry.is_expired(now));
        None
    }

    fn insert(&self, key: &str, value: &[u8], ttl_secs: u64) {
        self.entries.insert(
            key.to_string(),
            MemoryEntry::new(value.to_vec(), Some(Duration::from_secs(ttl_secs))),
        );
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        Ok(self.live_value(key))
    }

    async fn set_with_ttl(&self, entry: StoreEntry<'_>) -> CacheResult<()> {
        self.maybe_sweep();
        self.insert(entry.key, entry.value, entry.ttl_secs);
        Ok(())
    }

    async fn set_multi_with_ttl(&self, entries: &[StoreEntry<'_>]) -> CacheResult<()> {
        self.maybe_sweep();
        let _batch = self.batch.write().unwrap_or_else(PoisonError::into_inner);
        for entry in entries {
            self.insert(entry.key, entry.value, entry.ttl_secs);
        }
        Ok(())
    }

    async fn delete_keys(&self, keys: &[String]) -> CacheResult<()> {
        let _batch = self.batch.write().unwrap_or_else(PoisonError::into_inner);
        for key in keys {
            self.entries.remove(key);
        }
        Ok(())
    }

    async fn increment(&self, key: &str) -> CacheResult<i64> {
        self.maybe_sweep();
        let now = Instant::now();
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_expired(now) {
                    occupied.insert(MemoryEntry::new(b"1".to_vec(), None));
                    return Ok(1);
                }
                let current = std::str::from_utf8(&occupied.get().value)
                    .ok()
                    .and_then(|s| s.parse::<i64>().ok())
                    .ok_or_else(|| CacheError::NotAnInteger {
                        key: key.to_string(),
                    })?;
                let next = current.checked_add(1).ok_or_else(|| CacheError::Overflow {
                    key: key.to_string(),
                })?;
                occupied.get_mut().value = next.to_string().into_bytes();
                Ok(next)
            }
            Entry::Vacant(vacant) => {
                vacant.insert(MemoryEntry::new(b"1".to_vec(), None));
                Ok(1)
            }
        }
    }

    async fn expire(&self, key: &str, ttl: Duration) -> CacheResult<bool> {
        let now = Instant::now();
        let secs = ttl.as_secs();
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(occupied) if occupied.get().is_expired(now) || secs == 0 => {
                let was_live = !occupied.get().is_expired(now);
                occupied.remove();
                Ok(was_live)
            }
            Entry::Occupied(mut occupied) => {
                occupied.get_mut().expires_at = Some(now + Duration::from_secs(secs));
                Ok(true)
            }
            Entry::Vacant(_) => Ok(false),
        }
    }

    async fn ttl_of(&self, key: &str) -> CacheResult<i64> {
        let now = Instant::now();
        let Some(entry) = self.entries.get(key) else {
            return Ok(-2);
        };
        match entry.expires_at {
            None => Ok(-1),
            Some(at) if at <= now => Ok(-2),
            Some(at) => {
                let remaining = at.duration_since(now).as_millis() as i64;
                Ok((remaining + 500) / 1000)
            }
        }
    }
}

#[async_trait]
impl DistributedLock for MemoryStore {
    async fn acquire(
        &self,
        cache_key: &str,
        expiry: Duration,
        max_tries: u32,
    ) -> CacheResult<Option<Lock>> {
        self.maybe_sweep();
        let lock = Lock::new(cache_key, expiry);
        for _ in 0..max_tries.max(1) {
            let now = Instant::now();
            let acquired = match self.entries.entry(lock.key().to_string()) {
                Entry::Occupied(mut occupied) => {
                    if occupied.get().is_expired(now) {
                        occupied.insert(MemoryEntry::new(
                            lock.token().as_bytes().to_vec(),
                            Some(expiry),
                        ));
                        true
                    } else {
                        false
                    }
                }
                Entry::Vacant(vacant) => {
                    vacant.insert(MemoryEntry::new(
                        lock.token().as_bytes().to_vec(),
                        Some(expiry),
                    ));
                    true
                }
            };
            if acquired {
                return Ok(Some(lock));
            }
        }
        Ok(None)
    }

    async fn release(&self, lock: &Lock) -> CacheResult<bool> {
        let now = Instant::now();
        let removed = self.entries.remove_if(lock.key(), |_, entry| {
            !entry.is_expired(now) && entry.value == lock.token().as_bytes()
        });
        Ok(removed.is_some())
    }

    async fn is_held(&self, cache_key: &str) -> CacheResult<bool> {
        Ok(self.live_value(&lock_key(cache_key)).is_some())
    }
}
