//! Cache-aside repositories over the backing stores.
//!
//! Every read follows the same shape: `get_or_lock` the key, return a hit
//! directly, otherwise load from the store while holding the lock, fill the
//! cache (or record absence), and release. Writes go to the store first and
//! then invalidate every key that could hold a copy of the changed row.

mod permission;
mod session;
mod user;

pub use permission::{PERMISSION_KEY, PERMISSION_TTL, PermissionRepository};
pub use session::SessionRepository;
pub use user::UserRepository;

use accountd_cache::{CacheItem, CacheLookup, CacheManager, CachedValue, Lock};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{RepositoryError, RepositoryResult};

/// Result of the cache half of a read.
pub(crate) enum Lookup<T> {
    /// Answered from cache; `None` is a negative entry.
    Cached(Option<T>),
    /// Not cached. Load from the store, then pass the lock (if any) to
    /// [`release`].
    Load(Option<Lock>),
}

pub(crate) async fn lookup<T: DeserializeOwned>(
    cache: &CacheManager,
    key: &str,
) -> RepositoryResult<Lookup<T>> {
    match cache.get_or_lock(key).await? {
        CacheLookup::Hit(value) => Ok(Lookup::Cached(decode(cache, key, &value).await?)),
        CacheLookup::Owner(lock) => Ok(Lookup::Load(Some(lock))),
        CacheLookup::Bypass => Ok(Lookup::Load(None)),
    }
}

pub(crate) async fn release(cache: &CacheManager, lock: Option<Lock>) {
    if let Some(lock) = lock {
        cache.release(lock).await;
    }
}

/// Decode a hit. An undecodable entry is evicted so the next read reloads it.
pub(crate) async fn decode<T: DeserializeOwned>(
    cache: &CacheManager,
    key: &str,
    value: &CachedValue,
) -> RepositoryResult<Option<T>> {
    let Some(bytes) = value.as_bytes() else {
        return Ok(None);
    };
    match serde_json::from_slice(bytes) {
        Ok(decoded) => Ok(Some(decoded)),
        Err(source) => {
            tracing::warn!(key = %key, error = %source, "evicting corrupt cache entry");
            invalidate(cache, vec![key.to_string()]).await;
            Err(RepositoryError::Corrupt {
                key: key.to_string(),
                source,
            })
        }
    }
}

pub(crate) fn encode<T: Serialize>(key: impl Into<String>, value: &T) -> RepositoryResult<CacheItem> {
    Ok(CacheItem::new(key, serde_json::to_vec(value)?))
}

/// Cache `value` under `key` with the default TTL. Failures are logged.
pub(crate) async fn fill<T: Serialize>(cache: &CacheManager, key: &str, value: &T) {
    let result = match encode(key, value) {
        Ok(item) => cache.store_without_blocking(&item).await.map_err(RepositoryError::from),
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        tracing::warn!(key = %key, error = %e, "failed to fill cache");
    }
}

/// Record that the store has no row for `key`. Failures are logged.
pub(crate) async fn fill_nil(cache: &CacheManager, key: &str) {
    if let Err(e) = cache.store_nil(key).await {
        tracing::warn!(key = %key, error = %e, "failed to store negative entry");
    }
}

/// Drop cached copies after a write. Failures are logged; stale entries age
/// out with their TTL.
pub(crate) async fn invalidate(cache: &CacheManager, keys: Vec<String>) {
    if let Err(e) = cache.delete_by_keys(&keys).await {
        tracing::warn!(keys = ?keys, error = %e, "failed to invalidate cache");
    }
}

/// Shortened token for log fields.
pub(crate) fn token_prefix(token: &str) -> &str {
    token.get(..8).unwrap_or(token)
}
