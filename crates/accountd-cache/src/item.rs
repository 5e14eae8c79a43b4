//! Value objects handed to and returned from the store.

use std::sync::Arc;
use std::time::Duration;

use crate::keys::NIL_VALUE;

/// A value ready to be written to the cache.
///
/// A zero TTL defers to the manager's default TTL when the item is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheItem {
    key: String,
    value: Vec<u8>,
    ttl: Duration,
}

impl CacheItem {
    /// Create an item that uses the manager's default TTL.
    pub fn new(key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self::with_ttl(key, value, Duration::ZERO)
    }

    /// Create an item with an explicit TTL.
    pub fn with_ttl(key: impl Into<String>, value: impl Into<Vec<u8>>, ttl: Duration) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            ttl,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// TTL in whole seconds, the store's granularity. Sub-second TTLs round
    /// down to zero and therefore fall back to the default.
    pub fn ttl_seconds(&self) -> u64 {
        self.ttl.as_secs()
    }
}

/// A value read back from the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachedValue {
    /// A positive entry.
    Value(Arc<Vec<u8>>),
    /// The negative-cache sentinel: the backing store confirmed absence.
    Nil,
}

impl CachedValue {
    /// Decode raw bytes, mapping the sentinel to [`CachedValue::Nil`].
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        if bytes == NIL_VALUE {
            CachedValue::Nil
        } else {
            CachedValue::Value(Arc::new(bytes))
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, CachedValue::Nil)
    }

    /// The cached bytes, or `None` for a negative entry.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            CachedValue::Value(data) => Some(data.as_slice()),
            CachedValue::Nil => None,
        }
    }
}

/// Remaining lifetime of a key, decoded from the store's TTL protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTtl {
    /// The key does not exist (`-2`).
    Missing,
    /// The key exists without an expiry (`-1`).
    Persistent,
    /// The key expires after the given duration.
    Expires(Duration),
}

impl KeyTtl {
    pub fn from_seconds(seconds: i64) -> Self {
        match seconds {
            -1 => KeyTtl::Persistent,
            s if s < 0 => KeyTtl::Missing,
            s => KeyTtl::Expires(Duration::from_secs(s as u64)),
        }
    }

    /// The raw `-2`/`-1`/seconds encoding.
    pub fn as_seconds(&self) -> i64 {
        match self {
            KeyTtl::Missing => -2,
            KeyTtl::Persistent => -1,
            KeyTtl::Expires(d) => d.as_secs() as i64,
        }
    }

    /// True when the key exists with an expiry. `Expires(0)` is still live:
    /// Redis rounds the last half second down to zero.
    pub fn is_live(&self) -> bool {
        matches!(self, KeyTtl::Expires(_))
    }
}
