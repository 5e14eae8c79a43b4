//! # accountd-cache
//!
//! Cache-aside client with stampede protection for the account service
//! repositories.
//!
//! ## Overview
//!
//! Every repository lookup funnels through [`CacheManager::get_or_lock`]:
//!
//! ```text
//! repository → CacheManager → KeyValueStore (Redis) → hit
//!                   │
//!                   └──────→ DistributedLock (Redis) → owner loads from DB
//! ```
//!
//! For a hot key at most one caller (across every process sharing the store)
//! recomputes the value; the others wait on a jittered backoff for it to
//! appear, or fail with [`CacheError::WaitTooLong`] once the wait budget is
//! spent.
//!
//! ## Example
//!
//! ```ignore
//! use accountd_cache::{CacheItem, CacheLookup, CacheManager};
//!
//! async fn find(cache: &CacheManager, key: &str) -> Result<Option<Vec<u8>>, Box<dyn std::error::Error>> {
//!     match cache.get_or_lock(key).await? {
//!         CacheLookup::Hit(value) => Ok(value.as_bytes().map(<[u8]>::to_vec)),
//!         CacheLookup::Owner(lock) => {
//!             let loaded = load_from_db(key).await?;
//!             match &loaded {
//!                 Some(bytes) => cache.store_without_blocking(&CacheItem::new(key, bytes.clone())).await?,
//!                 None => cache.store_nil(key).await?,
//!             }
//!             cache.release(lock).await;
//!             Ok(loaded)
//!         }
//!         CacheLookup::Bypass => load_from_db(key).await,
//!     }
//! }
//! ```
//!
//! ## Backends
//!
//! - [`RedisStore`] / [`RedisLock`]: shared Redis, pooled with `deadpool-redis`
//! - [`MemoryStore`]: in-process DashMap for single-instance mode and tests

pub mod backoff;
pub mod config;
mod error;
pub mod item;
pub mod keys;
pub mod lock;
pub mod manager;
pub mod memory;
pub mod pool;
pub mod store;

pub use backoff::Backoff;
pub use config::CacheManagerConfig;
pub use error::{CacheError, CacheResult};
pub use item::{CacheItem, CachedValue, KeyTtl};
pub use lock::{DistributedLock, Lock, RedisLock};
pub use manager::{CacheLookup, CacheManager};
pub use memory::MemoryStore;
pub use pool::{RedisPoolConfig, create_redis_pool, validate_redis_url};
pub use store::{KeyValueStore, RedisStore, StoreEntry};
