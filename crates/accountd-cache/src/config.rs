//! Cache manager configuration.
//!
//! The configuration is fixed when the manager is constructed. There are no
//! setters on [`crate::CacheManager`]; build the final value here first.

use std::time::Duration;

use crate::error::{CacheError, CacheResult};

pub const DEFAULT_TTL: Duration = Duration::from_secs(10);
pub const DEFAULT_NIL_TTL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_LOCK_DURATION: Duration = Duration::from_secs(60);
pub const DEFAULT_LOCK_MAX_TRIES: u32 = 1;
pub const DEFAULT_WAIT_BUDGET: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheManagerConfig {
    /// TTL for items stored without an explicit TTL.
    pub default_ttl: Duration,
    /// TTL for negative (confirmed absent) entries.
    pub nil_ttl: Duration,
    /// Expiry of a recomputation lock; bounds how long a crashed owner can
    /// block waiters.
    pub lock_duration: Duration,
    /// Immediate acquisition attempts before a lock counts as contended.
    pub lock_max_tries: u32,
    /// Wall-clock budget for waiting on another owner.
    pub wait_budget: Duration,
    /// When set, every operation is a no-op and callers always read through.
    pub disabled: bool,
}

impl Default for CacheManagerConfig {
    fn default() -> Self {
        Self {
            default_ttl: DEFAULT_TTL,
            nil_ttl: DEFAULT_NIL_TTL,
            lock_duration: DEFAULT_LOCK_DURATION,
            lock_max_tries: DEFAULT_LOCK_MAX_TRIES,
            wait_budget: DEFAULT_WAIT_BUDGET,
            disabled: false,
        }
    }
}

impl CacheManagerConfig {
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn with_nil_ttl(mut self, ttl: Duration) -> Self {
        self.nil_ttl = ttl;
        self
    }

    pub fn with_lock_duration(mut self, duration: Duration) -> Self {
        self.lock_duration = duration;
        self
    }

    pub fn with_lock_max_tries(mut self, tries: u32) -> Self {
        self.lock_max_tries = tries;
        self
    }

    pub fn with_wait_budget(mut self, budget: Duration) -> Self {
        self.wait_budget = budget;
        self
    }

    pub fn with_disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    /// Reject settings the store cannot honour.
    ///
    /// TTLs are written with whole-second granularity, so both TTLs must be
    /// at least one second.
    pub fn validate(&self) -> CacheResult<()> {
        if self.default_ttl.as_secs() == 0 {
            return Err(CacheError::invalid_config("default_ttl must be >= 1s"));
        }
        if self.nil_ttl.as_secs() == 0 {
            return Err(CacheError::invalid_config("nil_ttl must be >= 1s"));
        }
        if self.lock_duration.as_millis() == 0 {
            return Err(CacheError::invalid_config("lock_duration must be >= 1ms"));
        }
        if self.lock_max_tries == 0 {
            return Err(CacheError::invalid_config("lock_max_tries must be > 0"));
        }
        Ok(())
    }
}
