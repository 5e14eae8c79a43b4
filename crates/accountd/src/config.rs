use accountd_cache::{CacheManagerConfig, RedisPoolConfig};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Redis configuration
    #[serde(default)]
    pub redis: RedisConfig,
    /// Cache-aside policy
    #[serde(default)]
    pub cache: CacheConfig,
    /// Login throttling
    #[serde(default)]
    pub login: LoginConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        // Logging validation
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        // Redis validation
        if self.redis.enabled {
            if self.redis.url.is_empty() {
                return Err("redis.enabled=true requires redis.url".into());
            }
            if self.redis.pool_size == 0 {
                return Err("redis.pool_size must be > 0".into());
            }
            if self.redis.timeout_ms == 0 {
                return Err("redis.timeout_ms must be > 0".into());
            }
        }
        // Cache validation
        if self.cache.default_ttl_secs == 0 {
            return Err("cache.default_ttl_secs must be > 0".into());
        }
        if self.cache.nil_ttl_secs == 0 {
            return Err("cache.nil_ttl_secs must be > 0".into());
        }
        if self.cache.lock_duration_ms == 0 {
            return Err("cache.lock_duration_ms must be > 0".into());
        }
        if self.cache.lock_max_tries == 0 {
            return Err("cache.lock_max_tries must be > 0".into());
        }
        if self.cache.wait_budget_ms == 0 {
            return Err("cache.wait_budget_ms must be > 0".into());
        }
        // Login validation
        if self.login.max_attempts == 0 {
            return Err("login.max_attempts must be > 0".into());
        }
        if self.login.lock_ttl_secs == 0 {
            return Err("login.lock_ttl_secs must be > 0".into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}
fn default_log_level() -> String {
    "info".into()
}
impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Redis connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Use Redis for the cache and locks. When disabled, an in-process store
    /// is used, which only coordinates callers within this process.
    #[serde(default)]
    pub enabled: bool,

    /// Cache connection URL (e.g., "redis://localhost:6379")
    #[serde(default = "default_redis_url")]
    pub url: String,

    /// Lock connection URL. Defaults to `url` when unset.
    #[serde(default)]
    pub lock_url: Option<String>,

    /// Connection pool size (per pool)
    #[serde(default = "default_redis_pool_size")]
    pub pool_size: usize,

    /// Connection timeout in milliseconds
    #[serde(default = "default_redis_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_redis_pool_size() -> usize {
    10
}

fn default_redis_timeout_ms() -> u64 {
    5000
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: default_redis_url(),
            lock_url: None,
            pool_size: default_redis_pool_size(),
            timeout_ms: default_redis_timeout_ms(),
        }
    }
}

impl RedisConfig {
    pub fn cache_pool(&self) -> RedisPoolConfig {
        self.pool_for(&self.url)
    }

    pub fn lock_pool(&self) -> RedisPoolConfig {
        self.pool_for(self.lock_url.as_deref().unwrap_or(&self.url))
    }

    /// True when locks live on a different server than cache entries.
    pub fn has_separate_lock_store(&self) -> bool {
        self.lock_url.as_deref().is_some_and(|url| url != self.url)
    }

    fn pool_for(&self, url: &str) -> RedisPoolConfig {
        RedisPoolConfig {
            url: url.to_string(),
            pool_size: self.pool_size,
            timeout: Duration::from_millis(self.timeout_ms),
        }
    }
}

/// Cache-aside configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Turn every cache operation into a no-op
    #[serde(default)]
    pub disabled: bool,

    /// TTL for entries stored without their own TTL
    #[serde(default = "default_ttl_secs")]
    pub default_ttl_secs: u64,

    /// TTL for negative entries
    #[serde(default = "default_nil_ttl_secs")]
    pub nil_ttl_secs: u64,

    /// Expiry of recomputation locks
    #[serde(default = "default_lock_duration_ms")]
    pub lock_duration_ms: u64,

    /// Immediate lock attempts before a key counts as contended
    #[serde(default = "default_lock_max_tries")]
    pub lock_max_tries: u32,

    /// How long a caller waits on another owner before giving up
    #[serde(default = "default_wait_budget_ms")]
    pub wait_budget_ms: u64,
}

fn default_ttl_secs() -> u64 {
    10
}

fn default_nil_ttl_secs() -> u64 {
    300 // 5 minutes
}

fn default_lock_duration_ms() -> u64 {
    60_000
}

fn default_lock_max_tries() -> u32 {
    1
}

fn default_wait_budget_ms() -> u64 {
    15_000
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            disabled: false,
            default_ttl_secs: default_ttl_secs(),
            nil_ttl_secs: default_nil_ttl_secs(),
            lock_duration_ms: default_lock_duration_ms(),
            lock_max_tries: default_lock_max_tries(),
            wait_budget_ms: default_wait_budget_ms(),
        }
    }
}

impl CacheConfig {
    pub fn manager_config(&self) -> CacheManagerConfig {
        CacheManagerConfig::default()
            .with_default_ttl(Duration::from_secs(self.default_ttl_secs))
            .with_nil_ttl(Duration::from_secs(self.nil_ttl_secs))
            .with_lock_duration(Duration::from_millis(self.lock_duration_ms))
            .with_lock_max_tries(self.lock_max_tries)
            .with_wait_budget(Duration::from_millis(self.wait_budget_ms))
            .with_disabled(self.disabled)
    }
}

/// Login-attempt throttling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginConfig {
    /// Failed attempts allowed before logins are locked
    #[serde(default = "default_login_max_attempts")]
    pub max_attempts: i64,

    /// How long the lock lasts after the last failed attempt
    #[serde(default = "default_login_lock_ttl_secs")]
    pub lock_ttl_secs: u64,
}

fn default_login_max_attempts() -> i64 {
    3
}

fn default_login_lock_ttl_secs() -> u64 {
    300
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_login_max_attempts(),
            lock_ttl_secs: default_login_lock_ttl_secs(),
        }
    }
}

impl LoginConfig {
    pub fn lock_ttl(&self) -> Duration {
        Duration::from_secs(self.lock_ttl_secs)
    }
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    pub const DEFAULT_CONFIG_FILE: &str = "accountd.toml";
    pub const ENV_PREFIX: &str = "ACCOUNTD";

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        match path {
            Some(p) => {
                let pathbuf = PathBuf::from(p);
                if pathbuf.exists() {
                    builder = builder.add_source(File::from(pathbuf));
                }
            }
            None => {
                // Try default root-level file
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    builder = builder.add_source(File::from(default_path));
                }
            }
        }
        // Environment variable overrides, e.g., ACCOUNTD__CACHE__WAIT_BUDGET_MS=500
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}
