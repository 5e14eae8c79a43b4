//! Wiring of the cache and repositories from configuration.

use std::sync::Arc;

use accountd_cache::{
    CacheManager, CacheResult, MemoryStore, RedisLock, RedisStore, create_redis_pool,
};

use crate::config::AppConfig;
use crate::config::loader::load_config;
use crate::error::BootstrapError;
use crate::observability::init_tracing;
use crate::repository::{PermissionRepository, SessionRepository, UserRepository};
use crate::store::{PermissionStore, SessionStore, UserStore};

/// Configuration and cache shared by every repository in the process.
pub struct Services {
    pub config: AppConfig,
    pub cache: Arc<CacheManager>,
}

impl Services {
    pub fn repositories(
        &self,
        user_store: Arc<dyn UserStore>,
        session_store: Arc<dyn SessionStore>,
        permission_store: Arc<dyn PermissionStore>,
    ) -> Repositories {
        Repositories::new(
            &self.config,
            Arc::clone(&self.cache),
            user_store,
            session_store,
            permission_store,
        )
    }
}

/// Start-up sequence: `.env`, configuration, tracing, then the cache.
///
/// `config_path` falls back to `accountd.toml` in the working directory.
pub async fn init(config_path: Option<&str>) -> Result<Services, BootstrapError> {
    load_dotenv();
    let config = load_config(config_path).map_err(BootstrapError::Config)?;
    init_tracing(&config.logging);
    let cache = build_cache_manager(&config).await?;
    tracing::info!(
        redis = config.redis.enabled,
        disabled = config.cache.disabled,
        "cache ready"
    );
    Ok(Services { config, cache })
}

/// Load `.env` if present. A missing file is not an error.
pub fn load_dotenv() {
    if let Err(e) = dotenvy::dotenv() {
        if !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            eprintln!("Warning: Failed to load .env file: {e}");
        }
    }
}

/// Build the cache manager described by `config`.
///
/// With Redis disabled the manager runs over an in-process store. Otherwise
/// a malformed URL is fatal, while an unreachable server is only logged:
/// the manager degrades to reading through until Redis comes back.
pub async fn build_cache_manager(config: &AppConfig) -> CacheResult<Arc<CacheManager>> {
    let manager_config = config.cache.manager_config();

    if !config.redis.enabled {
        tracing::info!("Redis disabled, using in-process cache");
        let store = MemoryStore::new();
        let manager = CacheManager::new(manager_config, Arc::new(store.clone()), Arc::new(store))?;
        return Ok(Arc::new(manager));
    }

    let cache_pool = create_redis_pool(&config.redis.cache_pool())?;
    let lock_pool = if config.redis.has_separate_lock_store() {
        create_redis_pool(&config.redis.lock_pool())?
    } else {
        cache_pool.clone()
    };

    let store = RedisStore::new(cache_pool);
    probe("cache", &store).await;
    if config.redis.has_separate_lock_store() {
        probe("lock", &RedisStore::new(lock_pool.clone())).await;
    }

    let manager = CacheManager::new(
        manager_config,
        Arc::new(store),
        Arc::new(RedisLock::new(lock_pool)),
    )?;
    Ok(Arc::new(manager))
}

async fn probe(role: &str, store: &RedisStore) {
    match store.ping().await {
        Ok(()) => tracing::info!(role, "Connected to Redis"),
        Err(e) => tracing::warn!(
            role,
            error = %e,
            "Failed to connect to Redis. Lookups will read through until it is reachable."
        ),
    }
}

/// The repositories sharing one cache manager.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<UserRepository>,
    pub sessions: Arc<SessionRepository>,
    pub permissions: Arc<PermissionRepository>,
}

impl Repositories {
    pub fn new(
        config: &AppConfig,
        cache: Arc<CacheManager>,
        user_store: Arc<dyn UserStore>,
        session_store: Arc<dyn SessionStore>,
        permission_store: Arc<dyn PermissionStore>,
    ) -> Self {
        let users = Arc::new(UserRepository::new(
            user_store,
            Arc::clone(&cache),
            config.login.clone(),
        ));
        let sessions = Arc::new(SessionRepository::new(
            session_store,
            Arc::clone(&cache),
            Arc::clone(&users),
        ));
        let permissions = Arc::new(PermissionRepository::new(permission_store, cache));
        Self {
            users,
            sessions,
            permissions,
        }
    }
}
