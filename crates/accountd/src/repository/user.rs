use std::sync::Arc;

use accountd_cache::{CacheError, CacheManager, CachedValue, keys};
use tracing::instrument;
use uuid::Uuid;

use super::{Lookup, fill, fill_nil, invalidate, lookup, release};
use crate::config::LoginConfig;
use crate::error::RepositoryResult;
use crate::model::User;
use crate::store::UserStore;

/// Users, cached by id with an email → id indirection.
pub struct UserRepository {
    store: Arc<dyn UserStore>,
    cache: Arc<CacheManager>,
    login: LoginConfig,
}

impl UserRepository {
    pub fn new(store: Arc<dyn UserStore>, cache: Arc<CacheManager>, login: LoginConfig) -> Self {
        Self {
            store,
            cache,
            login,
        }
    }

    #[instrument(skip(self, user, password_hash), fields(user_id = %user.id))]
    pub async fn create(&self, user: &User, password_hash: &str) -> RepositoryResult<()> {
        self.store.create(user, password_hash).await?;
        // Drops negative entries left by lookups made before the user existed.
        invalidate(&self.cache, user_keys(user.id, &user.email)).await;
        Ok(())
    }

    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn update(&self, user: &User) -> RepositoryResult<Option<User>> {
        let Some(updated) = self.store.update(user).await? else {
            return Ok(None);
        };
        let mut keys = user_keys(updated.id, &updated.email);
        if user.email != updated.email {
            keys.push(email_key(&user.email));
        }
        invalidate(&self.cache, keys).await;
        self.find_by_id(updated.id).await
    }

    #[instrument(skip(self))]
    pub async fn delete_by_id(&self, id: Uuid) -> RepositoryResult<Option<User>> {
        let deleted = self.store.delete_by_id(id).await?;
        let keys = match &deleted {
            Some(user) => user_keys(user.id, &user.email),
            None => vec![id_key(id), password_key(id)],
        };
        invalidate(&self.cache, keys).await;
        Ok(deleted)
    }

    #[instrument(skip(self))]
    pub async fn find_by_id(&self, id: Uuid) -> RepositoryResult<Option<User>> {
        let key = id_key(id);
        let lock = match lookup(&self.cache, &key).await? {
            Lookup::Cached(user) => return Ok(user),
            Lookup::Load(lock) => lock,
        };

        let result = self.load_by_id(id, &key).await;
        release(&self.cache, lock).await;
        result
    }

    async fn load_by_id(&self, id: Uuid, key: &str) -> RepositoryResult<Option<User>> {
        match self.store.find_by_id(id).await? {
            Some(user) => {
                fill(&self.cache, key, &user).await;
                Ok(Some(user))
            }
            None => {
                fill_nil(&self.cache, key).await;
                Ok(None)
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<User>> {
        let key = email_key(email);
        let lock = match lookup::<Uuid>(&self.cache, &key).await? {
            Lookup::Cached(Some(id)) => return self.find_by_id(id).await,
            Lookup::Cached(None) => return Ok(None),
            Lookup::Load(lock) => lock,
        };

        let result = self.load_id_by_email(email, &key).await;
        release(&self.cache, lock).await;
        match result? {
            Some(id) => self.find_by_id(id).await,
            None => Ok(None),
        }
    }

    async fn load_id_by_email(&self, email: &str, key: &str) -> RepositoryResult<Option<Uuid>> {
        match self.store.find_by_email(email).await? {
            Some(user) => {
                fill(&self.cache, key, &user.id).await;
                Ok(Some(user.id))
            }
            None => {
                fill_nil(&self.cache, key).await;
                Ok(None)
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn find_password_by_id(&self, id: Uuid) -> RepositoryResult<Option<String>> {
        let key = password_key(id);
        let lock = match lookup(&self.cache, &key).await? {
            Lookup::Cached(hash) => return Ok(hash),
            Lookup::Load(lock) => lock,
        };

        let result = match self.store.find_password_by_id(id).await {
            Ok(Some(hash)) => {
                fill(&self.cache, &key, &hash).await;
                Ok(Some(hash))
            }
            Ok(None) => {
                fill_nil(&self.cache, &key).await;
                Ok(None)
            }
            Err(e) => Err(e.into()),
        };
        release(&self.cache, lock).await;
        result
    }

    #[instrument(skip(self, password_hash))]
    pub async fn update_password_by_id(&self, id: Uuid, password_hash: &str) -> RepositoryResult<()> {
        self.store.update_password_by_id(id, password_hash).await?;
        invalidate(&self.cache, vec![password_key(id), id_key(id)]).await;
        Ok(())
    }

    /// Count a failed email/password login. Every attempt restarts the lock
    /// window. Returns the attempts counted so far in the window.
    #[instrument(skip(self))]
    pub async fn increment_login_attempts(&self, email: &str) -> RepositoryResult<i64> {
        let key = login_attempts_key(email);
        let attempts = self.cache.increase_by_one(&key).await?;
        self.cache.expire(&key, self.login.lock_ttl()).await?;
        if attempts >= self.login.max_attempts {
            tracing::info!(attempts, "login by email/password locked");
        }
        Ok(attempts)
    }

    /// True once `max_attempts` failures have been counted inside an
    /// unexpired window.
    #[instrument(skip(self))]
    pub async fn is_login_locked(&self, email: &str) -> RepositoryResult<bool> {
        let key = login_attempts_key(email);
        if !self.cache.ttl_of(&key).await?.is_live() {
            return Ok(false);
        }

        let attempts = match self.cache.get(&key).await {
            Some(CachedValue::Value(bytes)) => std::str::from_utf8(&bytes)
                .ok()
                .and_then(|s| s.parse::<i64>().ok())
                .ok_or(CacheError::NotAnInteger { key })?,
            Some(CachedValue::Nil) | None => 0,
        };
        Ok(attempts >= self.login.max_attempts)
    }
}

fn id_key(id: Uuid) -> String {
    keys::object_key("user", id)
}

fn email_key(email: &str) -> String {
    keys::id_key("user_email", email)
}

fn password_key(id: Uuid) -> String {
    format!("cache:password:id:{id}")
}

fn login_attempts_key(email: &str) -> String {
    format!("cache:login_attempts:email_password:user_email:{email}")
}

fn user_keys(id: Uuid, email: &str) -> Vec<String> {
    vec![id_key(id), email_key(email), password_key(id)]
}
