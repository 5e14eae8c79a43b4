use std::sync::Arc;

use accountd_cache::{CacheItem, CacheManager, keys};
use tracing::instrument;

use super::{Lookup, UserRepository, fill_nil, invalidate, lookup, release, token_prefix};
use crate::error::RepositoryResult;
use crate::model::{Session, SessionTokens, TokenType};
use crate::store::SessionStore;

/// Sessions, cached under both tokens and the session id.
///
/// Cached copies carry the owning user's role so token checks never need a
/// second lookup.
pub struct SessionRepository {
    store: Arc<dyn SessionStore>,
    cache: Arc<CacheManager>,
    users: Arc<UserRepository>,
}

impl SessionRepository {
    pub fn new(
        store: Arc<dyn SessionStore>,
        cache: Arc<CacheManager>,
        users: Arc<UserRepository>,
    ) -> Self {
        Self {
            store,
            cache,
            users,
        }
    }

    #[instrument(skip(self, session), fields(user_id = %session.user_id))]
    pub async fn create(&self, session: &Session) -> RepositoryResult<Session> {
        let created = self.store.create(session).await?;
        self.cache_session(&created).await;
        Ok(created)
    }

    #[instrument(skip(self, token), fields(token = token_prefix(token)))]
    pub async fn find_by_token(
        &self,
        token_type: TokenType,
        token: &str,
    ) -> RepositoryResult<Option<Session>> {
        let key = token_key(token);
        let lock = match lookup(&self.cache, &key).await? {
            Lookup::Cached(session) => return Ok(session),
            Lookup::Load(lock) => lock,
        };

        let result = match self.store.find_by_token(token_type, token).await {
            Ok(found) => self.complete(found, &key).await,
            Err(e) => Err(e.into()),
        };
        release(&self.cache, lock).await;
        result
    }

    #[instrument(skip(self))]
    pub async fn find_by_id(&self, id: i64) -> RepositoryResult<Option<Session>> {
        let key = id_key(id);
        let lock = match lookup(&self.cache, &key).await? {
            Lookup::Cached(session) => return Ok(session),
            Lookup::Load(lock) => lock,
        };

        let result = match self.store.find_by_id(id).await {
            Ok(found) => self.complete(found, &key).await,
            Err(e) => Err(e.into()),
        };
        release(&self.cache, lock).await;
        result
    }

    /// Whether `token` belongs to a cached, live session. Never touches the
    /// session store.
    #[instrument(skip(self, token), fields(token = token_prefix(token)))]
    pub async fn check_token(&self, token: &str) -> bool {
        self.cache
            .get(&token_key(token))
            .await
            .is_some_and(|value| !value.is_nil())
    }

    /// Swap the token pair of `old`, returning the session as stored after
    /// the swap.
    #[instrument(skip(self, old, tokens), fields(session_id = old.id))]
    pub async fn refresh_token(
        &self,
        old: &Session,
        tokens: SessionTokens,
    ) -> RepositoryResult<Option<Session>> {
        self.store.update_tokens(old.id, &tokens).await?;

        let mut stale = session_keys(old.id, &old.access_token, &old.refresh_token);
        stale.push(token_key(&tokens.access_token));
        stale.push(token_key(&tokens.refresh_token));
        invalidate(&self.cache, stale).await;

        self.find_by_id(old.id).await
    }

    #[instrument(skip(self, session), fields(session_id = session.id))]
    pub async fn delete(&self, session: &Session) -> RepositoryResult<()> {
        self.store.delete(session.id).await?;
        invalidate(
            &self.cache,
            session_keys(session.id, &session.access_token, &session.refresh_token),
        )
        .await;
        Ok(())
    }

    /// Attach the owner's role to a freshly loaded session and cache it.
    async fn complete(
        &self,
        found: Option<Session>,
        key: &str,
    ) -> RepositoryResult<Option<Session>> {
        let Some(mut session) = found else {
            fill_nil(&self.cache, key).await;
            return Ok(None);
        };

        let Some(user) = self.users.find_by_id(session.user_id).await? else {
            tracing::warn!(session_id = session.id, user_id = %session.user_id, "session owner not found");
            return Ok(None);
        };
        session.role = user.role;

        self.cache_session(&session).await;
        Ok(Some(session))
    }

    /// Write the session under all three keys at once, each living as long
    /// as the token it is reached by.
    async fn cache_session(&self, session: &Session) {
        let bytes = match serde_json::to_vec(session) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(session_id = session.id, error = %e, "failed to encode session");
                return;
            }
        };

        let access_ttl = session.access_token_remaining();
        let items = [
            CacheItem::with_ttl(token_key(&session.access_token), bytes.clone(), access_ttl),
            CacheItem::with_ttl(id_key(session.id), bytes.clone(), access_ttl),
            CacheItem::with_ttl(
                token_key(&session.refresh_token),
                bytes,
                session.refresh_token_remaining(),
            ),
        ];
        if let Err(e) = self.cache.store_multi_without_blocking(&items).await {
            tracing::warn!(session_id = session.id, error = %e, "failed to cache session");
        }
    }
}

fn token_key(token: &str) -> String {
    keys::id_key("session_token", token)
}

fn id_key(id: i64) -> String {
    keys::object_key("session", id)
}

fn session_keys(id: i64, access_token: &str, refresh_token: &str) -> Vec<String> {
    vec![token_key(access_token), token_key(refresh_token), id_key(id)]
}
