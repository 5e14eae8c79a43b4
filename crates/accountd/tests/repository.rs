//! Repository behaviour over the in-process cache and mock backing stores.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use accountd::config::{AppConfig, LoginConfig};
use accountd::repository::{PERMISSION_KEY, PERMISSION_TTL};
use accountd::{
    PermissionStore, Repositories, RepositoryError, RoleResourceAction, Session, SessionStore,
    SessionTokens, StoreError, StoreResult, TokenType, User, UserStore,
};
use accountd_cache::{CacheManager, CacheManagerConfig, KeyTtl, MemoryStore};
use time::OffsetDateTime;
use uuid::Uuid;

// ============================================================================
// Mock stores
// ============================================================================

#[derive(Default)]
struct MockUserStore {
    users: RwLock<HashMap<Uuid, (User, String)>>,
    loads: AtomicUsize,
    fail: AtomicBool,
    delay: Option<Duration>,
}

impl MockUserStore {
    fn new() -> Self {
        Self::default()
    }

    fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    fn insert(&self, user: User, password_hash: &str) {
        self.users
            .write()
            .unwrap()
            .insert(user.id, (user, password_hash.to_string()));
    }

    fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    async fn begin_read(&self) -> StoreResult<()> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(StoreError::connection("database is down"));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl UserStore for MockUserStore {
    async fn create(&self, user: &User, password_hash: &str) -> StoreResult<()> {
        let mut users = self.users.write().unwrap();
        if users.values().any(|(u, _)| u.email == user.email) {
            return Err(StoreError::already_exists("user", &user.email));
        }
        users.insert(user.id, (user.clone(), password_hash.to_string()));
        Ok(())
    }

    async fn update(&self, user: &User) -> StoreResult<Option<User>> {
        let mut users = self.users.write().unwrap();
        Ok(users.get_mut(&user.id).map(|(stored, _)| {
            *stored = user.clone();
            stored.updated_at = OffsetDateTime::now_utc();
            stored.clone()
        }))
    }

    async fn delete_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.users.write().unwrap().remove(&id).map(|(u, _)| u))
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        self.begin_read().await?;
        Ok(self.users.read().unwrap().get(&id).map(|(u, _)| u.clone()))
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        self.begin_read().await?;
        Ok(self
            .users
            .read()
            .unwrap()
            .values()
            .find(|(u, _)| u.email == email)
            .map(|(u, _)| u.clone()))
    }

    async fn find_password_by_id(&self, id: Uuid) -> StoreResult<Option<String>> {
        self.begin_read().await?;
        Ok(self.users.read().unwrap().get(&id).map(|(_, p)| p.clone()))
    }

    async fn update_password_by_id(&self, id: Uuid, password_hash: &str) -> StoreResult<()> {
        if let Some((_, p)) = self.users.write().unwrap().get_mut(&id) {
            *p = password_hash.to_string();
        }
        Ok(())
    }
}

#[derive(Default)]
struct MockSessionStore {
    sessions: RwLock<HashMap<i64, Session>>,
    next_id: AtomicUsize,
    loads: AtomicUsize,
}

impl MockSessionStore {
    fn new() -> Self {
        Self::default()
    }

    fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl SessionStore for MockSessionStore {
    async fn create(&self, session: &Session) -> StoreResult<Session> {
        let mut created = session.clone();
        created.id = self.next_id.fetch_add(1, Ordering::SeqCst) as i64 + 1;
        self.sessions
            .write()
            .unwrap()
            .insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_by_token(
        &self,
        token_type: TokenType,
        token: &str,
    ) -> StoreResult<Option<Session>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .sessions
            .read()
            .unwrap()
            .values()
            .find(|s| s.token(token_type) == token)
            .cloned()
            // Role is never persisted with the session.
            .map(|mut s| {
                s.role.clear();
                s
            }))
    }

    async fn find_by_id(&self, id: i64) -> StoreResult<Option<Session>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(self.sessions.read().unwrap().get(&id).cloned().map(|mut s| {
            s.role.clear();
            s
        }))
    }

    async fn update_tokens(&self, id: i64, tokens: &SessionTokens) -> StoreResult<()> {
        let mut sessions = self.sessions.write().unwrap();
        let session = sessions
            .get_mut(&id)
            .ok_or_else(|| StoreError::internal(format!("session {id} not found")))?;
        session.access_token = tokens.access_token.clone();
        session.refresh_token = tokens.refresh_token.clone();
        session.access_token_expired_at = tokens.access_token_expired_at;
        session.refresh_token_expired_at = tokens.refresh_token_expired_at;
        session.user_agent = tokens.user_agent.clone();
        session.updated_at = OffsetDateTime::now_utc();
        Ok(())
    }

    async fn delete(&self, id: i64) -> StoreResult<()> {
        self.sessions.write().unwrap().remove(&id);
        Ok(())
    }
}

#[derive(Default)]
struct MockPermissionStore {
    grants: RwLock<Vec<RoleResourceAction>>,
    loads: AtomicUsize,
}

impl MockPermissionStore {
    fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl PermissionStore for MockPermissionStore {
    async fn find_all_role_resource_actions(&self) -> StoreResult<Vec<RoleResourceAction>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(self.grants.read().unwrap().clone())
    }

    async fn create_role_resource_action(&self, grant: &RoleResourceAction) -> StoreResult<()> {
        let mut grants = self.grants.write().unwrap();
        if !grants.contains(grant) {
            grants.push(grant.clone());
        }
        Ok(())
    }
}

// ============================================================================
// Fixtures
// ============================================================================

struct Fixture {
    repos: Repositories,
    cache: Arc<CacheManager>,
    users: Arc<MockUserStore>,
    sessions: Arc<MockSessionStore>,
    permissions: Arc<MockPermissionStore>,
}

fn fixture_with(cache_config: CacheManagerConfig, users: MockUserStore) -> Fixture {
    let store = MemoryStore::new();
    let cache = Arc::new(
        CacheManager::new(cache_config, Arc::new(store.clone()), Arc::new(store)).unwrap(),
    );
    let users = Arc::new(users);
    let sessions = Arc::new(MockSessionStore::new());
    let permissions = Arc::new(MockPermissionStore::default());
    let repos = Repositories::new(
        &AppConfig::default(),
        Arc::clone(&cache),
        users.clone(),
        sessions.clone(),
        permissions.clone(),
    );
    Fixture {
        repos,
        cache,
        users,
        sessions,
        permissions,
    }
}

fn fixture() -> Fixture {
    fixture_with(CacheManagerConfig::default(), MockUserStore::new())
}

fn user(email: &str) -> User {
    let now = OffsetDateTime::now_utc();
    User {
        id: Uuid::new_v4(),
        name: "Jane Doe".into(),
        email: email.into(),
        role: "admin".into(),
        phone_number: "+6281234567890".into(),
        created_at: now,
        updated_at: now,
    }
}

fn session_for(user_id: Uuid, access_token: &str, refresh_token: &str) -> Session {
    let now = OffsetDateTime::now_utc();
    Session {
        id: 0,
        user_id,
        access_token: access_token.into(),
        refresh_token: refresh_token.into(),
        access_token_expired_at: now + time::Duration::minutes(5),
        refresh_token_expired_at: now + time::Duration::hours(1),
        user_agent: "integration-test".into(),
        role: String::new(),
        created_at: now,
        updated_at: now,
    }
}

fn expires_within(ttl: KeyTtl, low: u64, high: u64) -> bool {
    matches!(ttl, KeyTtl::Expires(d) if d >= Duration::from_secs(low) && d <= Duration::from_secs(high))
}

// ============================================================================
// UserRepository
// ============================================================================

#[tokio::test]
async fn test_find_by_id_reads_store_once() {
    let f = fixture();
    let jane = user("jane@example.com");
    f.users.insert(jane.clone(), "hash");

    let first = f.repos.users.find_by_id(jane.id).await.unwrap();
    let second = f.repos.users.find_by_id(jane.id).await.unwrap();

    assert_eq!(first, Some(jane.clone()));
    assert_eq!(second, Some(jane));
    assert_eq!(f.users.loads(), 1);
}

#[tokio::test]
async fn test_missing_user_is_negative_cached() {
    let f = fixture();
    let id = Uuid::new_v4();

    assert_eq!(f.repos.users.find_by_id(id).await.unwrap(), None);
    assert_eq!(f.repos.users.find_by_id(id).await.unwrap(), None);
    assert_eq!(f.users.loads(), 1);

    let ttl = f
        .cache
        .ttl_of(&format!("cache:object:user:id:{id}"))
        .await
        .unwrap();
    assert!(expires_within(ttl, 299, 300), "nil TTL applies, got {ttl:?}");
}

#[tokio::test]
async fn test_find_by_email_goes_through_id_indirection() {
    let f = fixture();
    let jane = user("jane@example.com");
    f.users.insert(jane.clone(), "hash");

    let found = f.repos.users.find_by_email(&jane.email).await.unwrap();
    assert_eq!(found, Some(jane.clone()));
    // One email → id resolution plus one load by id.
    assert_eq!(f.users.loads(), 2);

    let cached = f.cache.get("cache:id:user_email:jane@example.com").await;
    let id_json = format!("\"{}\"", jane.id);
    assert_eq!(
        cached.as_ref().and_then(|v| v.as_bytes()),
        Some(id_json.as_bytes())
    );

    assert_eq!(
        f.repos.users.find_by_email(&jane.email).await.unwrap(),
        Some(jane)
    );
    assert_eq!(f.users.loads(), 2);
}

#[tokio::test]
async fn test_create_clears_negative_email_entry() {
    let f = fixture();
    let jane = user("jane@example.com");

    assert_eq!(f.repos.users.find_by_email(&jane.email).await.unwrap(), None);

    f.repos.users.create(&jane, "hash").await.unwrap();
    assert_eq!(
        f.repos.users.find_by_email(&jane.email).await.unwrap(),
        Some(jane)
    );
}

#[tokio::test]
async fn test_update_invalidates_cached_copy() {
    let f = fixture();
    let jane = user("jane@example.com");
    f.users.insert(jane.clone(), "hash");
    f.repos.users.find_by_id(jane.id).await.unwrap();

    let mut renamed = jane.clone();
    renamed.name = "Jane Smith".into();
    let updated = f.repos.users.update(&renamed).await.unwrap().unwrap();

    assert_eq!(updated.name, "Jane Smith");
    let reread = f.repos.users.find_by_id(jane.id).await.unwrap().unwrap();
    assert_eq!(reread.name, "Jane Smith");
}

#[tokio::test]
async fn test_delete_invalidates_all_user_keys() {
    let f = fixture();
    let jane = user("jane@example.com");
    f.users.insert(jane.clone(), "hash");
    f.repos.users.find_by_email(&jane.email).await.unwrap();
    f.repos.users.find_password_by_id(jane.id).await.unwrap();

    let deleted = f.repos.users.delete_by_id(jane.id).await.unwrap();
    assert_eq!(deleted.map(|u| u.id), Some(jane.id));

    assert_eq!(f.repos.users.find_by_id(jane.id).await.unwrap(), None);
    assert_eq!(f.repos.users.find_by_email(&jane.email).await.unwrap(), None);
    assert_eq!(f.repos.users.find_password_by_id(jane.id).await.unwrap(), None);
}

#[tokio::test]
async fn test_password_cached_until_changed() {
    let f = fixture();
    let jane = user("jane@example.com");
    f.users.insert(jane.clone(), "old-hash");

    assert_eq!(
        f.repos.users.find_password_by_id(jane.id).await.unwrap().as_deref(),
        Some("old-hash")
    );
    assert_eq!(
        f.repos.users.find_password_by_id(jane.id).await.unwrap().as_deref(),
        Some("old-hash")
    );
    assert_eq!(f.users.loads(), 1);

    f.repos
        .users
        .update_password_by_id(jane.id, "new-hash")
        .await
        .unwrap();
    assert_eq!(
        f.repos.users.find_password_by_id(jane.id).await.unwrap().as_deref(),
        Some("new-hash")
    );
}

#[tokio::test]
async fn test_concurrent_lookups_load_once() {
    let f = fixture_with(
        CacheManagerConfig::default(),
        MockUserStore::with_delay(Duration::from_millis(100)),
    );
    let jane = user("jane@example.com");
    f.users.insert(jane.clone(), "hash");

    let mut handles = Vec::new();
    for _ in 0..10 {
        let users = Arc::clone(&f.repos.users);
        let id = jane.id;
        handles.push(tokio::spawn(async move { users.find_by_id(id).await }));
    }
    for handle in handles {
        let found = handle.await.unwrap().unwrap();
        assert_eq!(found.map(|u| u.id), Some(jane.id));
    }

    assert_eq!(f.users.loads(), 1);
}

#[tokio::test]
async fn test_lookup_is_busy_while_another_owner_holds_the_key() {
    let f = fixture_with(
        CacheManagerConfig::default().with_wait_budget(Duration::from_millis(100)),
        MockUserStore::new(),
    );
    let id = Uuid::new_v4();
    let lock = f
        .cache
        .acquire_lock(&format!("cache:object:user:id:{id}"))
        .await
        .unwrap()
        .expect("lock");

    let err = f.repos.users.find_by_id(id).await.unwrap_err();
    assert!(err.is_busy());
    assert_eq!(f.users.loads(), 0);

    f.cache.release(lock).await;
}

#[tokio::test]
async fn test_store_errors_propagate_and_release_the_lock() {
    let f = fixture();
    let jane = user("jane@example.com");
    f.users.insert(jane.clone(), "hash");
    f.users.fail.store(true, Ordering::SeqCst);

    let err = f.repos.users.find_by_id(jane.id).await.unwrap_err();
    assert!(matches!(err, RepositoryError::Store(StoreError::Connection { .. })));

    // The lock was released, so the next caller loads straight away.
    f.users.fail.store(false, Ordering::SeqCst);
    assert_eq!(
        f.repos.users.find_by_id(jane.id).await.unwrap(),
        Some(jane)
    );
}

#[tokio::test]
async fn test_disabled_cache_always_reads_store() {
    let f = fixture_with(
        CacheManagerConfig::default().with_disabled(true),
        MockUserStore::new(),
    );
    let jane = user("jane@example.com");
    f.users.insert(jane.clone(), "hash");

    for _ in 0..3 {
        assert_eq!(
            f.repos.users.find_by_id(jane.id).await.unwrap(),
            Some(jane.clone())
        );
    }
    assert_eq!(f.users.loads(), 3);
}

#[tokio::test]
async fn test_corrupt_entry_is_reported_and_evicted() {
    let f = fixture();
    let jane = user("jane@example.com");
    f.users.insert(jane.clone(), "hash");
    let key = format!("cache:object:user:id:{}", jane.id);
    f.cache
        .store_without_blocking(&accountd_cache::CacheItem::new(key.as_str(), "{not json"))
        .await
        .unwrap();

    let err = f.repos.users.find_by_id(jane.id).await.unwrap_err();
    assert!(matches!(err, RepositoryError::Corrupt { .. }));

    assert_eq!(
        f.repos.users.find_by_id(jane.id).await.unwrap(),
        Some(jane)
    );
}

// ============================================================================
// Login throttling
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_login_locks_after_max_attempts() {
    let f = fixture();
    let email = "jane@example.com";

    assert!(!f.repos.users.is_login_locked(email).await.unwrap());

    for expected in 1..=2 {
        assert_eq!(
            f.repos.users.increment_login_attempts(email).await.unwrap(),
            expected
        );
        assert!(!f.repos.users.is_login_locked(email).await.unwrap());
    }

    assert_eq!(f.repos.users.increment_login_attempts(email).await.unwrap(), 3);
    assert!(f.repos.users.is_login_locked(email).await.unwrap());

    let ttl = f
        .cache
        .ttl_of("cache:login_attempts:email_password:user_email:jane@example.com")
        .await
        .unwrap();
    assert!(expires_within(ttl, 299, 300));

    tokio::time::advance(LoginConfig::default().lock_ttl() + Duration::from_secs(1)).await;
    assert!(!f.repos.users.is_login_locked(email).await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_each_attempt_restarts_lock_window() {
    let f = fixture();
    let email = "jane@example.com";

    for _ in 0..3 {
        f.repos.users.increment_login_attempts(email).await.unwrap();
        tokio::time::advance(Duration::from_secs(200)).await;
    }
    // 600s since the first attempt, 200s since the last.
    assert!(f.repos.users.is_login_locked(email).await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_lock_holds_through_final_half_second() {
    let f = fixture();
    let email = "jane@example.com";

    for _ in 0..3 {
        f.repos.users.increment_login_attempts(email).await.unwrap();
    }
    tokio::time::advance(LoginConfig::default().lock_ttl() - Duration::from_millis(300)).await;

    let ttl = f
        .cache
        .ttl_of("cache:login_attempts:email_password:user_email:jane@example.com")
        .await
        .unwrap();
    assert_eq!(ttl, KeyTtl::Expires(Duration::ZERO));
    assert!(f.repos.users.is_login_locked(email).await.unwrap());
}

// ============================================================================
// SessionRepository
// ============================================================================

#[tokio::test]
async fn test_create_caches_under_three_keys_with_token_ttls() {
    let f = fixture();
    let jane = user("jane@example.com");
    f.users.insert(jane.clone(), "hash");

    let mut input = session_for(jane.id, "access-1", "refresh-1");
    input.role = jane.role.clone();
    let created = f.repos.sessions.create(&input).await.unwrap();
    assert_eq!(created.id, 1);

    let access = f.cache.ttl_of("cache:id:session_token:access-1").await.unwrap();
    let by_id = f.cache.ttl_of("cache:object:session:id:1").await.unwrap();
    let refresh = f.cache.ttl_of("cache:id:session_token:refresh-1").await.unwrap();
    assert!(expires_within(access, 298, 300), "access {access:?}");
    assert!(expires_within(by_id, 298, 300), "by id {by_id:?}");
    assert!(expires_within(refresh, 3598, 3600), "refresh {refresh:?}");

    let found = f
        .repos
        .sessions
        .find_by_token(TokenType::Refresh, "refresh-1")
        .await
        .unwrap();
    assert_eq!(found, Some(created));
    assert_eq!(f.sessions.loads(), 0);
    assert!(f.repos.sessions.check_token("access-1").await);
}

#[tokio::test]
async fn test_loaded_session_carries_user_role() {
    let f = fixture();
    let jane = user("jane@example.com");
    f.users.insert(jane.clone(), "hash");
    let stored = f
        .sessions
        .create(&session_for(jane.id, "access-1", "refresh-1"))
        .await
        .unwrap();

    let found = f
        .repos
        .sessions
        .find_by_token(TokenType::Access, "access-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, stored.id);
    assert_eq!(found.role, "admin");
    assert_eq!(f.sessions.loads(), 1);

    // Loading by token also cached the id key.
    let by_id = f.repos.sessions.find_by_id(stored.id).await.unwrap();
    assert_eq!(by_id.map(|s| s.role), Some("admin".to_string()));
    assert_eq!(f.sessions.loads(), 1);
}

#[tokio::test]
async fn test_unknown_token_is_negative_cached() {
    let f = fixture();

    for _ in 0..2 {
        let found = f
            .repos
            .sessions
            .find_by_token(TokenType::Access, "nope")
            .await
            .unwrap();
        assert_eq!(found, None);
    }
    assert_eq!(f.sessions.loads(), 1);
    assert!(!f.repos.sessions.check_token("nope").await);
}

#[tokio::test]
async fn test_session_without_owner_is_not_cached() {
    let f = fixture();
    let orphan = f
        .sessions
        .create(&session_for(Uuid::new_v4(), "access-1", "refresh-1"))
        .await
        .unwrap();

    assert_eq!(f.repos.sessions.find_by_id(orphan.id).await.unwrap(), None);
    assert_eq!(f.repos.sessions.find_by_id(orphan.id).await.unwrap(), None);
    assert_eq!(f.sessions.loads(), 2);
    assert!(!f.repos.sessions.check_token("access-1").await);
}

#[tokio::test]
async fn test_refresh_token_swaps_cached_tokens() {
    let f = fixture();
    let jane = user("jane@example.com");
    f.users.insert(jane.clone(), "hash");
    let old = f
        .repos
        .sessions
        .create(&session_for(jane.id, "access-1", "refresh-1"))
        .await
        .unwrap();

    let now = OffsetDateTime::now_utc();
    let refreshed = f
        .repos
        .sessions
        .refresh_token(
            &old,
            SessionTokens {
                access_token: "access-2".into(),
                refresh_token: "refresh-2".into(),
                access_token_expired_at: now + time::Duration::minutes(5),
                refresh_token_expired_at: now + time::Duration::hours(1),
                user_agent: "integration-test".into(),
            },
        )
        .await
        .unwrap()
        .unwrap();

    assert_eq!(refreshed.id, old.id);
    assert_eq!(refreshed.access_token, "access-2");
    assert_eq!(refreshed.role, "admin");

    assert!(!f.repos.sessions.check_token("access-1").await);
    assert!(!f.repos.sessions.check_token("refresh-1").await);
    assert!(f.repos.sessions.check_token("access-2").await);
    assert!(f.repos.sessions.check_token("refresh-2").await);
}

#[tokio::test]
async fn test_delete_invalidates_session_keys() {
    let f = fixture();
    let jane = user("jane@example.com");
    f.users.insert(jane.clone(), "hash");
    let created = f
        .repos
        .sessions
        .create(&session_for(jane.id, "access-1", "refresh-1"))
        .await
        .unwrap();
    assert!(f.repos.sessions.check_token("access-1").await);

    f.repos.sessions.delete(&created).await.unwrap();

    assert!(!f.repos.sessions.check_token("access-1").await);
    assert!(!f.repos.sessions.check_token("refresh-1").await);
    assert_eq!(f.repos.sessions.find_by_id(created.id).await.unwrap(), None);
}

// ============================================================================
// PermissionRepository
// ============================================================================

async fn grant(f: &Fixture, role: &str, resource: &str, action: &str) {
    f.repos
        .permissions
        .create_role_resource_action(&RoleResourceAction::new(role, resource, action))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_permission_snapshot_loaded_once() {
    let f = fixture();
    grant(&f, "admin", "user", "read").await;
    grant(&f, "admin", "user", "write").await;
    grant(&f, "member", "user", "read").await;

    let first = f.repos.permissions.load_permission().await.unwrap();
    let second = f.repos.permissions.load_permission().await.unwrap();

    assert_eq!(f.permissions.loads(), 1);
    assert_eq!(first, second);
    assert!(second.has_access("admin", "user", "write"));
    assert!(!second.has_access("member", "user", "write"));
}

#[tokio::test]
async fn test_permission_snapshot_cached_for_a_day() {
    let f = fixture();
    grant(&f, "admin", "user", "read").await;
    f.repos.permissions.load_permission().await.unwrap();

    let ttl = f.cache.ttl_of(PERMISSION_KEY).await.unwrap();
    let day = PERMISSION_TTL.as_secs();
    assert!(expires_within(ttl, day - 1, day));
}

#[tokio::test]
async fn test_empty_grant_table_is_cached_too() {
    let f = fixture();

    assert!(f.repos.permissions.load_permission().await.unwrap().is_empty());
    assert!(f.repos.permissions.load_permission().await.unwrap().is_empty());
    assert_eq!(f.permissions.loads(), 1);
}

#[tokio::test]
async fn test_new_grant_invalidates_snapshot() {
    let f = fixture();
    grant(&f, "admin", "user", "read").await;
    let before = f.repos.permissions.load_permission().await.unwrap();
    assert!(!before.has_access("member", "user", "read"));

    grant(&f, "member", "user", "read").await;
    let after = f.repos.permissions.load_permission().await.unwrap();

    assert_eq!(f.permissions.loads(), 2);
    assert!(after.has_access("member", "user", "read"));
    // Snapshots handed out earlier are never mutated.
    assert!(!before.has_access("member", "user", "read"));
}
