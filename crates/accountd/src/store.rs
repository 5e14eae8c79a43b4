//! Backing-store interfaces the repositories read through.
//!
//! These are the source of truth; the cache only ever holds copies of what
//! they return. Absence is `Ok(None)`, never an error.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StoreError;
use crate::model::{RoleResourceAction, Session, SessionTokens, TokenType, User};

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create(&self, user: &User, password_hash: &str) -> StoreResult<()>;

    /// Persist profile changes and return the stored row.
    async fn update(&self, user: &User) -> StoreResult<Option<User>>;

    /// Delete a user, returning the removed row.
    async fn delete_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    async fn find_password_by_id(&self, id: Uuid) -> StoreResult<Option<String>>;

    async fn update_password_by_id(&self, id: Uuid, password_hash: &str) -> StoreResult<()>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persist a new session; the store assigns `id`.
    async fn create(&self, session: &Session) -> StoreResult<Session>;

    async fn find_by_token(&self, token_type: TokenType, token: &str)
    -> StoreResult<Option<Session>>;

    async fn find_by_id(&self, id: i64) -> StoreResult<Option<Session>>;

    async fn update_tokens(&self, id: i64, tokens: &SessionTokens) -> StoreResult<()>;

    async fn delete(&self, id: i64) -> StoreResult<()>;
}

#[async_trait]
pub trait PermissionStore: Send + Sync {
    async fn find_all_role_resource_actions(&self) -> StoreResult<Vec<RoleResourceAction>>;

    /// Grant `action` on `resource` to `role`, creating the resource and
    /// action if needed. Granting twice is not an error.
    async fn create_role_resource_action(&self, grant: &RoleResourceAction) -> StoreResult<()>;
}
