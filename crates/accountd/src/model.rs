//! Account entities as they are cached and handed to callers.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::Duration;
use time::OffsetDateTime;
use uuid::Uuid;

/// A registered account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: String,
    pub phone_number: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// A login session and its token pair.
///
/// `role` is not persisted with the session; repositories copy it from the
/// owning user when the session is loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: i64,
    pub user_id: Uuid,
    pub access_token: String,
    pub refresh_token: String,
    #[serde(with = "time::serde::rfc3339")]
    pub access_token_expired_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub refresh_token_expired_at: OffsetDateTime,
    pub user_agent: String,
    #[serde(default)]
    pub role: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Session {
    pub fn is_access_token_expired(&self) -> bool {
        OffsetDateTime::now_utc() > self.access_token_expired_at
    }

    /// Remaining life of the access token, zero once expired.
    pub fn access_token_remaining(&self) -> Duration {
        remaining_until(self.access_token_expired_at)
    }

    /// Remaining life of the refresh token, zero once expired.
    pub fn refresh_token_remaining(&self) -> Duration {
        remaining_until(self.refresh_token_expired_at)
    }

    pub fn token(&self, token_type: TokenType) -> &str {
        match token_type {
            TokenType::Access => &self.access_token,
            TokenType::Refresh => &self.refresh_token,
        }
    }
}

fn remaining_until(at: OffsetDateTime) -> Duration {
    Duration::try_from(at - OffsetDateTime::now_utc()).unwrap_or(Duration::ZERO)
}

/// Which half of a session's token pair a lookup refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Access,
    Refresh,
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenType::Access => write!(f, "access"),
            TokenType::Refresh => write!(f, "refresh"),
        }
    }
}

/// New token pair issued by a refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub access_token_expired_at: OffsetDateTime,
    pub refresh_token_expired_at: OffsetDateTime,
    pub user_agent: String,
}

/// One grant row: `role` may perform `action` on `resource`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleResourceAction {
    pub role: String,
    pub resource: String,
    pub action: String,
}

impl RoleResourceAction {
    pub fn new(
        role: impl Into<String>,
        resource: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            role: role.into(),
            resource: resource.into(),
            action: action.into(),
        }
    }
}

/// Snapshot of every grant, keyed role, then resource, then action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission {
    grants: BTreeMap<String, BTreeMap<String, BTreeSet<String>>>,
}

impl Permission {
    pub fn add(&mut self, role: &str, resource: &str, action: &str) {
        self.grants
            .entry(role.to_string())
            .or_default()
            .entry(resource.to_string())
            .or_default()
            .insert(action.to_string());
    }

    pub fn has_access(&self, role: &str, resource: &str, action: &str) -> bool {
        self.grants
            .get(role)
            .and_then(|resources| resources.get(resource))
            .is_some_and(|actions| actions.contains(action))
    }

    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }
}

impl FromIterator<RoleResourceAction> for Permission {
    fn from_iter<I: IntoIterator<Item = RoleResourceAction>>(iter: I) -> Self {
        let mut permission = Permission::default();
        for grant in iter {
            permission.add(&grant.role, &grant.resource, &grant.action);
        }
        permission
    }
}
