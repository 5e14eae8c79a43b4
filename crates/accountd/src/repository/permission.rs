use std::sync::Arc;
use std::time::Duration;

use accountd_cache::{CacheItem, CacheManager};
use tracing::instrument;

use super::{Lookup, invalidate, lookup, release};
use crate::error::RepositoryResult;
use crate::model::{Permission, RoleResourceAction};
use crate::store::PermissionStore;

/// The whole grant table is cached as one snapshot under this key.
pub const PERMISSION_KEY: &str = "cache:object:rbac:permission";

/// Grants change rarely; the snapshot outlives the default TTL.
pub const PERMISSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Role → resource → action grants, cached as a single immutable snapshot.
pub struct PermissionRepository {
    store: Arc<dyn PermissionStore>,
    cache: Arc<CacheManager>,
}

impl PermissionRepository {
    pub fn new(store: Arc<dyn PermissionStore>, cache: Arc<CacheManager>) -> Self {
        Self { store, cache }
    }

    #[instrument(skip(self))]
    pub async fn load_permission(&self) -> RepositoryResult<Arc<Permission>> {
        let lock = match lookup::<Permission>(&self.cache, PERMISSION_KEY).await? {
            Lookup::Cached(permission) => return Ok(Arc::new(permission.unwrap_or_default())),
            Lookup::Load(lock) => lock,
        };

        let result = self.load_from_store().await;
        release(&self.cache, lock).await;
        result.map(Arc::new)
    }

    async fn load_from_store(&self) -> RepositoryResult<Permission> {
        let permission: Permission = self
            .store
            .find_all_role_resource_actions()
            .await?
            .into_iter()
            .collect();

        let item = CacheItem::with_ttl(
            PERMISSION_KEY,
            serde_json::to_vec(&permission)?,
            PERMISSION_TTL,
        );
        if let Err(e) = self.cache.store_without_blocking(&item).await {
            tracing::warn!(key = PERMISSION_KEY, error = %e, "failed to fill cache");
        }
        Ok(permission)
    }

    #[instrument(
        skip(self, grant),
        fields(role = %grant.role, resource = %grant.resource, action = %grant.action)
    )]
    pub async fn create_role_resource_action(
        &self,
        grant: &RoleResourceAction,
    ) -> RepositoryResult<()> {
        self.store.create_role_resource_action(grant).await?;
        invalidate(&self.cache, vec![PERMISSION_KEY.to_string()]).await;
        Ok(())
    }
}
