//! Tenant-scoped cache keys.
//!
//! A [`TenantScopedKey`] cannot be built without a tenant id, and the cache
//! stores each tenant in its own partition, so a lookup can never see
//! another tenant's entry.

use super::traits::CacheableEntity;
use actionmgt_core::{EntityId, TenantId};

/// A cache key bound to one tenant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TenantScopedKey<K> {
    inner: TenantKeyInner<K>,
}

/// Private so keys only come from the constructors below.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TenantKeyInner<K> {
    tenant_id: TenantId,
    key: K,
}

impl<K> TenantScopedKey<K> {
    pub fn new(tenant_id: TenantId, key: K) -> Self {
        Self {
            inner: TenantKeyInner { tenant_id, key },
        }
    }

    pub fn tenant_id(&self) -> TenantId {
        self.inner.tenant_id
    }

    pub fn key(&self) -> &K {
        &self.inner.key
    }

    pub(crate) fn into_parts(self) -> (TenantId, K) {
        (self.inner.tenant_id, self.inner.key)
    }
}

impl TenantScopedKey<EntityId> {
    /// Key of an entity by id.
    pub fn entity(tenant_id: TenantId, entity_id: &str) -> Self {
        Self::new(tenant_id, entity_id.to_string())
    }

    /// Key under which `entity` itself is cached.
    pub fn for_entity<T: CacheableEntity>(tenant_id: TenantId, entity: &T) -> Self {
        Self::entity(tenant_id, entity.entity_id())
    }
}
