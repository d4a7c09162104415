//! Cache-backed action store
//!
//! Decorates any [`ActionStore`] with three tenant-partitioned caches:
//!
//! - entities, keyed by `(tenant, action id)`
//! - per-type listings, keyed by `(tenant, action type)`
//! - per-type counts, one entry per tenant
//!
//! Reads go through the cache and populate it on a miss, except that a miss
//! for an id the store does not have caches nothing. Writes hit the wrapped
//! store first; only when that succeeds are the affected entries
//! invalidated. A failed write leaves the cache as it was. Written values
//! are never put into the cache directly.
//!
//! A cache that fails (its lock was poisoned) never fails the operation: a
//! read falls back to the wrapped store and a committed write reports
//! success after clearing the caches.
//!
//! The caches are local to this value. Another process writing to the same
//! durable store does not invalidate them.

use crate::cache::{CacheStats, CacheableEntity, Lookup, TenantLruCache, TenantScopedKey};
use crate::store::{ActionCounts, ActionStore};
use actionmgt_core::{
    Action, ActionMgtError, ActionMgtResult, ActionPatch, ActionStatus, ActionType,
    Authentication, CacheConfig, EndpointConfig, EntityId, StorageError, TenantId,
};
use async_trait::async_trait;
use std::future::Future;
use std::hash::Hash;

/// Read `key` from `cache`, running `fetch` on a miss and caching a `Some`.
///
/// A failing cache degrades to a plain `fetch`.
pub(crate) async fn read_through<K, V, Fut>(
    cache: &TenantLruCache<K, V>,
    key: TenantScopedKey<K>,
    fetch: Fut,
) -> ActionMgtResult<Option<V>>
where
    K: Hash + Eq + Clone,
    V: Clone,
    Fut: Future<Output = ActionMgtResult<Option<V>>>,
{
    let lookup = match cache.lookup(&key) {
        Ok(lookup) => lookup,
        Err(err) => {
            log_cache_failure(cache.name(), key.tenant_id(), &err);
            return fetch.await;
        }
    };
    match lookup {
        Lookup::Hit(value) => {
            tracing::debug!(cache = cache.name(), tenant_id = %key.tenant_id(), "cache hit");
            Ok(Some(value))
        }
        Lookup::Miss(ticket) => {
            tracing::debug!(cache = cache.name(), tenant_id = %key.tenant_id(), "cache miss");
            let fetched = fetch.await?;
            if let Some(value) = &fetched {
                let tenant_id = key.tenant_id();
                match cache.fill(key, value.clone(), ticket) {
                    Ok(true) => {}
                    Ok(false) => tracing::debug!(
                        cache = cache.name(),
                        "skipped cache fill, invalidated while fetching"
                    ),
                    Err(err) => log_cache_failure(cache.name(), tenant_id, &err),
                }
            }
            Ok(fetched)
        }
    }
}

pub(crate) fn log_cache_failure(cache: &'static str, tenant_id: TenantId, err: &StorageError) {
    tracing::warn!(
        cache,
        tenant_id = %tenant_id,
        error = %err,
        "cache unavailable"
    );
}

pub(crate) fn log_write_failure(
    operation: &'static str,
    tenant_id: TenantId,
    err: ActionMgtError,
) -> ActionMgtError {
    tracing::warn!(
        operation,
        tenant_id = %tenant_id,
        error = %err,
        "store write failed, cache left untouched"
    );
    err
}

pub struct CacheBackedActionStore<S> {
    inner: S,
    enabled: bool,
    entities: TenantLruCache<EntityId, Action>,
    by_type: TenantLruCache<ActionType, Vec<Action>>,
    counts: TenantLruCache<(), ActionCounts>,
}

impl<S: ActionStore> CacheBackedActionStore<S> {
    pub fn new(inner: S, config: &CacheConfig) -> Self {
        let capacity = config.max_entries_per_tenant;
        let tenants = config.max_tenants;
        Self {
            inner,
            enabled: config.enabled,
            entities: TenantLruCache::with_limits("action", capacity, tenants),
            by_type: TenantLruCache::with_limits("action_by_type", capacity, tenants),
            counts: TenantLruCache::with_limits("action_counts", 1, tenants),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Statistics of the entity cache alone.
    pub fn entity_stats(&self) -> CacheStats {
        self.entities.stats()
    }

    /// Statistics of all three caches merged.
    pub fn stats(&self) -> CacheStats {
        self.entities
            .stats()
            .merge(self.by_type.stats())
            .merge(self.counts.stats())
    }

    /// Drop everything cached for one tenant.
    pub fn invalidate_tenant(&self, tenant_id: TenantId) {
        for result in [
            self.entities.invalidate_tenant(tenant_id),
            self.by_type.invalidate_tenant(tenant_id),
            self.counts.invalidate_tenant(tenant_id),
        ] {
            self.recover(tenant_id, result);
        }
    }

    /// Drop one cached action and the listing of its type.
    ///
    /// For callers that found a cached row unusable, e.g. because its secret
    /// references were released by a concurrent write.
    pub fn invalidate_action(&self, tenant_id: TenantId, action_type: ActionType, action_id: &str) {
        self.invalidate_entity(tenant_id, action_id);
        self.invalidate_type(tenant_id, action_type);
    }

    /// Drop the cached listing of one type.
    pub fn invalidate_listing(&self, tenant_id: TenantId, action_type: ActionType) {
        self.invalidate_type(tenant_id, action_type);
    }

    /// Drop every entry of every cache, recovering poisoned locks.
    pub fn clear(&self) {
        self.entities.clear();
        self.by_type.clear();
        self.counts.clear();
    }

    fn recover<T>(&self, tenant_id: TenantId, result: Result<T, StorageError>) {
        if let Err(err) = result {
            log_cache_failure("action", tenant_id, &err);
            self.clear();
        }
    }

    fn invalidate_entity(&self, tenant_id: TenantId, action_id: &str) {
        if self.enabled {
            let result = self
                .entities
                .invalidate(&TenantScopedKey::entity(tenant_id, action_id));
            self.recover(tenant_id, result);
        }
    }

    fn invalidate_type(&self, tenant_id: TenantId, action_type: ActionType) {
        if self.enabled {
            let result = self
                .by_type
                .invalidate(&TenantScopedKey::new(tenant_id, action_type));
            self.recover(tenant_id, result);
        }
    }

    fn invalidate_counts(&self, tenant_id: TenantId) {
        if self.enabled {
            let result = self.counts.invalidate(&TenantScopedKey::new(tenant_id, ()));
            self.recover(tenant_id, result);
        }
    }

    /// Invalidation after a successful write to one action.
    fn invalidate_after_write(&self, tenant_id: TenantId, action_type: ActionType, action_id: &str) {
        self.invalidate_entity(tenant_id, action_id);
        self.invalidate_type(tenant_id, action_type);
        tracing::debug!(
            entity_kind = %Action::entity_kind(),
            tenant_id = %tenant_id,
            action_type = %action_type,
            action_id,
            "invalidated after write"
        );
    }
}

#[async_trait]
impl<S: ActionStore> ActionStore for CacheBackedActionStore<S> {
    async fn add_action(&self, tenant_id: TenantId, action: &Action) -> ActionMgtResult<Action> {
        let added = self
            .inner
            .add_action(tenant_id, action)
            .await
            .map_err(|e| log_write_failure("add_action", tenant_id, e))?;
        // The new entity itself is not cached; the next read fetches it.
        self.invalidate_type(tenant_id, added.action_type);
        self.invalidate_counts(tenant_id);
        Ok(added)
    }

    async fn get_actions_by_type(
        &self,
        tenant_id: TenantId,
        action_type: ActionType,
    ) -> ActionMgtResult<Vec<Action>> {
        if !self.enabled {
            return self.inner.get_actions_by_type(tenant_id, action_type).await;
        }
        let fetch = async {
            self.inner
                .get_actions_by_type(tenant_id, action_type)
                .await
                .map(Some)
        };
        let actions = read_through(
            &self.by_type,
            TenantScopedKey::new(tenant_id, action_type),
            fetch,
        )
        .await?;
        Ok(actions.unwrap_or_default())
    }

    async fn get_action_by_id(
        &self,
        tenant_id: TenantId,
        action_id: &str,
    ) -> ActionMgtResult<Option<Action>> {
        if !self.enabled {
            return self.inner.get_action_by_id(tenant_id, action_id).await;
        }
        read_through(
            &self.entities,
            TenantScopedKey::entity(tenant_id, action_id),
            self.inner.get_action_by_id(tenant_id, action_id),
        )
        .await
    }

    async fn update_action(
        &self,
        tenant_id: TenantId,
        action_type: ActionType,
        action_id: &str,
        patch: &ActionPatch,
        existing: &Action,
    ) -> ActionMgtResult<Action> {
        let updated = self
            .inner
            .update_action(tenant_id, action_type, action_id, patch, existing)
            .await
            .map_err(|e| log_write_failure("update_action", tenant_id, e))?;
        self.invalidate_after_write(tenant_id, action_type, action_id);
        Ok(updated)
    }

    async fn delete_action(
        &self,
        tenant_id: TenantId,
        action_type: ActionType,
        action_id: &str,
        existing: &Action,
    ) -> ActionMgtResult<()> {
        self.inner
            .delete_action(tenant_id, action_type, action_id, existing)
            .await
            .map_err(|e| log_write_failure("delete_action", tenant_id, e))?;
        self.invalidate_after_write(tenant_id, action_type, action_id);
        self.invalidate_counts(tenant_id);
        Ok(())
    }

    async fn set_action_status(
        &self,
        tenant_id: TenantId,
        action_type: ActionType,
        action_id: &str,
        status: ActionStatus,
    ) -> ActionMgtResult<Action> {
        let updated = self
            .inner
            .set_action_status(tenant_id, action_type, action_id, status)
            .await
            .map_err(|e| log_write_failure("set_action_status", tenant_id, e))?;
        self.invalidate_after_write(tenant_id, action_type, action_id);
        Ok(updated)
    }

    async fn count_actions_by_type(&self, tenant_id: TenantId) -> ActionMgtResult<ActionCounts> {
        if !self.enabled {
            return self.inner.count_actions_by_type(tenant_id).await;
        }
        let fetch = async { self.inner.count_actions_by_type(tenant_id).await.map(Some) };
        let counts = read_through(&self.counts, TenantScopedKey::new(tenant_id, ()), fetch).await?;
        Ok(counts.unwrap_or_default())
    }

    async fn update_action_endpoint(
        &self,
        tenant_id: TenantId,
        action_type: ActionType,
        action_id: &str,
        endpoint: &EndpointConfig,
    ) -> ActionMgtResult<Action> {
        let updated = self
            .inner
            .update_action_endpoint(tenant_id, action_type, action_id, endpoint)
            .await
            .map_err(|e| log_write_failure("update_action_endpoint", tenant_id, e))?;
        self.invalidate_after_write(tenant_id, action_type, action_id);
        Ok(updated)
    }

    async fn update_action_auth_properties(
        &self,
        tenant_id: TenantId,
        action_type: ActionType,
        action_id: &str,
        authentication: &Authentication,
    ) -> ActionMgtResult<Action> {
        let updated = self
            .inner
            .update_action_auth_properties(tenant_id, action_type, action_id, authentication)
            .await
            .map_err(|e| log_write_failure("update_action_auth_properties", tenant_id, e))?;
        self.invalidate_after_write(tenant_id, action_type, action_id);
        Ok(updated)
    }
}
