//! Cache-backed certificate store
//!
//! Same discipline as the action store: read-through on `get`, write to the
//! wrapped store first, invalidate only after a successful write.

use crate::cache::{CacheStats, TenantLruCache, TenantScopedKey};
use crate::cached_action::{log_cache_failure, log_write_failure, read_through};
use crate::store::CertificateStore;
use actionmgt_core::{ActionMgtResult, CacheConfig, Certificate, EntityId, TenantId};
use async_trait::async_trait;

pub struct CacheBackedCertificateStore<S> {
    inner: S,
    enabled: bool,
    entities: TenantLruCache<EntityId, Certificate>,
}

impl<S: CertificateStore> CacheBackedCertificateStore<S> {
    pub fn new(inner: S, config: &CacheConfig) -> Self {
        Self {
            inner,
            enabled: config.enabled,
            entities: TenantLruCache::with_limits(
                "certificate",
                config.max_entries_per_tenant,
                config.max_tenants,
            ),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn stats(&self) -> CacheStats {
        self.entities.stats()
    }

    fn invalidate(&self, tenant_id: TenantId, certificate_id: &str) {
        if !self.enabled {
            return;
        }
        let result = self
            .entities
            .invalidate(&TenantScopedKey::entity(tenant_id, certificate_id));
        if let Err(err) = result {
            log_cache_failure(self.entities.name(), tenant_id, &err);
            self.entities.clear();
        }
    }
}

#[async_trait]
impl<S: CertificateStore> CertificateStore for CacheBackedCertificateStore<S> {
    async fn add_certificate(
        &self,
        tenant_id: TenantId,
        certificate: &Certificate,
    ) -> ActionMgtResult<Certificate> {
        self.inner
            .add_certificate(tenant_id, certificate)
            .await
            .map_err(|e| log_write_failure("add_certificate", tenant_id, e))
    }

    async fn get_certificate(
        &self,
        tenant_id: TenantId,
        certificate_id: &str,
    ) -> ActionMgtResult<Option<Certificate>> {
        if !self.enabled {
            return self.inner.get_certificate(tenant_id, certificate_id).await;
        }
        read_through(
            &self.entities,
            TenantScopedKey::entity(tenant_id, certificate_id),
            self.inner.get_certificate(tenant_id, certificate_id),
        )
        .await
    }

    async fn update_certificate_content(
        &self,
        tenant_id: TenantId,
        certificate_id: &str,
        content: &[u8],
    ) -> ActionMgtResult<Certificate> {
        let updated = self
            .inner
            .update_certificate_content(tenant_id, certificate_id, content)
            .await
            .map_err(|e| log_write_failure("update_certificate_content", tenant_id, e))?;
        self.invalidate(tenant_id, certificate_id);
        Ok(updated)
    }

    async fn delete_certificate(
        &self,
        tenant_id: TenantId,
        certificate_id: &str,
    ) -> ActionMgtResult<()> {
        self.inner
            .delete_certificate(tenant_id, certificate_id)
            .await
            .map_err(|e| log_write_failure("delete_certificate", tenant_id, e))?;
        self.invalidate(tenant_id, certificate_id);
        Ok(())
    }
}
