//! Certificate management service

use actionmgt_core::validation::{validate_certificate_content, validate_certificate_name};
use actionmgt_core::{
    new_entity_id, ActionMgtConfig, ActionMgtResult, AuditEvent, AuditLogger, AuditOperation,
    Certificate, CertificateModel, ClientError, EntityId, TenantId,
};
use actionmgt_storage::{CacheBackedCertificateStore, CacheStats, CertificateStore};
use std::sync::Arc;

pub struct CertificateManagementService<S> {
    store: CacheBackedCertificateStore<S>,
    audit: Arc<dyn AuditLogger>,
}

impl<S: CertificateStore> CertificateManagementService<S> {
    /// Build a service over `store`. Fails when `config` does not validate.
    pub fn new(
        store: S,
        audit: Arc<dyn AuditLogger>,
        config: &ActionMgtConfig,
    ) -> ActionMgtResult<Self> {
        config.validate()?;
        Ok(Self {
            store: CacheBackedCertificateStore::new(store, &config.cache),
            audit,
        })
    }

    pub fn store(&self) -> &CacheBackedCertificateStore<S> {
        &self.store
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.store.stats()
    }

    /// Validate and store a new certificate, returning its id.
    pub async fn add_certificate(
        &self,
        tenant_id: TenantId,
        model: CertificateModel,
    ) -> ActionMgtResult<EntityId> {
        validate_certificate_name(Some(model.name.as_str()))?;
        validate_certificate_content(&model.content)?;

        let certificate = model.into_certificate(new_entity_id());
        tracing::debug!(
            tenant_id = %tenant_id,
            certificate_id = %certificate.id,
            "add certificate"
        );
        let added = self.store.add_certificate(tenant_id, &certificate).await?;

        self.audit.record(AuditEvent::for_certificate(
            AuditOperation::Add,
            tenant_id,
            &added,
        ));
        Ok(added.id)
    }

    pub async fn get_certificate(
        &self,
        tenant_id: TenantId,
        certificate_id: &str,
    ) -> ActionMgtResult<Certificate> {
        self.store
            .get_certificate(tenant_id, certificate_id)
            .await?
            .ok_or_else(|| {
                ClientError::CertificateNotFound {
                    certificate_id: certificate_id.to_string(),
                }
                .into()
            })
    }

    pub async fn update_certificate_content(
        &self,
        tenant_id: TenantId,
        certificate_id: &str,
        content: &[u8],
    ) -> ActionMgtResult<Certificate> {
        validate_certificate_content(content)?;
        self.get_certificate(tenant_id, certificate_id).await?;
        tracing::debug!(tenant_id = %tenant_id, certificate_id, "update certificate content");

        let updated = self
            .store
            .update_certificate_content(tenant_id, certificate_id, content)
            .await?;
        self.audit.record(AuditEvent::for_certificate(
            AuditOperation::Update,
            tenant_id,
            &updated,
        ));
        Ok(updated)
    }

    /// Delete a certificate. Deleting an absent certificate succeeds and
    /// records nothing.
    pub async fn delete_certificate(
        &self,
        tenant_id: TenantId,
        certificate_id: &str,
    ) -> ActionMgtResult<()> {
        let Some(existing) = self.store.get_certificate(tenant_id, certificate_id).await? else {
            tracing::debug!(tenant_id = %tenant_id, certificate_id, "certificate already absent");
            return Ok(());
        };

        self.store
            .delete_certificate(tenant_id, certificate_id)
            .await?;
        self.audit.record(AuditEvent::for_certificate(
            AuditOperation::Delete,
            tenant_id,
            &existing,
        ));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actionmgt_core::validation::{CERTIFICATE_CONTENT_FIELD, CERTIFICATE_NAME_FIELD};
    use actionmgt_test_utils::assertions::*;
    use actionmgt_test_utils::fixtures::*;
    use actionmgt_test_utils::{CountingCertificateStore, RecordingAuditLogger, StoreCall};

    fn service() -> (
        CertificateManagementService<Arc<CountingCertificateStore>>,
        Arc<CountingCertificateStore>,
        Arc<RecordingAuditLogger>,
    ) {
        let store = Arc::new(CountingCertificateStore::new());
        let audit = Arc::new(RecordingAuditLogger::new());
        let service =
            CertificateManagementService::new(store.clone(), audit.clone(), &ActionMgtConfig::default())
                .unwrap();
        (service, store, audit)
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = ActionMgtConfig::default().with_cache(actionmgt_core::CacheConfig {
            max_entries_per_tenant: 0,
            ..Default::default()
        });
        let result = CertificateManagementService::new(
            CountingCertificateStore::new(),
            Arc::new(RecordingAuditLogger::new()),
            &config,
        );
        assert!(matches!(result, Err(actionmgt_core::ActionMgtError::Config(_))));
    }

    #[tokio::test]
    async fn test_add_then_get() {
        let (service, _, audit) = service();
        let id = service
            .add_certificate(TENANT, certificate_model("root-ca"))
            .await
            .unwrap();

        let certificate = service.get_certificate(TENANT, &id).await.unwrap();
        assert_eq!(certificate.name, "root-ca");
        assert_eq!(certificate.content, SAMPLE_PEM.as_bytes());
        assert_eq!(audit.operations(), vec![AuditOperation::Add]);

        let payload = audit.events()[0].payload.to_string();
        assert!(!payload.contains("BEGIN CERTIFICATE"));
    }

    #[tokio::test]
    async fn test_add_validates_before_store() {
        let (service, store, _) = service();
        let result = service
            .add_certificate(TENANT, CertificateModel::new("  ", SAMPLE_PEM.as_bytes()))
            .await;
        assert_invalid_field(&result, CERTIFICATE_NAME_FIELD);

        let result = service
            .add_certificate(TENANT, CertificateModel::new("ca", b"not a pem".to_vec()))
            .await;
        assert_invalid_field(&result, CERTIFICATE_CONTENT_FIELD);
        assert_eq!(store.calls(StoreCall::AddCertificate), 0);
    }

    #[tokio::test]
    async fn test_missing_certificate() {
        let (service, store, audit) = service();
        let result = service.get_certificate(TENANT, "missing").await;
        assert!(matches!(
            assert_client_error(&result),
            ClientError::CertificateNotFound { .. }
        ));

        let result = service
            .update_certificate_content(TENANT, "missing", OTHER_PEM.as_bytes())
            .await;
        assert!(matches!(
            assert_client_error(&result),
            ClientError::CertificateNotFound { .. }
        ));
        assert_eq!(store.calls(StoreCall::UpdateCertificateContent), 0);

        service.delete_certificate(TENANT, "missing").await.unwrap();
        assert_eq!(store.calls(StoreCall::DeleteCertificate), 0);
        assert!(audit.events().is_empty());
    }

    #[tokio::test]
    async fn test_update_and_delete_are_audited() {
        let (service, _, audit) = service();
        let id = service
            .add_certificate(TENANT, certificate_model("ca"))
            .await
            .unwrap();

        let updated = service
            .update_certificate_content(TENANT, &id, OTHER_PEM.as_bytes())
            .await
            .unwrap();
        assert_eq!(updated.content, OTHER_PEM.as_bytes());

        service.delete_certificate(TENANT, &id).await.unwrap();
        assert_eq!(
            audit.operations(),
            vec![
                AuditOperation::Add,
                AuditOperation::Update,
                AuditOperation::Delete
            ]
        );
    }

    #[tokio::test]
    async fn test_tenants_are_isolated() {
        let (service, _, _) = service();
        let id = service
            .add_certificate(TENANT, certificate_model("ca"))
            .await
            .unwrap();
        assert!(service.get_certificate(OTHER_TENANT, &id).await.is_err());
    }
}
