//! Shared wiring for the service integration tests.

#![allow(dead_code)]

use actionmgt_service::{
    ActionManagementService, CertificateManagementService, ReferenceSecretProcessor,
};
use actionmgt_test_utils::{
    ActionMgtConfig, ActionStore, CountingActionStore, CountingCertificateStore,
    RecordingAuditLogger,
};
use actionmgt_test_utils::{Action, TenantId};
use std::sync::Arc;

pub const PATH: &str = "preIssueAccessToken";
pub const OTHER_PATH: &str = "preRegistration";

pub struct ActionHarness {
    pub service: ActionManagementService<Arc<CountingActionStore>>,
    pub store: Arc<CountingActionStore>,
    pub secrets: Arc<ReferenceSecretProcessor>,
    pub audit: Arc<RecordingAuditLogger>,
}

impl ActionHarness {
    pub fn new(config: ActionMgtConfig) -> Self {
        let store = Arc::new(CountingActionStore::new());
        let secrets = Arc::new(ReferenceSecretProcessor::new());
        let audit = Arc::new(RecordingAuditLogger::new());
        let service =
            ActionManagementService::new(store.clone(), secrets.clone(), audit.clone(), config)
                .expect("invalid test configuration");
        Self {
            service,
            store,
            secrets,
            audit,
        }
    }

    /// The row as the durable store holds it, bypassing the cache.
    pub async fn stored(&self, tenant_id: TenantId, action_id: &str) -> Option<Action> {
        self.store
            .inner()
            .get_action_by_id(tenant_id, action_id)
            .await
            .expect("store read failed")
    }
}

pub struct CertificateHarness {
    pub service: CertificateManagementService<Arc<CountingCertificateStore>>,
    pub store: Arc<CountingCertificateStore>,
    pub audit: Arc<RecordingAuditLogger>,
}

impl CertificateHarness {
    pub fn new(config: &ActionMgtConfig) -> Self {
        let store = Arc::new(CountingCertificateStore::new());
        let audit = Arc::new(RecordingAuditLogger::new());
        let service = CertificateManagementService::new(store.clone(), audit.clone(), config)
            .expect("invalid test configuration");
        Self {
            service,
            store,
            audit,
        }
    }
}
