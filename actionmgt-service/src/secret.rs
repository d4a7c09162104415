//! Reference-based secret processor
//!
//! Secret property values are moved into an in-process vault and the
//! stored authentication keeps only a reference to them:
//!
//! ```text
//! secret:actions/<tenant>/<action id>/<property>/<uuid>
//! ```
//!
//! Every `encrypt` call mints fresh references, so the references of the
//! previous value stay resolvable until the caller deletes them. That lets
//! the management service roll back either side of a failed write.

use actionmgt_core::{ActionMgtResult, Authentication, SecretError, SecretProcessor, TenantId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

pub const REFERENCE_PREFIX: &str = "secret:actions/";

fn reference_scope(tenant_id: TenantId, action_id: &str) -> String {
    format!("{}{}/{}/", REFERENCE_PREFIX, tenant_id, action_id)
}

#[derive(Debug, Default)]
pub struct ReferenceSecretProcessor {
    vault: RwLock<HashMap<String, String>>,
}

impl ReferenceSecretProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of secrets currently held.
    pub fn len(&self) -> usize {
        self.vault.read().map(|vault| vault.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, String>>, SecretError> {
        self.vault.read().map_err(|_| SecretError::VaultUnavailable {
            reason: "vault lock poisoned".to_string(),
        })
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, String>>, SecretError> {
        self.vault.write().map_err(|_| SecretError::VaultUnavailable {
            reason: "vault lock poisoned".to_string(),
        })
    }

    fn is_reference(value: &str, scope: &str) -> bool {
        value.starts_with(scope)
    }
}

#[async_trait]
impl SecretProcessor for ReferenceSecretProcessor {
    async fn encrypt(
        &self,
        tenant_id: TenantId,
        action_id: &str,
        authentication: &Authentication,
    ) -> ActionMgtResult<Authentication> {
        let scope = reference_scope(tenant_id, action_id);
        let mut vault = self.write()?;
        let mut stored = authentication.clone();
        for (property, value) in stored.properties.iter_mut() {
            if !property.is_secret() {
                continue;
            }
            let reference = format!("{}{}/{}", scope, property.name(), Uuid::new_v4());
            vault.insert(reference.clone(), std::mem::replace(value, reference));
        }
        Ok(stored)
    }

    async fn decrypt(
        &self,
        tenant_id: TenantId,
        action_id: &str,
        stored: &Authentication,
    ) -> ActionMgtResult<Authentication> {
        let scope = reference_scope(tenant_id, action_id);
        let vault = self.read()?;
        let mut plain = stored.clone();
        for (property, value) in plain.properties.iter_mut() {
            if !property.is_secret() {
                continue;
            }
            if !Self::is_reference(value, &scope) {
                return Err(SecretError::DecryptionFailed {
                    property: property.name().to_string(),
                    reason: "value is not a reference owned by this action".to_string(),
                }
                .into());
            }
            let secret = vault
                .get(value.as_str())
                .ok_or_else(|| SecretError::ReferenceNotFound {
                    reference: value.clone(),
                })?;
            *value = secret.clone();
        }
        Ok(plain)
    }

    async fn delete(
        &self,
        tenant_id: TenantId,
        action_id: &str,
        stored: &Authentication,
    ) -> ActionMgtResult<()> {
        let scope = reference_scope(tenant_id, action_id);
        let mut vault = self.write()?;
        let references = stored
            .secret_properties()
            .map(|(_, value)| value)
            .filter(|value| Self::is_reference(value, &scope));
        for reference in references {
            vault.remove(reference);
        }
        Ok(())
    }
}
