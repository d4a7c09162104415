//! In-memory stores
//!
//! Reference implementations of [`ActionStore`] and [`CertificateStore`]
//! backed by `HashMap`s behind an `RwLock`. Each call takes the lock once, so
//! every call is atomic with respect to every other.

use crate::store::{ActionCounts, ActionStore, CertificateStore};
use actionmgt_core::{
    Action, ActionMgtResult, ActionPatch, ActionStatus, ActionType, AuthScheme, Authentication,
    Certificate, EndpointConfig, EntityId, EntityKind, StorageError, TenantId,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

type Rows<T> = HashMap<(TenantId, EntityId), T>;

fn read<T>(lock: &RwLock<Rows<T>>) -> Result<RwLockReadGuard<'_, Rows<T>>, StorageError> {
    lock.read().map_err(|_| StorageError::LockPoisoned)
}

fn write<T>(lock: &RwLock<Rows<T>>) -> Result<RwLockWriteGuard<'_, Rows<T>>, StorageError> {
    lock.write().map_err(|_| StorageError::LockPoisoned)
}

fn not_found(entity_kind: EntityKind, id: &str) -> StorageError {
    StorageError::NotFound {
        entity_kind,
        id: id.to_string(),
    }
}

// ============================================================================
// ACTIONS
// ============================================================================

#[derive(Debug, Default)]
pub struct InMemoryActionStore {
    rows: RwLock<Rows<Action>>,
}

impl InMemoryActionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored actions across all tenants.
    pub fn len(&self) -> usize {
        self.rows.read().map(|rows| rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run `f` on the row for `(tenant, id)` if it exists with the given type.
    fn modify<F>(
        &self,
        tenant_id: TenantId,
        action_type: ActionType,
        action_id: &str,
        f: F,
    ) -> ActionMgtResult<Action>
    where
        F: FnOnce(&mut Action),
    {
        let mut rows = write(&self.rows)?;
        let row = rows
            .get_mut(&(tenant_id, action_id.to_string()))
            .filter(|row| row.action_type == action_type)
            .ok_or_else(|| not_found(EntityKind::Action, action_id))?;
        f(row);
        Ok(row.clone())
    }
}

#[async_trait]
impl ActionStore for InMemoryActionStore {
    async fn add_action(&self, tenant_id: TenantId, action: &Action) -> ActionMgtResult<Action> {
        let mut rows = write(&self.rows)?;
        let key = (tenant_id, action.id.clone());
        if rows.contains_key(&key) {
            return Err(StorageError::InsertFailed {
                entity_kind: EntityKind::Action,
                reason: format!("duplicate id {}", action.id),
            }
            .into());
        }
        rows.insert(key, action.clone());
        Ok(action.clone())
    }

    async fn get_actions_by_type(
        &self,
        tenant_id: TenantId,
        action_type: ActionType,
    ) -> ActionMgtResult<Vec<Action>> {
        let rows = read(&self.rows)?;
        let mut actions: Vec<Action> = rows
            .iter()
            .filter(|((tenant, _), action)| *tenant == tenant_id && action.action_type == action_type)
            .map(|(_, action)| action.clone())
            .collect();
        actions.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(actions)
    }

    async fn get_action_by_id(
        &self,
        tenant_id: TenantId,
        action_id: &str,
    ) -> ActionMgtResult<Option<Action>> {
        let rows = read(&self.rows)?;
        Ok(rows.get(&(tenant_id, action_id.to_string())).cloned())
    }

    async fn update_action(
        &self,
        tenant_id: TenantId,
        action_type: ActionType,
        action_id: &str,
        patch: &ActionPatch,
        existing: &Action,
    ) -> ActionMgtResult<Action> {
        let merged = patch.apply_to(existing);
        self.modify(tenant_id, action_type, action_id, |row| {
            if merged.name != existing.name {
                row.name = merged.name;
            }
            if merged.description != existing.description {
                row.description = merged.description;
            }
            if merged.endpoint != existing.endpoint {
                row.endpoint = merged.endpoint;
            }
        })
    }

    async fn delete_action(
        &self,
        tenant_id: TenantId,
        action_type: ActionType,
        action_id: &str,
        _existing: &Action,
    ) -> ActionMgtResult<()> {
        let mut rows = write(&self.rows)?;
        let key = (tenant_id, action_id.to_string());
        match rows.get(&key) {
            Some(row) if row.action_type == action_type => {
                rows.remove(&key);
                Ok(())
            }
            _ => Err(not_found(EntityKind::Action, action_id).into()),
        }
    }

    async fn set_action_status(
        &self,
        tenant_id: TenantId,
        action_type: ActionType,
        action_id: &str,
        status: ActionStatus,
    ) -> ActionMgtResult<Action> {
        self.modify(tenant_id, action_type, action_id, |row| row.status = status)
    }

    async fn count_actions_by_type(&self, tenant_id: TenantId) -> ActionMgtResult<ActionCounts> {
        let rows = read(&self.rows)?;
        let mut counts = ActionCounts::new();
        for ((tenant, _), action) in rows.iter() {
            if *tenant == tenant_id {
                *counts.entry(action.action_type).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    async fn update_action_endpoint(
        &self,
        tenant_id: TenantId,
        action_type: ActionType,
        action_id: &str,
        endpoint: &EndpointConfig,
    ) -> ActionMgtResult<Action> {
        self.modify(tenant_id, action_type, action_id, |row| {
            row.endpoint = endpoint.clone()
        })
    }

    async fn update_action_auth_properties(
        &self,
        tenant_id: TenantId,
        action_type: ActionType,
        action_id: &str,
        authentication: &Authentication,
    ) -> ActionMgtResult<Action> {
        self.modify(tenant_id, action_type, action_id, |row| {
            let scheme = AuthScheme::for_type(row.endpoint.authentication.auth_type);
            row.endpoint.authentication.properties = scheme.normalize(authentication).properties;
        })
    }
}

// ============================================================================
// CERTIFICATES
// ============================================================================

#[derive(Debug, Default)]
pub struct InMemoryCertificateStore {
    rows: RwLock<Rows<Certificate>>,
}

impl InMemoryCertificateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.read().map(|rows| rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CertificateStore for InMemoryCertificateStore {
    async fn add_certificate(
        &self,
        tenant_id: TenantId,
        certificate: &Certificate,
    ) -> ActionMgtResult<Certificate> {
        let mut rows = write(&self.rows)?;
        let key = (tenant_id, certificate.id.clone());
        if rows.contains_key(&key) {
            return Err(StorageError::InsertFailed {
                entity_kind: EntityKind::Certificate,
                reason: format!("duplicate id {}", certificate.id),
            }
            .into());
        }
        rows.insert(key, certificate.clone());
        Ok(certificate.clone())
    }

    async fn get_certificate(
        &self,
        tenant_id: TenantId,
        certificate_id: &str,
    ) -> ActionMgtResult<Option<Certificate>> {
        let rows = read(&self.rows)?;
        Ok(rows.get(&(tenant_id, certificate_id.to_string())).cloned())
    }

    async fn update_certificate_content(
        &self,
        tenant_id: TenantId,
        certificate_id: &str,
        content: &[u8],
    ) -> ActionMgtResult<Certificate> {
        let mut rows = write(&self.rows)?;
        let row = rows
            .get_mut(&(tenant_id, certificate_id.to_string()))
            .ok_or_else(|| not_found(EntityKind::Certificate, certificate_id))?;
        row.content = content.to_vec();
        Ok(row.clone())
    }

    async fn delete_certificate(
        &self,
        tenant_id: TenantId,
        certificate_id: &str,
    ) -> ActionMgtResult<()> {
        let mut rows = write(&self.rows)?;
        rows.remove(&(tenant_id, certificate_id.to_string()))
            .map(|_| ())
            .ok_or_else(|| not_found(EntityKind::Certificate, certificate_id).into())
    }
}
