//! Action management service
//!
//! Tenant-scoped operations over actions: resolve the action type from its
//! path segment, enforce the per-type quota, validate input, move secrets
//! through the [`SecretProcessor`], persist through the cache-backed store
//! and record an audit event for every successful mutation.
//!
//! Validation and existence checks always complete before the first
//! mutating store call. Values returned to callers carry plaintext secrets;
//! values handed to the store carry only what the secret processor produced.
//!
//! Writes to one action are serialized through [`ActionLocks`], so each write
//! releases the secret references of the row it actually replaced. Reads
//! take no lock: a read that raced a write and holds references the write
//! already released reads the action again, once.

use actionmgt_core::validation::{
    validate_action_name, validate_endpoint_uri, validate_for_blank, ACTION_NAME_FIELD,
    ENDPOINT_URI_FIELD,
};
use crate::action_lock::ActionLocks;
use actionmgt_core::{
    auth::validate_authentication, new_entity_id, Action, ActionMgtConfig, ActionMgtError,
    ActionMgtResult, ActionModel, ActionPatch, ActionStatus, ActionType, AuditEvent, AuditLogger,
    AuditOperation, AuthScheme, AuthTransition, Authentication, ClientError, EndpointConfig,
    SecretError, SecretProcessor, TenantId,
};
use actionmgt_storage::{ActionCounts, ActionStore, CacheBackedActionStore, CacheStats};
use std::sync::Arc;

/// A stored row referencing secrets that have since been released.
fn is_stale_reference(err: &ActionMgtError) -> bool {
    matches!(
        err,
        ActionMgtError::Secret(SecretError::ReferenceNotFound { .. })
    )
}

pub struct ActionManagementService<S> {
    store: CacheBackedActionStore<S>,
    secrets: Arc<dyn SecretProcessor>,
    audit: Arc<dyn AuditLogger>,
    locks: ActionLocks,
    config: ActionMgtConfig,
}

impl<S: ActionStore> ActionManagementService<S> {
    /// Build a service over `store`. The store is wrapped in a cache sized
    /// and switched by `config.cache`. Fails when `config` does not validate.
    pub fn new(
        store: S,
        secrets: Arc<dyn SecretProcessor>,
        audit: Arc<dyn AuditLogger>,
        config: ActionMgtConfig,
    ) -> ActionMgtResult<Self> {
        config.validate()?;
        Ok(Self {
            store: CacheBackedActionStore::new(store, &config.cache),
            secrets,
            audit,
            locks: ActionLocks::new(),
            config,
        })
    }

    pub fn config(&self) -> &ActionMgtConfig {
        &self.config
    }

    pub fn store(&self) -> &CacheBackedActionStore<S> {
        &self.store
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.store.stats()
    }

    /// Create an action of the type named by `action_type_path`.
    ///
    /// The quota check reads the per-type count and the insert happens
    /// later, without holding anything in between. Two concurrent adds that
    /// both read a count of `max - 1` will both succeed, leaving the tenant
    /// one action over the limit. Callers needing a hard limit must enforce
    /// it in the store.
    pub async fn add_action(
        &self,
        tenant_id: TenantId,
        action_type_path: &str,
        model: ActionModel,
    ) -> ActionMgtResult<Action> {
        let action_type = ActionType::from_path(action_type_path)?;
        tracing::debug!(tenant_id = %tenant_id, action_type = %action_type, "add action");

        self.check_quota(tenant_id, action_type).await?;
        self.validate_model(&model)?;

        let action = model.into_action(new_entity_id(), action_type);
        let mut stored = action.clone();
        stored.endpoint.authentication = self
            .secrets
            .encrypt(tenant_id, &action.id, &action.endpoint.authentication)
            .await?;

        if let Err(e) = self.store.add_action(tenant_id, &stored).await {
            self.release_secrets(tenant_id, &stored.id, &stored.endpoint.authentication)
                .await;
            return Err(e);
        }

        self.audit
            .record(AuditEvent::for_action(AuditOperation::Add, tenant_id, &action));
        Ok(action)
    }

    pub async fn get_actions_by_type(
        &self,
        tenant_id: TenantId,
        action_type_path: &str,
    ) -> ActionMgtResult<Vec<Action>> {
        let action_type = ActionType::from_path(action_type_path)?;
        tracing::debug!(tenant_id = %tenant_id, action_type = %action_type, "list actions");

        let stored = self.store.get_actions_by_type(tenant_id, action_type).await?;
        match self.reveal_all(tenant_id, stored).await {
            Err(e) if is_stale_reference(&e) => {
                tracing::debug!(
                    tenant_id = %tenant_id,
                    action_type = %action_type,
                    "listing raced a write, reading again"
                );
                self.store.invalidate_listing(tenant_id, action_type);
                let stored = self.store.get_actions_by_type(tenant_id, action_type).await?;
                self.reveal_all(tenant_id, stored).await
            }
            result => result,
        }
    }

    /// Look up one action. An action stored under another type is reported
    /// as absent.
    pub async fn get_action_by_id(
        &self,
        tenant_id: TenantId,
        action_type_path: &str,
        action_id: &str,
    ) -> ActionMgtResult<Option<Action>> {
        let action_type = ActionType::from_path(action_type_path)?;
        let Some(action) = self.find_action(tenant_id, action_type, action_id).await? else {
            return Ok(None);
        };
        match self.reveal(tenant_id, action).await {
            Err(e) if is_stale_reference(&e) => {
                tracing::debug!(
                    tenant_id = %tenant_id,
                    action_type = %action_type,
                    action_id,
                    "read raced a write, reading again"
                );
                self.store.invalidate_action(tenant_id, action_type, action_id);
                match self.find_action(tenant_id, action_type, action_id).await? {
                    Some(action) => Ok(Some(self.reveal(tenant_id, action).await?)),
                    None => Ok(None),
                }
            }
            result => result.map(Some),
        }
    }

    /// Apply a PATCH. Absent and blank fields are left unchanged; a supplied
    /// authentication replaces the stored one whole.
    pub async fn update_action(
        &self,
        tenant_id: TenantId,
        action_type_path: &str,
        action_id: &str,
        patch: ActionPatch,
    ) -> ActionMgtResult<Action> {
        let action_type = ActionType::from_path(action_type_path)?;
        tracing::debug!(
            tenant_id = %tenant_id,
            action_type = %action_type,
            action_id,
            "update action"
        );

        let _write = self.locks.acquire(tenant_id, action_id).await?;
        let existing = self.require_action(tenant_id, action_type, action_id).await?;
        let patch = patch.normalized();
        self.validate_patch(&patch)?;

        let mut stored_patch = patch.clone();
        let new_authentication = match patch.authentication() {
            Some(authentication) => {
                let normalized =
                    AuthScheme::for_type(authentication.auth_type).normalize(authentication);
                let encrypted = self
                    .secrets
                    .encrypt(tenant_id, action_id, &normalized)
                    .await?;
                stored_patch = stored_patch.with_authentication(encrypted.clone());
                Some(encrypted)
            }
            None => None,
        };

        let write = self
            .store
            .update_action(tenant_id, action_type, action_id, &stored_patch, &existing)
            .await;
        let updated = self
            .settle_secrets(tenant_id, &existing, new_authentication.as_ref(), write)
            .await?;

        let updated = self.reveal(tenant_id, updated).await?;
        self.audit
            .record(AuditEvent::for_action(AuditOperation::Update, tenant_id, &updated));
        Ok(updated)
    }

    pub async fn delete_action(
        &self,
        tenant_id: TenantId,
        action_type_path: &str,
        action_id: &str,
    ) -> ActionMgtResult<()> {
        let action_type = ActionType::from_path(action_type_path)?;
        tracing::debug!(
            tenant_id = %tenant_id,
            action_type = %action_type,
            action_id,
            "delete action"
        );

        let _write = self.locks.acquire(tenant_id, action_id).await?;
        let existing = self.require_action(tenant_id, action_type, action_id).await?;
        self.store
            .delete_action(tenant_id, action_type, action_id, &existing)
            .await?;
        self.release_secrets(tenant_id, action_id, &existing.endpoint.authentication)
            .await;

        self.audit
            .record(AuditEvent::for_action(AuditOperation::Delete, tenant_id, &existing));
        Ok(())
    }

    pub async fn activate_action(
        &self,
        tenant_id: TenantId,
        action_type_path: &str,
        action_id: &str,
    ) -> ActionMgtResult<Action> {
        self.change_status(tenant_id, action_type_path, action_id, ActionStatus::Active)
            .await
    }

    pub async fn deactivate_action(
        &self,
        tenant_id: TenantId,
        action_type_path: &str,
        action_id: &str,
    ) -> ActionMgtResult<Action> {
        self.change_status(tenant_id, action_type_path, action_id, ActionStatus::Inactive)
            .await
    }

    pub async fn get_actions_count_per_type(
        &self,
        tenant_id: TenantId,
    ) -> ActionMgtResult<ActionCounts> {
        self.store.count_actions_by_type(tenant_id).await
    }

    /// Replace the authentication of an action's endpoint.
    ///
    /// Keeping the type only swaps the property values. Changing it rebuilds
    /// the endpoint around the stored URI, so no property of the previous
    /// type survives.
    pub async fn update_action_endpoint_authentication(
        &self,
        tenant_id: TenantId,
        action_type_path: &str,
        action_id: &str,
        authentication: Authentication,
    ) -> ActionMgtResult<Action> {
        let action_type = ActionType::from_path(action_type_path)?;
        let _write = self.locks.acquire(tenant_id, action_id).await?;
        let existing = self.require_action(tenant_id, action_type, action_id).await?;

        validate_authentication(&authentication)?;
        let authentication = AuthScheme::for_type(authentication.auth_type).normalize(&authentication);
        let transition = AuthTransition::between(&existing.endpoint.authentication, &authentication);
        tracing::debug!(
            tenant_id = %tenant_id,
            action_type = %action_type,
            action_id,
            from = %existing.endpoint.authentication.auth_type,
            to = %authentication.auth_type,
            ?transition,
            "update endpoint authentication"
        );

        let encrypted = self
            .secrets
            .encrypt(tenant_id, action_id, &authentication)
            .await?;
        let write = match transition {
            AuthTransition::PropertiesOnly => {
                self.store
                    .update_action_auth_properties(tenant_id, action_type, action_id, &encrypted)
                    .await
            }
            AuthTransition::ReplaceEndpoint => {
                let endpoint = EndpointConfig::new(existing.endpoint.uri.clone(), encrypted.clone());
                self.store
                    .update_action_endpoint(tenant_id, action_type, action_id, &endpoint)
                    .await
            }
        };
        let updated = self
            .settle_secrets(tenant_id, &existing, Some(&encrypted), write)
            .await?;

        let updated = self.reveal(tenant_id, updated).await?;
        self.audit
            .record(AuditEvent::for_action(AuditOperation::Update, tenant_id, &updated));
        Ok(updated)
    }

    // ------------------------------------------------------------------------

    async fn change_status(
        &self,
        tenant_id: TenantId,
        action_type_path: &str,
        action_id: &str,
        status: ActionStatus,
    ) -> ActionMgtResult<Action> {
        let action_type = ActionType::from_path(action_type_path)?;
        tracing::debug!(
            tenant_id = %tenant_id,
            action_type = %action_type,
            action_id,
            status = status.as_str(),
            "change action status"
        );

        let _write = self.locks.acquire(tenant_id, action_id).await?;
        self.require_action(tenant_id, action_type, action_id).await?;
        let updated = self
            .store
            .set_action_status(tenant_id, action_type, action_id, status)
            .await?;
        let updated = self.reveal(tenant_id, updated).await?;

        let operation = match status {
            ActionStatus::Active => AuditOperation::Activate,
            ActionStatus::Inactive => AuditOperation::Deactivate,
        };
        self.audit
            .record(AuditEvent::for_action(operation, tenant_id, &updated));
        Ok(updated)
    }

    async fn check_quota(&self, tenant_id: TenantId, action_type: ActionType) -> ActionMgtResult<()> {
        let counts = self.store.count_actions_by_type(tenant_id).await?;
        let count = counts.get(&action_type).copied().unwrap_or(0);
        let limit = self.config.max_actions_per_type;
        if count >= limit {
            tracing::debug!(tenant_id = %tenant_id, action_type = %action_type, count, limit, "quota reached");
            return Err(ClientError::MaxActionsPerTypeReached { action_type, limit }.into());
        }
        Ok(())
    }

    fn validate_model(&self, model: &ActionModel) -> Result<(), ClientError> {
        validate_for_blank(ACTION_NAME_FIELD, Some(model.name.as_str()))?;
        validate_action_name(&model.name)?;
        validate_for_blank(ENDPOINT_URI_FIELD, Some(model.endpoint.uri.as_str()))?;
        validate_endpoint_uri(&model.endpoint.uri, self.config.allow_insecure_endpoints)?;
        validate_authentication(&model.endpoint.authentication)
    }

    /// Validate the fields a normalized patch supplies.
    fn validate_patch(&self, patch: &ActionPatch) -> Result<(), ClientError> {
        if let Some(name) = &patch.name {
            validate_action_name(name)?;
        }
        if let Some(uri) = patch.uri() {
            validate_endpoint_uri(uri, self.config.allow_insecure_endpoints)?;
        }
        if let Some(authentication) = patch.authentication() {
            validate_authentication(authentication)?;
        }
        Ok(())
    }

    async fn find_action(
        &self,
        tenant_id: TenantId,
        action_type: ActionType,
        action_id: &str,
    ) -> ActionMgtResult<Option<Action>> {
        let found = self.store.get_action_by_id(tenant_id, action_id).await?;
        Ok(found.filter(|action| action.action_type == action_type))
    }

    /// Stored form of the action, or `ActionNotFound`.
    async fn require_action(
        &self,
        tenant_id: TenantId,
        action_type: ActionType,
        action_id: &str,
    ) -> ActionMgtResult<Action> {
        self.find_action(tenant_id, action_type, action_id)
            .await?
            .ok_or_else(|| {
                ClientError::ActionNotFound {
                    action_type,
                    action_id: action_id.to_string(),
                }
                .into()
            })
    }

    /// Replace stored secret references with their values.
    async fn reveal(&self, tenant_id: TenantId, mut action: Action) -> ActionMgtResult<Action> {
        action.endpoint.authentication = self
            .secrets
            .decrypt(tenant_id, &action.id, &action.endpoint.authentication)
            .await?;
        Ok(action)
    }

    async fn reveal_all(
        &self,
        tenant_id: TenantId,
        stored: Vec<Action>,
    ) -> ActionMgtResult<Vec<Action>> {
        let mut actions = Vec::with_capacity(stored.len());
        for action in stored {
            actions.push(self.reveal(tenant_id, action).await?);
        }
        Ok(actions)
    }

    /// Release whichever secrets a write left orphaned: the new ones when it
    /// failed, the previous ones when it replaced them.
    async fn settle_secrets(
        &self,
        tenant_id: TenantId,
        existing: &Action,
        new_authentication: Option<&Authentication>,
        write: ActionMgtResult<Action>,
    ) -> ActionMgtResult<Action> {
        match (write, new_authentication) {
            (Ok(updated), Some(_)) => {
                self.release_secrets(tenant_id, &existing.id, &existing.endpoint.authentication)
                    .await;
                Ok(updated)
            }
            (Ok(updated), None) => Ok(updated),
            (Err(e), Some(new_authentication)) => {
                self.release_secrets(tenant_id, &existing.id, new_authentication)
                    .await;
                Err(e)
            }
            (Err(e), None) => Err(e),
        }
    }

    async fn release_secrets(
        &self,
        tenant_id: TenantId,
        action_id: &str,
        authentication: &Authentication,
    ) {
        if let Err(e) = self.secrets.delete(tenant_id, action_id, authentication).await {
            tracing::warn!(
                tenant_id = %tenant_id,
                action_id,
                error = %e,
                "failed to release secrets"
            );
        }
    }
}
