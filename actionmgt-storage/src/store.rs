//! Persistence traits for actions and certificates.
//!
//! Every call is scoped by tenant and is expected to execute atomically in
//! the implementation. Actions are keyed by `(tenant, id)`; the action type
//! passed to write calls is the type the caller resolved, and stores use it
//! to keep per-type indexes in step.
//!
//! Values crossing this seam are in stored form: secret authentication
//! properties hold whatever the secret processor produced, never plaintext.

use async_trait::async_trait;
use actionmgt_core::{
    Action, ActionMgtResult, ActionPatch, ActionStatus, ActionType, Authentication, Certificate,
    EndpointConfig, TenantId,
};
use std::collections::HashMap;
use std::sync::Arc;

/// Number of actions per type in one tenant. Types with no actions are absent.
pub type ActionCounts = HashMap<ActionType, usize>;

#[async_trait]
pub trait ActionStore: Send + Sync {
    /// Insert a new action. Returns the action as stored.
    async fn add_action(&self, tenant_id: TenantId, action: &Action) -> ActionMgtResult<Action>;

    /// All actions of one type.
    async fn get_actions_by_type(
        &self,
        tenant_id: TenantId,
        action_type: ActionType,
    ) -> ActionMgtResult<Vec<Action>>;

    /// Look up an action by id regardless of its type.
    async fn get_action_by_id(
        &self,
        tenant_id: TenantId,
        action_id: &str,
    ) -> ActionMgtResult<Option<Action>>;

    /// Apply a PATCH. `existing` is the caller's current view of the row and
    /// is used to work out which columns change.
    async fn update_action(
        &self,
        tenant_id: TenantId,
        action_type: ActionType,
        action_id: &str,
        patch: &ActionPatch,
        existing: &Action,
    ) -> ActionMgtResult<Action>;

    async fn delete_action(
        &self,
        tenant_id: TenantId,
        action_type: ActionType,
        action_id: &str,
        existing: &Action,
    ) -> ActionMgtResult<()>;

    /// Change only the status column.
    async fn set_action_status(
        &self,
        tenant_id: TenantId,
        action_type: ActionType,
        action_id: &str,
        status: ActionStatus,
    ) -> ActionMgtResult<Action>;

    async fn count_actions_by_type(&self, tenant_id: TenantId) -> ActionMgtResult<ActionCounts>;

    /// Replace the whole endpoint, authentication type included.
    async fn update_action_endpoint(
        &self,
        tenant_id: TenantId,
        action_type: ActionType,
        action_id: &str,
        endpoint: &EndpointConfig,
    ) -> ActionMgtResult<Action>;

    /// Replace the authentication properties while keeping the stored type
    /// and URI.
    async fn update_action_auth_properties(
        &self,
        tenant_id: TenantId,
        action_type: ActionType,
        action_id: &str,
        authentication: &Authentication,
    ) -> ActionMgtResult<Action>;
}

#[async_trait]
pub trait CertificateStore: Send + Sync {
    async fn add_certificate(
        &self,
        tenant_id: TenantId,
        certificate: &Certificate,
    ) -> ActionMgtResult<Certificate>;

    async fn get_certificate(
        &self,
        tenant_id: TenantId,
        certificate_id: &str,
    ) -> ActionMgtResult<Option<Certificate>>;

    async fn update_certificate_content(
        &self,
        tenant_id: TenantId,
        certificate_id: &str,
        content: &[u8],
    ) -> ActionMgtResult<Certificate>;

    async fn delete_certificate(
        &self,
        tenant_id: TenantId,
        certificate_id: &str,
    ) -> ActionMgtResult<()>;
}

// ============================================================================
// SHARED HANDLES
// ============================================================================

#[async_trait]
impl<S: ActionStore + ?Sized> ActionStore for Arc<S> {
    async fn add_action(&self, tenant_id: TenantId, action: &Action) -> ActionMgtResult<Action> {
        (**self).add_action(tenant_id, action).await
    }

    async fn get_actions_by_type(
        &self,
        tenant_id: TenantId,
        action_type: ActionType,
    ) -> ActionMgtResult<Vec<Action>> {
        (**self).get_actions_by_type(tenant_id, action_type).await
    }

    async fn get_action_by_id(
        &self,
        tenant_id: TenantId,
        action_id: &str,
    ) -> ActionMgtResult<Option<Action>> {
        (**self).get_action_by_id(tenant_id, action_id).await
    }

    async fn update_action(
        &self,
        tenant_id: TenantId,
        action_type: ActionType,
        action_id: &str,
        patch: &ActionPatch,
        existing: &Action,
    ) -> ActionMgtResult<Action> {
        (**self)
            .update_action(tenant_id, action_type, action_id, patch, existing)
            .await
    }

    async fn delete_action(
        &self,
        tenant_id: TenantId,
        action_type: ActionType,
        action_id: &str,
        existing: &Action,
    ) -> ActionMgtResult<()> {
        (**self)
            .delete_action(tenant_id, action_type, action_id, existing)
            .await
    }

    async fn set_action_status(
        &self,
        tenant_id: TenantId,
        action_type: ActionType,
        action_id: &str,
        status: ActionStatus,
    ) -> ActionMgtResult<Action> {
        (**self)
            .set_action_status(tenant_id, action_type, action_id, status)
            .await
    }

    async fn count_actions_by_type(&self, tenant_id: TenantId) -> ActionMgtResult<ActionCounts> {
        (**self).count_actions_by_type(tenant_id).await
    }

    async fn update_action_endpoint(
        &self,
        tenant_id: TenantId,
        action_type: ActionType,
        action_id: &str,
        endpoint: &EndpointConfig,
    ) -> ActionMgtResult<Action> {
        (**self)
            .update_action_endpoint(tenant_id, action_type, action_id, endpoint)
            .await
    }

    async fn update_action_auth_properties(
        &self,
        tenant_id: TenantId,
        action_type: ActionType,
        action_id: &str,
        authentication: &Authentication,
    ) -> ActionMgtResult<Action> {
        (**self)
            .update_action_auth_properties(tenant_id, action_type, action_id, authentication)
            .await
    }
}

#[async_trait]
impl<S: CertificateStore + ?Sized> CertificateStore for Arc<S> {
    async fn add_certificate(
        &self,
        tenant_id: TenantId,
        certificate: &Certificate,
    ) -> ActionMgtResult<Certificate> {
        (**self).add_certificate(tenant_id, certificate).await
    }

    async fn get_certificate(
        &self,
        tenant_id: TenantId,
        certificate_id: &str,
    ) -> ActionMgtResult<Option<Certificate>> {
        (**self).get_certificate(tenant_id, certificate_id).await
    }

    async fn update_certificate_content(
        &self,
        tenant_id: TenantId,
        certificate_id: &str,
        content: &[u8],
    ) -> ActionMgtResult<Certificate> {
        (**self)
            .update_certificate_content(tenant_id, certificate_id, content)
            .await
    }

    async fn delete_certificate(
        &self,
        tenant_id: TenantId,
        certificate_id: &str,
    ) -> ActionMgtResult<()> {
        (**self).delete_certificate(tenant_id, certificate_id).await
    }
}
