//! Secret processing seam
//!
//! The management service never persists a secret property value. Before a
//! store write it asks the processor to turn the plaintext authentication
//! into its stored form, and after a read it asks for the reverse. What the
//! stored form looks like (ciphertext, vault reference) is up to the
//! implementation.

use crate::auth::Authentication;
use crate::error::ActionMgtResult;
use crate::tenant::TenantId;
use async_trait::async_trait;

#[async_trait]
pub trait SecretProcessor: Send + Sync {
    /// Stored form of `authentication` for the action `action_id`.
    ///
    /// Non-secret properties pass through unchanged.
    async fn encrypt(
        &self,
        tenant_id: TenantId,
        action_id: &str,
        authentication: &Authentication,
    ) -> ActionMgtResult<Authentication>;

    /// Plaintext form of a stored authentication.
    async fn decrypt(
        &self,
        tenant_id: TenantId,
        action_id: &str,
        stored: &Authentication,
    ) -> ActionMgtResult<Authentication>;

    /// Release whatever backs the secrets of a stored authentication.
    ///
    /// Deleting something already gone is not an error.
    async fn delete(
        &self,
        tenant_id: TenantId,
        action_id: &str,
        stored: &Authentication,
    ) -> ActionMgtResult<()>;
}
