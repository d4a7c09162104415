//! Error types for action and certificate management
//!
//! Errors fall into two tiers. [`ClientError`] covers everything the caller
//! can fix (bad path segment, quota reached, missing entity, invalid field).
//! Everything else is a server error propagated unchanged from a
//! collaborator: the store, the secret processor or configuration loading.
//! Callers branch on [`ActionMgtError::kind`] instead of parsing messages.
//!
//! Messages never carry property values, so a secret that fails validation
//! cannot leak through an error string.

use crate::{ActionType, EntityKind};
use thiserror::Error;

/// Caller-fixable errors (4xx-equivalent).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    #[error("Invalid action type: {path}")]
    InvalidActionType { path: String },

    #[error("Maximum number of actions per action type reached for {action_type}: limit is {limit}")]
    MaxActionsPerTypeReached {
        action_type: ActionType,
        limit: usize,
    },

    #[error("No action configured on action type {action_type} with id {action_id}")]
    ActionNotFound {
        action_type: ActionType,
        action_id: String,
    },

    #[error("Invalid value for {field}: {reason}")]
    InvalidField { field: String, reason: String },

    #[error("Invalid authentication type: {value}")]
    InvalidAuthenticationType { value: String },

    #[error("No certificate found with id {certificate_id}")]
    CertificateNotFound { certificate_id: String },
}

impl ClientError {
    /// Shorthand for [`ClientError::InvalidField`].
    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Persistence layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Entity not found: {entity_kind} with id {id}")]
    NotFound { entity_kind: EntityKind, id: String },

    #[error("Insert failed for {entity_kind}: {reason}")]
    InsertFailed {
        entity_kind: EntityKind,
        reason: String,
    },

    #[error("Update failed for {entity_kind} with id {id}: {reason}")]
    UpdateFailed {
        entity_kind: EntityKind,
        id: String,
        reason: String,
    },

    #[error("Delete failed for {entity_kind} with id {id}: {reason}")]
    DeleteFailed {
        entity_kind: EntityKind,
        id: String,
        reason: String,
    },

    #[error("Store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Secret processing errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SecretError {
    #[error("Secret reference not found: {reference}")]
    ReferenceNotFound { reference: String },

    #[error("Failed to store secret for {property}: {reason}")]
    EncryptionFailed { property: String, reason: String },

    #[error("Failed to resolve secret for {property}: {reason}")]
    DecryptionFailed { property: String, reason: String },

    #[error("Secret vault unavailable: {reason}")]
    VaultUnavailable { reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to read config file: {reason}")]
    Io { reason: String },

    #[error("Failed to parse config TOML: {reason}")]
    Parse { reason: String },
}

/// Which tier an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The caller sent something invalid; retrying unchanged will fail again.
    Client,
    /// A collaborator failed; the operation may succeed later.
    Server,
}

/// Master error type for all action management operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ActionMgtError {
    #[error("Client error: {0}")]
    Client(#[from] ClientError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Secret error: {0}")]
    Secret(#[from] SecretError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl ActionMgtError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ActionMgtError::Client(_) => ErrorKind::Client,
            ActionMgtError::Storage(_) | ActionMgtError::Secret(_) | ActionMgtError::Config(_) => {
                ErrorKind::Server
            }
        }
    }

    pub fn is_client_error(&self) -> bool {
        self.kind() == ErrorKind::Client
    }

    /// The client error carried by this error, if any.
    pub fn as_client_error(&self) -> Option<&ClientError> {
        match self {
            ActionMgtError::Client(err) => Some(err),
            _ => None,
        }
    }
}

/// Result type alias for action management operations.
pub type ActionMgtResult<T> = Result<T, ActionMgtError>;

// =============================================================================
// TESTS
// =============================================================================
