//! actionmgt Core - Entity Types
//!
//! Data types shared by every other crate in the workspace: tenant ids,
//! actions and their endpoint authentication, certificates, configuration,
//! the validator functions and the error taxonomy. The collaborator traits
//! consumed by the management services (`AuditLogger`, `SecretProcessor`)
//! also live here so that test doubles can be written without depending on
//! the service crate.

pub mod action;
pub mod audit;
pub mod auth;
pub mod certificate;
pub mod config;
pub mod error;
pub mod secret;
pub mod tenant;
pub mod validation;

pub use action::{
    Action, ActionModel, ActionPatch, ActionStatus, ActionType, EndpointConfig, EndpointPatch,
};
pub use audit::{AuditEvent, AuditLogger, AuditOperation, AuditSubject};
pub use auth::{
    AuthProperty, AuthScheme, AuthTransition, AuthType, Authentication, MASKED_SECRET,
};
pub use certificate::{Certificate, CertificateModel};
pub use config::{ActionMgtConfig, CacheConfig};
pub use error::{
    ActionMgtError, ActionMgtResult, ClientError, ConfigError, ErrorKind, SecretError,
    StorageError,
};
pub use secret::SecretProcessor;
pub use tenant::{new_entity_id, EntityId, EntityKind, TenantId};
