//! actionmgt Service - Management Operations
//!
//! The tenant-scoped entry points for action and certificate management.
//! Services are plain values built from injected collaborators:
//!
//! - a store implementing [`ActionStore`] or [`CertificateStore`], which the
//!   service wraps in its own cache
//! - a [`SecretProcessor`] that turns secret authentication properties into
//!   stored references and back
//! - an [`AuditLogger`] receiving one event per successful mutation
//!
//! ```ignore
//! let service = ActionManagementService::new(
//!     InMemoryActionStore::new(),
//!     Arc::new(ReferenceSecretProcessor::new()),
//!     Arc::new(TracingAuditLogger::new()),
//!     ActionMgtConfig::from_env(),
//! )?;
//! let action = service.add_action(tenant, "preIssueAccessToken", model).await?;
//! ```
//!
//! [`ActionStore`]: actionmgt_storage::ActionStore
//! [`CertificateStore`]: actionmgt_storage::CertificateStore
//! [`SecretProcessor`]: actionmgt_core::SecretProcessor
//! [`AuditLogger`]: actionmgt_core::AuditLogger

pub mod action_lock;
pub mod action_service;
pub mod audit;
pub mod certificate_service;
pub mod secret;
pub mod telemetry;

pub use action_lock::{ActionLocks, ActionWriteGuard};
pub use action_service::ActionManagementService;
pub use audit::TracingAuditLogger;
pub use certificate_service::CertificateManagementService;
pub use secret::ReferenceSecretProcessor;
pub use telemetry::{init_tracing, LogFormat, TelemetryConfig, TelemetryError};
