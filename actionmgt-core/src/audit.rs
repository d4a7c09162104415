//! Audit event model and sink trait

use crate::action::{Action, ActionType};
use crate::certificate::Certificate;
use crate::tenant::{EntityId, TenantId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditOperation {
    Add,
    Update,
    Delete,
    Activate,
    Deactivate,
}

impl fmt::Display for AuditOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            AuditOperation::Add => "ADD",
            AuditOperation::Update => "UPDATE",
            AuditOperation::Delete => "DELETE",
            AuditOperation::Activate => "ACTIVATE",
            AuditOperation::Deactivate => "DEACTIVATE",
        };
        write!(f, "{}", value)
    }
}

/// The entity an audit event is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditSubject {
    Action {
        action_type: ActionType,
        action_id: EntityId,
    },
    Certificate {
        certificate_id: EntityId,
    },
}

/// One audit record.
///
/// `payload` is built from masked values only; constructing an event never
/// copies a secret or raw certificate content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub operation: AuditOperation,
    pub subject: AuditSubject,
    pub tenant_id: TenantId,
    pub recorded_at: DateTime<Utc>,
    pub payload: serde_json::Value,
}

impl AuditEvent {
    pub fn for_action(operation: AuditOperation, tenant_id: TenantId, action: &Action) -> Self {
        let payload = serde_json::to_value(action.masked()).unwrap_or(serde_json::Value::Null);
        Self {
            operation,
            subject: AuditSubject::Action {
                action_type: action.action_type,
                action_id: action.id.clone(),
            },
            tenant_id,
            recorded_at: Utc::now(),
            payload,
        }
    }

    pub fn for_certificate(
        operation: AuditOperation,
        tenant_id: TenantId,
        certificate: &Certificate,
    ) -> Self {
        Self {
            operation,
            subject: AuditSubject::Certificate {
                certificate_id: certificate.id.clone(),
            },
            tenant_id,
            recorded_at: Utc::now(),
            payload: serde_json::json!({
                "name": certificate.name,
                "fingerprint": certificate.fingerprint(),
            }),
        }
    }
}

/// Sink for audit events.
///
/// Recording is fire-and-forget: implementations must not block for long and
/// have no way to fail the operation that produced the event.
pub trait AuditLogger: Send + Sync {
    fn record(&self, event: AuditEvent);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{ActionModel, EndpointConfig};
    use crate::auth::{Authentication, MASKED_SECRET};
    use crate::certificate::CertificateModel;

    #[test]
    fn test_action_event_payload_is_masked() {
        let action = ActionModel::new(
            "a",
            EndpointConfig::new("https://x.example.com", Authentication::api_key("X-Key", "s3cr3t")),
        )
        .into_action("id-1".to_string(), ActionType::PreUpdateProfile);
        let event = AuditEvent::for_action(AuditOperation::Add, TenantId::new(7), &action);

        let rendered = serde_json::to_string(&event).unwrap();
        assert!(!rendered.contains("s3cr3t"));
        assert!(rendered.contains(MASKED_SECRET));
        assert!(rendered.contains("X-Key"));
        assert_eq!(
            event.subject,
            AuditSubject::Action {
                action_type: ActionType::PreUpdateProfile,
                action_id: "id-1".to_string(),
            }
        );
    }

    #[test]
    fn test_certificate_event_carries_fingerprint_not_content() {
        let cert = CertificateModel::new("ca", b"PEM-BODY".to_vec()).into_certificate("c".into());
        let event = AuditEvent::for_certificate(AuditOperation::Delete, TenantId::new(1), &cert);
        assert_eq!(event.payload["fingerprint"], cert.fingerprint());
        assert!(!event.payload.to_string().contains("PEM-BODY"));
        assert_eq!(event.operation.to_string(), "DELETE");
    }
}
