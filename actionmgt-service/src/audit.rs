//! Audit logging through `tracing`
//!
//! Events are emitted on the `audit` target as one JSON document per event,
//! so a subscriber can route them apart from operational logs with a filter
//! such as `audit=info`.

use actionmgt_core::{AuditEvent, AuditLogger};

pub const AUDIT_TARGET: &str = "audit";

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditLogger;

impl TracingAuditLogger {
    pub fn new() -> Self {
        Self
    }
}

impl AuditLogger for TracingAuditLogger {
    fn record(&self, event: AuditEvent) {
        match serde_json::to_string(&event) {
            Ok(json) => tracing::info!(
                target: AUDIT_TARGET,
                operation = %event.operation,
                tenant_id = %event.tenant_id,
                event = %json,
                "audit event"
            ),
            Err(e) => tracing::warn!(
                target: AUDIT_TARGET,
                operation = %event.operation,
                error = %e,
                "failed to serialize audit event"
            ),
        }
    }
}
