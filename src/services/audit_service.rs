/*!
 * Audit Emitter
 *
 * Appends structured events for actions and decisions. Emission is
 * best-effort: sink failures are logged and never convert a successful
 * operation into a failure. The sink is append-only and safe to call
 * from concurrent admissions.
 */

use std::sync::Arc;

use crate::db::SchedulingStore;
use crate::models::{AuditAction, Clinician, NewAuditEvent};

/// Audit service
#[derive(Clone)]
pub struct AuditService {
    store: Arc<dyn SchedulingStore>,
}

impl AuditService {
    /// Create a new audit service
    pub fn new(store: Arc<dyn SchedulingStore>) -> Self {
        Self { store }
    }

    /// Append an audit event. Failures are logged, never propagated.
    pub async fn emit(
        &self,
        actor: Option<&Clinician>,
        action: AuditAction,
        patient_id: Option<i64>,
        meta: serde_json::Value,
    ) {
        let event = NewAuditEvent {
            actor_id: actor.map(|a| a.id),
            role_name: actor
                .map(|a| a.role.as_str().to_string())
                .unwrap_or_else(|| "unknown".to_string()),
            action,
            patient_id,
            meta,
        };

        if let Err(err) = self.store.append_audit(event).await {
            tracing::warn!(action = %action, error = %err, "failed to write audit event");
        }
    }
}
