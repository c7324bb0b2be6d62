/*!
 * Operation Lifecycle
 *
 * Enforces the operation status machine in time:
 * planned -> confirmed -> running -> done, with cancelled reachable from
 * any state and `running` gated on the start time having been reached.
 *
 * Every transition attempt, allowed or rejected, emits an
 * `operation_status_update` audit event with `{from, to, ok, detail?}`.
 */

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::db::SchedulingStore;
use crate::models::{AuditAction, Clinician, Id, Operation, OperationStatus};
use crate::services::audit_service::AuditService;
use crate::utils::errors::{Result, SchedulingError};
use crate::utils::permissions;

/// A running operation with its completion ratio.
#[derive(Debug, Clone, serde::Serialize)]
pub struct LiveOperation {
    pub operation: Operation,
    pub progress: f64,
}

/// Operation lifecycle service
#[derive(Clone)]
pub struct OperationLifecycleService {
    store: Arc<dyn SchedulingStore>,
    audit: AuditService,
}

impl OperationLifecycleService {
    /// Create a new lifecycle service
    pub fn new(store: Arc<dyn SchedulingStore>) -> Self {
        let audit = AuditService::new(store.clone());
        Self { store, audit }
    }

    /// Apply a status transition at instant `now`.
    pub async fn update_status(
        &self,
        actor: &Clinician,
        id: Id,
        to: OperationStatus,
        now: DateTime<Utc>,
    ) -> Result<Operation> {
        permissions::ensure_operation_status_update(actor)?;

        let operation = self
            .store
            .operation(id)
            .await?
            .ok_or_else(|| SchedulingError::not_found(format!("operation {id}")))?;
        let from = operation.status;

        if !from.can_transition_to(to) {
            if to == OperationStatus::Done && from != OperationStatus::Running {
                self.audit_transition(actor, &operation, from, to, false, Some("done_not_running"))
                    .await;
                return Err(SchedulingError::DoneRequiresRunning {
                    from: from.as_str(),
                });
            }
            self.audit_transition(actor, &operation, from, to, false, Some("invalid_transition"))
                .await;
            return Err(SchedulingError::InvalidTransition {
                from: from.as_str(),
                to: to.as_str(),
            });
        }

        if to == OperationStatus::Running && now < operation.start_time {
            self.audit_transition(actor, &operation, from, to, false, Some("running_before_start"))
                .await;
            return Err(SchedulingError::StartNotReached {
                start_time: operation.start_time,
            });
        }

        let updated = self.store.set_operation_status(id, to).await?;
        self.audit_transition(actor, &updated, from, to, true, None)
            .await;

        Ok(updated)
    }

    /// Running operations that have started, with progress, visible to
    /// the actor.
    pub async fn running_operations(
        &self,
        actor: &Clinician,
        now: DateTime<Utc>,
    ) -> Result<Vec<LiveOperation>> {
        permissions::ensure_operation_read(actor)?;

        let operations = self
            .store
            .running_operations(now)
            .await?
            .into_iter()
            .filter(|o| permissions::operation_visible(actor, o))
            .map(|operation| {
                let progress = operation.progress(now);
                LiveOperation {
                    operation,
                    progress,
                }
            })
            .collect();

        self.audit
            .emit(
                Some(actor),
                AuditAction::OpDashboardView,
                None,
                serde_json::json!({ "live": true }),
            )
            .await;

        Ok(operations)
    }

    async fn audit_transition(
        &self,
        actor: &Clinician,
        operation: &Operation,
        from: OperationStatus,
        to: OperationStatus,
        ok: bool,
        detail: Option<&str>,
    ) {
        let mut meta = serde_json::json!({
            "from": from.as_str(),
            "to": to.as_str(),
            "ok": ok,
        });
        if let (Some(detail), Some(object)) = (detail, meta.as_object_mut()) {
            object.insert("detail".to_string(), serde_json::json!(detail));
        }

        self.audit
            .emit(
                Some(actor),
                AuditAction::OperationStatusUpdate,
                Some(operation.patient_id),
                meta,
            )
            .await;
    }
}
