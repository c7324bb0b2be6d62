/*!
 * Patient Flow Service
 *
 * Tracks patients through a visit or operation. The status lifecycle is
 * linear and strictly forward; `done` is terminal. Doctors may only act
 * on flows whose linked booking is their own.
 */

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::db::SchedulingStore;
use crate::models::{
    Appointment, AuditAction, Clinician, FlowStatus, Id, NewPatientFlow, Operation, PatientFlow,
};
use crate::services::audit_service::AuditService;
use crate::utils::errors::{Result, SchedulingError};
use crate::utils::permissions;

/// Patient flow service
#[derive(Clone)]
pub struct PatientFlowService {
    store: Arc<dyn SchedulingStore>,
    audit: AuditService,
}

impl PatientFlowService {
    /// Create a new patient flow service
    pub fn new(store: Arc<dyn SchedulingStore>) -> Self {
        let audit = AuditService::new(store.clone());
        Self { store, audit }
    }

    /// Open a flow record for exactly one booking.
    pub async fn create_flow(&self, actor: &Clinician, new: NewPatientFlow) -> Result<PatientFlow> {
        match (new.appointment_id, new.operation_id) {
            (Some(_), Some(_)) => {
                return Err(SchedulingError::invalid(
                    "operation_id",
                    "a flow links to an appointment or an operation, not both",
                ));
            }
            (None, None) => {
                return Err(SchedulingError::invalid(
                    "appointment_id",
                    "a flow must link to an appointment or an operation",
                ));
            }
            _ => {}
        }

        let (appointment, operation) = self
            .linked_booking(new.appointment_id, new.operation_id)
            .await?;

        let probe = PatientFlow {
            id: 0,
            appointment_id: new.appointment_id,
            operation_id: new.operation_id,
            status: new.status,
            arrival_time: new.arrival_time,
            status_changed_at: Utc::now(),
            notes: None,
        };
        permissions::ensure_flow_write(actor, &probe, appointment.as_ref(), operation.as_ref())?;

        Ok(self.store.create_patient_flow(new).await?)
    }

    /// Move a flow forward along its lifecycle.
    pub async fn update_status(
        &self,
        actor: &Clinician,
        id: Id,
        to: FlowStatus,
        now: DateTime<Utc>,
    ) -> Result<PatientFlow> {
        let flow = self
            .store
            .patient_flow(id)
            .await?
            .ok_or_else(|| SchedulingError::not_found(format!("patient flow {id}")))?;

        let (appointment, operation) = self
            .linked_booking(flow.appointment_id, flow.operation_id)
            .await?;
        permissions::ensure_flow_write(actor, &flow, appointment.as_ref(), operation.as_ref())?;

        let from = flow.status;
        if !from.can_transition_to(to) {
            return Err(SchedulingError::InvalidTransition {
                from: from.as_str(),
                to: to.as_str(),
            });
        }

        let updated = self.store.set_flow_status(id, to, now).await?;

        let patient_id = appointment
            .map(|a| a.patient_id)
            .or_else(|| operation.map(|o| o.patient_id));
        self.audit
            .emit(
                Some(actor),
                AuditAction::PatientFlowStatusUpdate,
                patient_id,
                serde_json::json!({
                    "flow_id": id,
                    "from": from.as_str(),
                    "to": to.as_str(),
                }),
            )
            .await;

        Ok(updated)
    }

    /// Flows visible to the actor.
    pub async fn list_flows(&self, actor: &Clinician) -> Result<Vec<PatientFlow>> {
        permissions::ensure_flow_read(actor)?;

        let mut visible = Vec::new();
        for flow in self.store.patient_flows().await? {
            let (appointment, operation) = self
                .linked_booking(flow.appointment_id, flow.operation_id)
                .await?;
            if permissions::flow_visible(actor, &flow, appointment.as_ref(), operation.as_ref()) {
                visible.push(flow);
            }
        }
        Ok(visible)
    }

    async fn linked_booking(
        &self,
        appointment_id: Option<Id>,
        operation_id: Option<Id>,
    ) -> Result<(Option<Appointment>, Option<Operation>)> {
        let appointment = match appointment_id {
            Some(id) => Some(
                self.store
                    .appointment(id)
                    .await?
                    .ok_or_else(|| SchedulingError::not_found(format!("appointment {id}")))?,
            ),
            None => None,
        };
        let operation = match operation_id {
            Some(id) => Some(
                self.store
                    .operation(id)
                    .await?
                    .ok_or_else(|| SchedulingError::not_found(format!("operation {id}")))?,
            ),
            None => None,
        };
        Ok((appointment, operation))
    }
}
