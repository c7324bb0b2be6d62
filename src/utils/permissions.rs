//! Authorization Gate
//!
//! Role-based access checks applied before any planning pipeline runs.
//! Rules follow the practice matrix:
//!
//! - admin: full access everywhere; sole writer of appointment and
//!   operation types
//! - assistant: full scheduling access, no type administration
//! - doctor: own appointments/operations/flows only; may manage own
//!   absences and breaks; read-only on practice configuration
//! - billing: read-only everywhere
//! - nurse/unknown: no grants
//!
//! Every rejection carries the violated rule key. Ownership ("own") means
//! the appointment's doctor is the actor, or the actor is part of the
//! operation team.

use crate::models::{
    Appointment, Clinician, ClinicianRole, Id, Operation, PatientFlow,
};
use crate::utils::errors::{Result, SchedulingError};

fn deny(rule: &str) -> Result<()> {
    Err(SchedulingError::not_authorized(rule))
}

pub fn is_admin(role: ClinicianRole) -> bool {
    matches!(role, ClinicianRole::Admin)
}

pub fn is_scheduler(role: ClinicianRole) -> bool {
    matches!(role, ClinicianRole::Admin | ClinicianRole::Assistant)
}

/// Roles allowed to read clinical scheduling data at all.
fn can_read_clinical(role: ClinicianRole) -> bool {
    matches!(
        role,
        ClinicianRole::Admin | ClinicianRole::Assistant | ClinicianRole::Doctor | ClinicianRole::Billing
    )
}

// ============================================================================
// Appointments
// ============================================================================

pub fn ensure_appointment_read(actor: &Clinician) -> Result<()> {
    if can_read_clinical(actor.role) {
        Ok(())
    } else {
        deny("appointments.read")
    }
}

/// Read visibility filter: doctors see only their own appointments.
pub fn appointment_visible(actor: &Clinician, appointment: &Appointment) -> bool {
    match actor.role {
        ClinicianRole::Doctor => appointment.doctor_id == actor.id,
        role => can_read_clinical(role),
    }
}

/// Write gate for a given target doctor: doctors may only book themselves.
pub fn ensure_appointment_write(actor: &Clinician, doctor_id: Id) -> Result<()> {
    match actor.role {
        ClinicianRole::Admin | ClinicianRole::Assistant => Ok(()),
        ClinicianRole::Doctor if actor.id == doctor_id => Ok(()),
        _ => deny("appointments.write"),
    }
}

// ============================================================================
// Catalog: appointment types, operation types, resources
// ============================================================================

pub fn ensure_appointment_type_read(actor: &Clinician) -> Result<()> {
    if can_read_clinical(actor.role) {
        Ok(())
    } else {
        deny("appointment_types.read")
    }
}

pub fn ensure_appointment_type_write(actor: &Clinician) -> Result<()> {
    if is_admin(actor.role) {
        Ok(())
    } else {
        deny("appointment_types.write")
    }
}

pub fn ensure_operation_type_write(actor: &Clinician) -> Result<()> {
    if is_admin(actor.role) {
        Ok(())
    } else {
        deny("operation_types.write")
    }
}

pub fn ensure_practice_config_read(actor: &Clinician) -> Result<()> {
    if can_read_clinical(actor.role) {
        Ok(())
    } else {
        deny("practice_config.read")
    }
}

pub fn ensure_practice_hours_write(actor: &Clinician) -> Result<()> {
    if is_scheduler(actor.role) {
        Ok(())
    } else {
        deny("practice_hours.write")
    }
}

pub fn ensure_resource_write(actor: &Clinician) -> Result<()> {
    if is_scheduler(actor.role) {
        Ok(())
    } else {
        deny("resources.write")
    }
}

// ============================================================================
// Roster: doctor hours, absences, breaks
// ============================================================================

pub fn ensure_doctor_hours_write(actor: &Clinician) -> Result<()> {
    if is_scheduler(actor.role) {
        Ok(())
    } else {
        deny("doctor_hours.write")
    }
}

/// Doctors may manage their own absences; schedulers manage everyone's.
pub fn ensure_absence_write(actor: &Clinician, doctor_id: Id) -> Result<()> {
    match actor.role {
        ClinicianRole::Admin | ClinicianRole::Assistant => Ok(()),
        ClinicianRole::Doctor if actor.id == doctor_id => Ok(()),
        _ => deny("doctor_absences.write"),
    }
}

/// Doctors may manage their own breaks; practice-wide breaks require a
/// scheduler.
pub fn ensure_break_write(actor: &Clinician, doctor_id: Option<Id>) -> Result<()> {
    match actor.role {
        ClinicianRole::Admin | ClinicianRole::Assistant => Ok(()),
        ClinicianRole::Doctor if doctor_id == Some(actor.id) => Ok(()),
        _ => deny("doctor_breaks.write"),
    }
}

// ============================================================================
// Operations
// ============================================================================

pub fn ensure_operation_read(actor: &Clinician) -> Result<()> {
    if can_read_clinical(actor.role) {
        Ok(())
    } else {
        deny("operations.read")
    }
}

/// Read visibility filter: doctors see only operations they take part in.
pub fn operation_visible(actor: &Clinician, operation: &Operation) -> bool {
    match actor.role {
        ClinicianRole::Doctor => operation.involves(actor.id),
        role => can_read_clinical(role),
    }
}

/// Operation writes are reserved for schedulers; doctors are read-only.
pub fn ensure_operation_write(actor: &Clinician) -> Result<()> {
    if is_scheduler(actor.role) {
        Ok(())
    } else {
        deny("operations.write")
    }
}

pub fn ensure_operation_status_update(actor: &Clinician) -> Result<()> {
    if is_scheduler(actor.role) {
        Ok(())
    } else {
        deny("operations.status_update")
    }
}

// ============================================================================
// Suggestions
// ============================================================================

/// Doctors may only request suggestions for themselves.
pub fn ensure_suggest(actor: &Clinician, doctor_id: Id) -> Result<()> {
    match actor.role {
        ClinicianRole::Admin | ClinicianRole::Assistant | ClinicianRole::Billing => Ok(()),
        ClinicianRole::Doctor if actor.id == doctor_id => Ok(()),
        _ => deny("appointments.suggest"),
    }
}

pub fn ensure_operation_suggest(actor: &Clinician, primary_surgeon_id: Id) -> Result<()> {
    match actor.role {
        ClinicianRole::Admin | ClinicianRole::Assistant | ClinicianRole::Billing => Ok(()),
        ClinicianRole::Doctor if actor.id == primary_surgeon_id => Ok(()),
        _ => deny("operations.suggest"),
    }
}

// ============================================================================
// Patient flow
// ============================================================================

pub fn ensure_flow_read(actor: &Clinician) -> Result<()> {
    if can_read_clinical(actor.role) {
        Ok(())
    } else {
        deny("patient_flows.read")
    }
}

/// A flow is visible to a doctor when its linked booking is their own.
pub fn flow_visible(
    actor: &Clinician,
    _flow: &PatientFlow,
    appointment: Option<&Appointment>,
    operation: Option<&Operation>,
) -> bool {
    match actor.role {
        ClinicianRole::Doctor => {
            appointment.map(|a| a.doctor_id == actor.id).unwrap_or(false)
                || operation.map(|o| o.involves(actor.id)).unwrap_or(false)
        }
        role => can_read_clinical(role),
    }
}

/// Flow writes: schedulers always, doctors for their own flows, billing
/// never.
pub fn ensure_flow_write(
    actor: &Clinician,
    flow: &PatientFlow,
    appointment: Option<&Appointment>,
    operation: Option<&Operation>,
) -> Result<()> {
    match actor.role {
        ClinicianRole::Admin | ClinicianRole::Assistant => Ok(()),
        ClinicianRole::Doctor if flow_visible(actor, flow, appointment, operation) => Ok(()),
        _ => deny("patient_flows.write"),
    }
}

// ============================================================================
// Calendar
// ============================================================================

pub fn ensure_calendar_read(actor: &Clinician) -> Result<()> {
    if can_read_clinical(actor.role) {
        Ok(())
    } else {
        deny("calendar.read")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crate::models::{AppointmentStatus, OperationStatus};

    fn clinician(id: Id, role: ClinicianRole) -> Clinician {
        Clinician {
            id,
            display_name: format!("clinician {id}"),
            role,
            active: true,
            color: None,
        }
    }

    fn appointment(doctor_id: Id) -> Appointment {
        let now = Utc::now();
        Appointment {
            id: 1,
            patient_id: 1,
            doctor_id,
            type_id: None,
            start_time: now,
            end_time: now + chrono::Duration::minutes(30),
            status: AppointmentStatus::Scheduled,
            is_no_show: false,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn operation(surgeon_id: Id, assistant_id: Option<Id>) -> Operation {
        let now = Utc::now();
        Operation {
            id: 1,
            patient_id: 1,
            primary_surgeon_id: surgeon_id,
            assistant_id,
            anesthesist_id: None,
            op_room_id: 1,
            op_type_id: 1,
            start_time: now,
            end_time: now + chrono::Duration::hours(1),
            status: OperationStatus::Planned,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_appointment_write_matrix() {
        assert!(ensure_appointment_write(&clinician(1, ClinicianRole::Admin), 9).is_ok());
        assert!(ensure_appointment_write(&clinician(1, ClinicianRole::Assistant), 9).is_ok());
        // doctors book themselves only
        assert!(ensure_appointment_write(&clinician(9, ClinicianRole::Doctor), 9).is_ok());
        assert!(ensure_appointment_write(&clinician(1, ClinicianRole::Doctor), 9).is_err());
        // billing and nurse never write
        assert!(ensure_appointment_write(&clinician(1, ClinicianRole::Billing), 1).is_err());
        assert!(ensure_appointment_write(&clinician(1, ClinicianRole::Nurse), 1).is_err());
    }

    #[test]
    fn test_appointment_visibility() {
        let appt = appointment(9);
        assert!(appointment_visible(&clinician(1, ClinicianRole::Admin), &appt));
        assert!(appointment_visible(&clinician(1, ClinicianRole::Billing), &appt));
        assert!(appointment_visible(&clinician(9, ClinicianRole::Doctor), &appt));
        assert!(!appointment_visible(&clinician(2, ClinicianRole::Doctor), &appt));
        assert!(!appointment_visible(&clinician(2, ClinicianRole::Nurse), &appt));
    }

    #[test]
    fn test_type_writes_admin_only() {
        assert!(ensure_appointment_type_write(&clinician(1, ClinicianRole::Admin)).is_ok());
        assert!(ensure_appointment_type_write(&clinician(1, ClinicianRole::Assistant)).is_err());
        assert!(ensure_operation_type_write(&clinician(1, ClinicianRole::Assistant)).is_err());
    }

    #[test]
    fn test_operation_write_and_visibility() {
        assert!(ensure_operation_write(&clinician(1, ClinicianRole::Assistant)).is_ok());
        assert!(ensure_operation_write(&clinician(1, ClinicianRole::Doctor)).is_err());

        let op = operation(5, Some(6));
        assert!(operation_visible(&clinician(5, ClinicianRole::Doctor), &op));
        assert!(operation_visible(&clinician(6, ClinicianRole::Doctor), &op));
        assert!(!operation_visible(&clinician(7, ClinicianRole::Doctor), &op));
        assert!(operation_visible(&clinician(1, ClinicianRole::Billing), &op));
    }

    #[test]
    fn test_suggest_self_only_for_doctors() {
        assert!(ensure_suggest(&clinician(3, ClinicianRole::Doctor), 3).is_ok());
        assert!(ensure_suggest(&clinician(3, ClinicianRole::Doctor), 4).is_err());
        assert!(ensure_suggest(&clinician(1, ClinicianRole::Billing), 4).is_ok());
    }

    #[test]
    fn test_absence_and_break_ownership() {
        assert!(ensure_absence_write(&clinician(3, ClinicianRole::Doctor), 3).is_ok());
        assert!(ensure_absence_write(&clinician(3, ClinicianRole::Doctor), 4).is_err());
        assert!(ensure_break_write(&clinician(3, ClinicianRole::Doctor), Some(3)).is_ok());
        // practice-wide breaks need a scheduler
        assert!(ensure_break_write(&clinician(3, ClinicianRole::Doctor), None).is_err());
        assert!(ensure_break_write(&clinician(1, ClinicianRole::Assistant), None).is_ok());
    }

    #[test]
    fn test_flow_write_matrix() {
        let flow = PatientFlow {
            id: 1,
            appointment_id: Some(1),
            operation_id: None,
            status: crate::models::FlowStatus::Registered,
            arrival_time: None,
            status_changed_at: Utc::now(),
            notes: None,
        };
        let appt = appointment(9);
        assert!(ensure_flow_write(&clinician(1, ClinicianRole::Assistant), &flow, Some(&appt), None).is_ok());
        assert!(ensure_flow_write(&clinician(9, ClinicianRole::Doctor), &flow, Some(&appt), None).is_ok());
        assert!(ensure_flow_write(&clinician(2, ClinicianRole::Doctor), &flow, Some(&appt), None).is_err());
        assert!(ensure_flow_write(&clinician(1, ClinicianRole::Billing), &flow, Some(&appt), None).is_err());
    }

    #[test]
    fn test_unknown_role_is_denied_everywhere() {
        let actor = clinician(1, ClinicianRole::Unknown);
        assert!(ensure_appointment_read(&actor).is_err());
        assert!(ensure_operation_read(&actor).is_err());
        assert!(ensure_calendar_read(&actor).is_err());
        assert!(ensure_flow_read(&actor).is_err());
    }

    #[test]
    fn test_rule_key_in_error() {
        let err = ensure_operation_write(&clinician(1, ClinicianRole::Billing)).unwrap_err();
        match err {
            SchedulingError::NotAuthorized { rule } => assert_eq!(rule, "operations.write"),
            other => panic!("expected NotAuthorized, got {other:?}"),
        }
    }
}
