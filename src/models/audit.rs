/*!
 * Audit Event Model
 *
 * Append-only structured events for actions and decisions. Action names
 * form a closed vocabulary; collaborators must not invent new strings.
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Id;

/// Closed vocabulary of audit actions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    AppointmentCreate,
    AppointmentView,
    AppointmentList,
    AppointmentUpdate,
    AppointmentDelete,
    AppointmentMarkNoShow,
    AppointmentSuggest,
    DoctorSubstitutionSuggest,
    OperationCreate,
    OperationView,
    OperationList,
    OperationUpdate,
    OperationDelete,
    OperationStatusUpdate,
    OperationSuggest,
    PatientFlowStatusUpdate,
    ResourceBookingConflict,
    OpStatsView,
    OpDashboardView,
    OpTimelineView,
    ResourceCalendarView,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AppointmentCreate => "appointment_create",
            Self::AppointmentView => "appointment_view",
            Self::AppointmentList => "appointment_list",
            Self::AppointmentUpdate => "appointment_update",
            Self::AppointmentDelete => "appointment_delete",
            Self::AppointmentMarkNoShow => "appointment_mark_no_show",
            Self::AppointmentSuggest => "appointment_suggest",
            Self::DoctorSubstitutionSuggest => "doctor_substitution_suggest",
            Self::OperationCreate => "operation_create",
            Self::OperationView => "operation_view",
            Self::OperationList => "operation_list",
            Self::OperationUpdate => "operation_update",
            Self::OperationDelete => "operation_delete",
            Self::OperationStatusUpdate => "operation_status_update",
            Self::OperationSuggest => "operation_suggest",
            Self::PatientFlowStatusUpdate => "patient_flow_status_update",
            Self::ResourceBookingConflict => "resource_booking_conflict",
            Self::OpStatsView => "op_stats_view",
            Self::OpDashboardView => "op_dashboard_view",
            Self::OpTimelineView => "op_timeline_view",
            Self::ResourceCalendarView => "resource_calendar_view",
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A persisted audit event. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Id,
    pub timestamp: DateTime<Utc>,
    pub actor_id: Option<Id>,
    pub role_name: String,
    pub action: AuditAction,
    pub patient_id: Option<i64>,
    pub meta: serde_json::Value,
}

/// Data for appending an audit event.
#[derive(Debug, Clone)]
pub struct NewAuditEvent {
    pub actor_id: Option<Id>,
    pub role_name: String,
    pub action: AuditAction,
    pub patient_id: Option<i64>,
    pub meta: serde_json::Value,
}
