/*!
 * Appointment Model
 *
 * Appointments are encounter slots for a patient with a responsible
 * doctor, optionally consuming resources (rooms/devices) through unique
 * appointment-resource links.
 *
 * `patient_id` is an integer reference into the external patient store;
 * the core never dereferences it.
 */

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::Id;

/// Appointment status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    Cancelled,
    Completed,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
        }
    }

    /// Only scheduled/confirmed appointments are eligible for the no-show flag.
    pub fn no_show_eligible(&self) -> bool {
        matches!(self, Self::Scheduled | Self::Confirmed)
    }
}

impl std::fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Configurable appointment category (UI name/color, optional default
/// duration). Deactivating a type keeps historical references valid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentType {
    pub id: Id,
    pub name: String,
    pub color: Option<String>,
    pub duration_minutes: Option<i64>,
    pub active: bool,
}

/// Data for configuring an appointment type.
#[derive(Debug, Clone)]
pub struct NewAppointmentType {
    pub name: String,
    pub color: Option<String>,
    pub duration_minutes: Option<i64>,
    pub active: bool,
}

/// A scheduled appointment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Id,
    pub patient_id: i64,
    pub doctor_id: Id,
    pub type_id: Option<Id>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: AppointmentStatus,
    /// Confirmed no-show flag; immutable once set.
    pub is_no_show: bool,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn is_past(&self, now: DateTime<Utc>) -> bool {
        self.end_time < now
    }
}

/// Request to plan a new appointment.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateAppointmentRequest {
    #[validate(range(min = 1, message = "patient_id must be a positive integer"))]
    pub patient_id: i64,

    #[validate(range(min = 1, message = "doctor_id must be a positive integer"))]
    pub doctor_id: Id,

    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,

    pub type_id: Option<Id>,
    pub resource_ids: Option<Vec<Id>>,
    pub status: Option<AppointmentStatus>,

    #[validate(length(max = 5000, message = "notes must not exceed 5000 characters"))]
    pub notes: Option<String>,
}

/// Patch for an existing appointment. Absent fields stay untouched;
/// `resource_ids` replaces the full link set when present.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateAppointmentRequest {
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub type_id: Option<Id>,
    pub resource_ids: Option<Vec<Id>>,
    pub status: Option<AppointmentStatus>,

    #[validate(length(max = 5000, message = "notes must not exceed 5000 characters"))]
    pub notes: Option<String>,
}

impl UpdateAppointmentRequest {
    pub fn is_empty(&self) -> bool {
        self.start_time.is_none()
            && self.end_time.is_none()
            && self.type_id.is_none()
            && self.resource_ids.is_none()
            && self.status.is_none()
            && self.notes.is_none()
    }
}

/// Store-level data for creating an appointment together with its
/// resource links (one atomic unit).
#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub patient_id: i64,
    pub doctor_id: Id,
    pub type_id: Option<Id>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
    /// Deduplicated resource ids; duplicate pairs are ignored on insert.
    pub resource_ids: Vec<Id>,
}

/// Store-level patch for an appointment.
#[derive(Debug, Clone, Default)]
pub struct AppointmentPatch {
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub type_id: Option<Id>,
    pub status: Option<AppointmentStatus>,
    pub notes: Option<String>,
    pub resource_ids: Option<Vec<Id>>,
}

// ============================================================================
// Slot suggestion DTOs
// ============================================================================

/// Reference to a doctor in suggestion/calendar payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorRef {
    pub id: Id,
    pub name: String,
    pub color: Option<String>,
}

/// Type payload attached to a suggestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeBadge {
    pub id: Id,
    pub name: String,
    pub color: Option<String>,
}

/// A proposed free slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotSuggestion {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(rename = "type")]
    pub appointment_type: Option<TypeBadge>,
    pub doctor_color: Option<String>,
    pub type_color: Option<String>,
    pub resource_ids: Vec<Id>,
    pub resource_colors: Vec<String>,
}

/// Suggestions of one substitute doctor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorSuggestions {
    pub doctor: DoctorRef,
    pub suggestions: Vec<SlotSuggestion>,
}

/// Response of the slot-suggestion operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestionResponse {
    pub primary_doctor: DoctorRef,
    pub primary_suggestions: Vec<SlotSuggestion>,
    pub fallback_suggestions: Vec<DoctorSuggestions>,
}

/// Parameters of the slot-suggestion operation. Duration comes either
/// from `duration_minutes` or from the type's default duration.
#[derive(Debug, Clone)]
pub struct SuggestQuery {
    pub doctor_id: Id,
    pub start_date: NaiveDate,
    pub duration_minutes: Option<i64>,
    pub type_id: Option<Id>,
    pub resource_ids: Option<Vec<Id>>,
    pub limit: usize,
    /// Evaluation time; defaults to the current instant. Suggestions for
    /// today never start before this.
    pub now: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_no_show_eligibility() {
        assert!(AppointmentStatus::Scheduled.no_show_eligible());
        assert!(AppointmentStatus::Confirmed.no_show_eligible());
        assert!(!AppointmentStatus::Cancelled.no_show_eligible());
        assert!(!AppointmentStatus::Completed.no_show_eligible());
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&AppointmentStatus::Scheduled).unwrap();
        assert_eq!(json, "\"scheduled\"");
        let status: AppointmentStatus = serde_json::from_str("\"completed\"").unwrap();
        assert_eq!(status, AppointmentStatus::Completed);
    }

    #[test]
    fn test_create_request_validation() {
        let request = CreateAppointmentRequest {
            patient_id: 0,
            doctor_id: 1,
            start_time: Utc::now(),
            end_time: Utc::now() + chrono::Duration::minutes(30),
            type_id: None,
            resource_ids: None,
            status: None,
            notes: None,
        };
        assert!(request.validate().is_err());

        let request = CreateAppointmentRequest {
            patient_id: 7,
            ..request
        };
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_update_request_is_empty() {
        assert!(UpdateAppointmentRequest::default().is_empty());
        let patch = UpdateAppointmentRequest {
            status: Some(AppointmentStatus::Confirmed),
            ..Default::default()
        };
        assert!(!patch.is_empty());
    }
}
