/*!
 * Error Handling
 *
 * The typed failure vocabulary of the scheduling core. Errors carry the
 * machine-readable details collaborators need to render responses;
 * transport mapping happens outside the core.
 *
 * Propagation policy: oracle and detector findings bubble unchanged
 * through the planner; gate failures never reach the planner; audit
 * failures are logged and never surface here.
 */

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::StoreError;
use crate::models::{Id, SlotSuggestion};

/// Scheduling result type
pub type Result<T> = std::result::Result<T, SchedulingError>;

/// What kind of double booking a conflict describes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    DoctorConflict,
    RoomConflict,
    DeviceConflict,
    PatientConflict,
}

impl ConflictKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DoctorConflict => "doctor_conflict",
            Self::RoomConflict => "room_conflict",
            Self::DeviceConflict => "device_conflict",
            Self::PatientConflict => "patient_conflict",
        }
    }
}

/// Which booking table the conflicting record lives in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum BookingModel {
    Appointment,
    Operation,
}

impl BookingModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Appointment => "Appointment",
            Self::Operation => "Operation",
        }
    }
}

/// A single detected scheduling conflict.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Conflict {
    pub kind: ConflictKind,
    pub model: BookingModel,
    pub id: Id,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<Id>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doctor_id: Option<Id>,
    pub message: String,
}

/// Why a window fails the working-hours check.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HoursViolationReason {
    NoPracticeHours,
    OutsidePracticeHours,
    NoDoctorHours,
    OutsideDoctorHours,
}

impl HoursViolationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoPracticeHours => "no_practice_hours",
            Self::OutsidePracticeHours => "outside_practice_hours",
            Self::NoDoctorHours => "no_doctor_hours",
            Self::OutsideDoctorHours => "outside_doctor_hours",
        }
    }
}

/// Details of a working-hours rejection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkingHoursViolation {
    pub doctor_id: Id,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub reason: HoursViolationReason,
    /// Alternative slots with other doctors, filled by the planner.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub alternatives: Vec<SlotSuggestion>,
}

/// Details of an absence rejection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbsenceRejection {
    pub doctor_id: Id,
    pub date: NaiveDate,
    pub absence_id: Id,
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub alternatives: Vec<SlotSuggestion>,
}

/// Details of a break rejection. `doctor_id` is absent for practice-wide
/// breaks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakRejection {
    pub doctor_id: Option<Id>,
    pub date: NaiveDate,
    pub break_id: Id,
    pub break_start: NaiveTime,
    pub break_end: NaiveTime,
}

/// Typed failures of the scheduling core.
#[derive(Debug, Error)]
pub enum SchedulingError {
    /// Structural input problem. Not retryable; names the offending field.
    #[error("invalid {field}: {message}")]
    InvalidData { field: String, message: String },

    /// Authorization gate rejection; carries the violated rule key.
    #[error("not authorized: {rule}")]
    NotAuthorized { rule: String },

    /// Referenced id does not exist or is inactive where activity is
    /// required.
    #[error("not found: {what}")]
    NotFound { what: String },

    /// Requested time is outside practice and/or doctor hours.
    #[error("outside working hours: {}", .0.reason.as_str())]
    WorkingHours(WorkingHoursViolation),

    /// Doctor is absent on the requested date(s).
    #[error("doctor {} is absent on {}", .0.doctor_id, .0.date)]
    DoctorAbsent(AbsenceRejection),

    /// Requested time overlaps a break.
    #[error("requested time overlaps break {}", .0.break_id)]
    BreakConflict(BreakRejection),

    /// Double bookings were detected; the list is non-empty and sorted.
    #[error("{} scheduling conflict(s) detected", .0.len())]
    Conflicts(Vec<Conflict>),

    /// Lifecycle transition not allowed.
    #[error("invalid status transition from {from} to {to}")]
    InvalidTransition { from: &'static str, to: &'static str },

    /// `running` requested before the operation's start time.
    #[error("running is only allowed when now >= start_time")]
    StartNotReached { start_time: DateTime<Utc> },

    /// `done` requested while the operation was not running.
    #[error("done is only allowed when previous status was running")]
    DoneRequiresRunning { from: &'static str },

    /// Entity is in a state that forbids the requested action.
    #[error("invalid state: {detail}")]
    InvalidState { detail: String },

    /// Deadline exceeded or the client cancelled; nothing was persisted.
    #[error("operation cancelled")]
    Cancelled,

    /// Storage backend failure.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

impl SchedulingError {
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        Self::InvalidData {
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    pub fn not_authorized(rule: &str) -> Self {
        Self::NotAuthorized {
            rule: rule.to_string(),
        }
    }

    /// Machine-readable failure kind for transport collaborators.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidData { .. } => "invalid_data",
            Self::NotAuthorized { .. } => "not_authorized",
            Self::NotFound { .. } => "not_found",
            Self::WorkingHours(_) => "working_hours_violation",
            Self::DoctorAbsent(_) => "doctor_absent",
            Self::BreakConflict(_) => "doctor_break_conflict",
            Self::Conflicts(_) => "scheduling_conflict",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::StartNotReached { .. } => "start_not_reached",
            Self::DoneRequiresRunning { .. } => "done_requires_running",
            Self::InvalidState { .. } => "invalid_state",
            Self::Cancelled => "cancelled",
            Self::Store(_) => "storage_error",
        }
    }
}

/// Map validator output to the first offending field.
pub fn validation_error(errors: validator::ValidationErrors) -> SchedulingError {
    for (field, field_errors) in errors.field_errors() {
        if let Some(error) = field_errors.first() {
            let message = error
                .message
                .as_ref()
                .map(|m| m.to_string())
                .unwrap_or_else(|| format!("invalid value for {field}"));
            return SchedulingError::invalid(field.as_ref(), message);
        }
    }
    SchedulingError::invalid("input", "validation failed")
}
