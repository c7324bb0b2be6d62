/*!
 * Operation Model
 *
 * A scheduled operation occupies an OP room, optional devices and a team
 * of clinicians (primary surgeon, optional assistant and anesthesist).
 * The end time is always derived from the operation type's prep/op/post
 * durations and never user-provided.
 *
 * Status workflow:
 * - planned -> confirmed -> running -> done
 * - cancelled is reachable from any state
 * - confirmed -> running additionally requires now >= start_time
 */

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::utils::time::clamp01;

use super::Id;

/// Operation status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    Planned,
    Confirmed,
    Running,
    Done,
    Cancelled,
}

impl OperationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Planned => "planned",
            Self::Confirmed => "confirmed",
            Self::Running => "running",
            Self::Done => "done",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether the bare transition is allowed. The time gate for
    /// `confirmed -> running` is checked separately by the lifecycle
    /// service because it needs the current instant.
    pub fn can_transition_to(&self, new_status: OperationStatus) -> bool {
        if new_status == Self::Cancelled {
            return true;
        }
        matches!(
            (self, new_status),
            (Self::Planned, Self::Confirmed)
                | (Self::Confirmed, Self::Running)
                | (Self::Running, Self::Done)
        )
    }
}

impl std::fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Configurable operation category with split durations: preparation,
/// operation and post-processing, all in minutes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationType {
    pub id: Id,
    pub name: String,
    pub prep_minutes: i64,
    pub op_minutes: i64,
    pub post_minutes: i64,
    pub color: Option<String>,
    pub active: bool,
}

impl OperationType {
    /// Total booked duration. Negative parts count as zero; a bookable
    /// type must total more than zero minutes.
    pub fn total_minutes(&self) -> i64 {
        self.prep_minutes.max(0) + self.op_minutes.max(0) + self.post_minutes.max(0)
    }
}

/// Data for configuring an operation type.
#[derive(Debug, Clone)]
pub struct NewOperationType {
    pub name: String,
    pub prep_minutes: i64,
    pub op_minutes: i64,
    pub post_minutes: i64,
    pub color: Option<String>,
    pub active: bool,
}

/// A scheduled operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operation {
    pub id: Id,
    pub patient_id: i64,
    pub primary_surgeon_id: Id,
    pub assistant_id: Option<Id>,
    pub anesthesist_id: Option<Id>,
    pub op_room_id: Id,
    pub op_type_id: Id,
    pub start_time: DateTime<Utc>,
    /// Derived: `start_time + prep + op + post`.
    pub end_time: DateTime<Utc>,
    pub status: OperationStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Operation {
    /// All assigned team member ids: surgeon first, then assistant and
    /// anesthesist when present.
    pub fn team_ids(&self) -> Vec<Id> {
        let mut ids = vec![self.primary_surgeon_id];
        if let Some(id) = self.assistant_id {
            ids.push(id);
        }
        if let Some(id) = self.anesthesist_id {
            ids.push(id);
        }
        ids
    }

    pub fn involves(&self, doctor_id: Id) -> bool {
        self.primary_surgeon_id == doctor_id
            || self.assistant_id == Some(doctor_id)
            || self.anesthesist_id == Some(doctor_id)
    }

    /// Completion ratio for a running operation, clamped to `[0, 1]`.
    /// Defined as 0 for every other status.
    pub fn progress(&self, now: DateTime<Utc>) -> f64 {
        if self.status != OperationStatus::Running {
            return 0.0;
        }
        let total = (self.end_time - self.start_time).num_seconds();
        if total <= 0 {
            return 0.0;
        }
        clamp01((now - self.start_time).num_seconds() as f64 / total as f64)
    }
}

/// Request to plan a new operation. The end time is derived, never taken
/// from the caller.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateOperationRequest {
    #[validate(range(min = 1, message = "patient_id must be a positive integer"))]
    pub patient_id: i64,

    #[validate(range(min = 1, message = "primary_surgeon_id must be a positive integer"))]
    pub primary_surgeon_id: Id,

    pub assistant_id: Option<Id>,
    pub anesthesist_id: Option<Id>,

    #[validate(range(min = 1, message = "op_room_id must be a positive integer"))]
    pub op_room_id: Id,

    #[validate(range(min = 1, message = "op_type_id must be a positive integer"))]
    pub op_type_id: Id,

    pub start_time: DateTime<Utc>,
    pub op_device_ids: Option<Vec<Id>>,
    pub status: Option<OperationStatus>,

    #[validate(length(max = 5000, message = "notes must not exceed 5000 characters"))]
    pub notes: Option<String>,
}

/// Patch for an existing operation. Team members can be reassigned but
/// not removed through a patch; `op_device_ids` replaces the link set.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateOperationRequest {
    pub start_time: Option<DateTime<Utc>>,
    pub op_type_id: Option<Id>,
    pub op_room_id: Option<Id>,
    pub assistant_id: Option<Id>,
    pub anesthesist_id: Option<Id>,
    pub op_device_ids: Option<Vec<Id>>,

    #[validate(length(max = 5000, message = "notes must not exceed 5000 characters"))]
    pub notes: Option<String>,
}

impl UpdateOperationRequest {
    pub fn is_empty(&self) -> bool {
        self.start_time.is_none()
            && self.op_type_id.is_none()
            && self.op_room_id.is_none()
            && self.assistant_id.is_none()
            && self.anesthesist_id.is_none()
            && self.op_device_ids.is_none()
            && self.notes.is_none()
    }
}

/// Store-level data for creating an operation with its device links.
#[derive(Debug, Clone)]
pub struct NewOperation {
    pub patient_id: i64,
    pub primary_surgeon_id: Id,
    pub assistant_id: Option<Id>,
    pub anesthesist_id: Option<Id>,
    pub op_room_id: Id,
    pub op_type_id: Id,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: OperationStatus,
    pub notes: Option<String>,
    /// Deduplicated device ids; duplicate pairs are ignored on insert.
    pub device_ids: Vec<Id>,
}

/// Store-level patch for an operation.
#[derive(Debug, Clone, Default)]
pub struct OperationPatch {
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub op_type_id: Option<Id>,
    pub op_room_id: Option<Id>,
    pub assistant_id: Option<Id>,
    pub anesthesist_id: Option<Id>,
    pub notes: Option<String>,
    pub device_ids: Option<Vec<Id>>,
}

/// A proposed operation slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationSuggestion {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub op_room_id: Id,
    pub device_ids: Vec<Id>,
}

/// Parameters of the operation slot-suggestion operation.
#[derive(Debug, Clone)]
pub struct OperationSuggestQuery {
    pub primary_surgeon_id: Id,
    pub assistant_id: Option<Id>,
    pub anesthesist_id: Option<Id>,
    pub op_type_id: Id,
    pub op_room_id: Id,
    pub op_device_ids: Option<Vec<Id>>,
    pub start_date: NaiveDate,
    pub limit: usize,
    pub now: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn operation(status: OperationStatus) -> Operation {
        let start = Utc::now();
        Operation {
            id: 1,
            patient_id: 1,
            primary_surgeon_id: 1,
            assistant_id: Some(2),
            anesthesist_id: None,
            op_room_id: 1,
            op_type_id: 1,
            start_time: start,
            end_time: start + Duration::minutes(60),
            status,
            notes: None,
            created_at: start,
            updated_at: start,
        }
    }

    #[test]
    fn test_status_transitions() {
        use OperationStatus::*;
        assert!(Planned.can_transition_to(Confirmed));
        assert!(Confirmed.can_transition_to(Running));
        assert!(Running.can_transition_to(Done));
        // cancelled is reachable from any state
        for from in [Planned, Confirmed, Running, Done, Cancelled] {
            assert!(from.can_transition_to(Cancelled));
        }
        // no skipping, no going back
        assert!(!Planned.can_transition_to(Running));
        assert!(!Planned.can_transition_to(Done));
        assert!(!Confirmed.can_transition_to(Done));
        assert!(!Confirmed.can_transition_to(Planned));
        assert!(!Done.can_transition_to(Running));
        assert!(!Cancelled.can_transition_to(Planned));
    }

    #[test]
    fn test_total_minutes_clamps_negative_parts() {
        let op_type = OperationType {
            id: 1,
            name: "arthroscopy".into(),
            prep_minutes: 15,
            op_minutes: -30,
            post_minutes: 15,
            color: None,
            active: true,
        };
        assert_eq!(op_type.total_minutes(), 30);
    }

    #[test]
    fn test_team_ids_order() {
        let op = operation(OperationStatus::Planned);
        assert_eq!(op.team_ids(), vec![1, 2]);
        assert!(op.involves(1));
        assert!(op.involves(2));
        assert!(!op.involves(3));
    }

    #[test]
    fn test_progress_zero_unless_running() {
        let now = Utc::now();
        for status in [
            OperationStatus::Planned,
            OperationStatus::Confirmed,
            OperationStatus::Done,
            OperationStatus::Cancelled,
        ] {
            assert_eq!(operation(status).progress(now), 0.0);
        }
    }

    #[test]
    fn test_progress_clamped() {
        let mut op = operation(OperationStatus::Running);
        op.start_time = Utc::now() - Duration::minutes(30);
        op.end_time = op.start_time + Duration::minutes(60);
        let progress = op.progress(Utc::now());
        assert!(progress > 0.45 && progress < 0.55, "progress={progress}");

        // well past the end
        assert_eq!(op.progress(op.end_time + Duration::hours(1)), 1.0);
        // before the start
        assert_eq!(op.progress(op.start_time - Duration::hours(1)), 0.0);
    }
}
