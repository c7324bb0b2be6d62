/*!
 * Patient Flow Model
 *
 * Tracks a patient's journey through a visit or operation: arrival,
 * waiting room, preparation, treatment, recovery, done. A flow is linked
 * to exactly one appointment or operation.
 *
 * The lifecycle is linear and strictly forward; `done` is terminal.
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Id;

/// Patient flow status, ordered along the journey.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum FlowStatus {
    Registered,
    Waiting,
    Preparing,
    InTreatment,
    PostTreatment,
    Done,
}

impl FlowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Registered => "registered",
            Self::Waiting => "waiting",
            Self::Preparing => "preparing",
            Self::InTreatment => "in_treatment",
            Self::PostTreatment => "post_treatment",
            Self::Done => "done",
        }
    }

    /// Forward-only movement; `done` is terminal and no status may be
    /// re-entered.
    pub fn can_transition_to(&self, new_status: FlowStatus) -> bool {
        *self != Self::Done && new_status > *self
    }
}

impl std::fmt::Display for FlowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A patient's workflow record, linked to exactly one booking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientFlow {
    pub id: Id,
    pub appointment_id: Option<Id>,
    pub operation_id: Option<Id>,
    pub status: FlowStatus,
    pub arrival_time: Option<DateTime<Utc>>,
    pub status_changed_at: DateTime<Utc>,
    pub notes: Option<String>,
}

/// Data for opening a flow record.
#[derive(Debug, Clone)]
pub struct NewPatientFlow {
    pub appointment_id: Option<Id>,
    pub operation_id: Option<Id>,
    pub status: FlowStatus,
    pub arrival_time: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}
