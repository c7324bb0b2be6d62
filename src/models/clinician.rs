/*!
 * Clinician Model
 *
 * Practice staff taking part in scheduling. Only clinicians with role
 * `Doctor` can carry appointments or operation team assignments; the
 * remaining roles exist for the authorization gate.
 */

use serde::{Deserialize, Serialize};

use super::Id;

/// Practice role. Gate checks always compare this enum, never raw strings;
/// unrecognized role names map to `Unknown` and receive no grants.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ClinicianRole {
    Admin,
    Assistant,
    Doctor,
    Billing,
    Nurse,
    Unknown,
}

impl ClinicianRole {
    /// Parse a stored role name. Unrecognized names become `Unknown`.
    pub fn from_name(name: &str) -> Self {
        match name {
            "admin" => Self::Admin,
            "assistant" => Self::Assistant,
            "doctor" => Self::Doctor,
            "billing" => Self::Billing,
            "nurse" => Self::Nurse,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Assistant => "assistant",
            Self::Doctor => "doctor",
            Self::Billing => "billing",
            Self::Nurse => "nurse",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ClinicianRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A member of the practice staff.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Clinician {
    pub id: Id,
    pub display_name: String,
    pub role: ClinicianRole,
    pub active: bool,
    /// Calendar color used by UI collaborators.
    pub color: Option<String>,
}

impl Clinician {
    pub fn is_doctor(&self) -> bool {
        self.role == ClinicianRole::Doctor
    }
}

/// Data for provisioning a clinician.
#[derive(Debug, Clone)]
pub struct NewClinician {
    pub display_name: String,
    pub role: ClinicianRole,
    pub active: bool,
    pub color: Option<String>,
}
