/*!
 * Working Hours Models
 *
 * Practice-wide opening hours and doctor-specific consultation hours.
 * Both use weekday 0 = Monday .. 6 = Sunday and half-open time windows
 * with `start_time < end_time`.
 *
 * Scheduling requires a booking to lie within practice hours *and* within
 * the doctor's hours; the availability oracle enforces containment, not
 * mere intersection.
 */

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use super::Id;

/// A practice-wide opening window on a weekday.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PracticeHours {
    pub id: Id,
    /// 0 = Monday .. 6 = Sunday
    pub weekday: u8,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub active: bool,
}

/// A doctor's consultation window on a weekday.
///
/// Unique per `(doctor, weekday, start_time, end_time, active)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorHours {
    pub id: Id,
    pub doctor_id: Id,
    /// 0 = Monday .. 6 = Sunday
    pub weekday: u8,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub active: bool,
}

/// Data for configuring a practice window.
#[derive(Debug, Clone)]
pub struct NewPracticeHours {
    pub weekday: u8,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub active: bool,
}

/// Data for configuring a doctor window.
#[derive(Debug, Clone)]
pub struct NewDoctorHours {
    pub doctor_id: Id,
    pub weekday: u8,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub active: bool,
}
