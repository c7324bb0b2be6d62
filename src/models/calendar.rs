/*!
 * Calendar View DTOs
 *
 * Aggregated day/week/month payloads for calendar collaborators:
 * visible bookings, absences, breaks, resources and a per-doctor
 * availability summary for the range.
 */

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::absence::{DoctorAbsence, DoctorBreak};
use super::appointment::{Appointment, DoctorRef};
use super::operation::Operation;
use super::resource::Resource;
use super::Id;

/// Requested calendar window.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CalendarRange {
    Day,
    Week,
    Month,
}

/// Parameters of the calendar view operation.
#[derive(Debug, Clone)]
pub struct CalendarQuery {
    /// Anchor date; the range expands to the containing day/week/month.
    pub date: NaiveDate,
    pub range: CalendarRange,
    /// Restrict bookings and the availability summary to one doctor.
    pub doctor_id: Option<Id>,
}

/// Why a doctor has no free slot in the probed range.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AvailabilityBlock {
    NoHours,
    Absence,
    Break,
    Busy,
}

/// Availability probe result for a date range.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Availability {
    pub available: bool,
    pub reason: Option<AvailabilityBlock>,
}

/// Availability summary entry for one doctor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorAvailability {
    pub doctor: DoctorRef,
    pub available: bool,
    pub reason: Option<AvailabilityBlock>,
}

/// Aggregated calendar payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarView {
    pub range_start: NaiveDate,
    /// Inclusive end of the range.
    pub range_end: NaiveDate,
    pub appointments: Vec<Appointment>,
    pub operations: Vec<Operation>,
    pub absences: Vec<DoctorAbsence>,
    pub breaks: Vec<DoctorBreak>,
    pub resources: Vec<Resource>,
    pub doctor_availability: Vec<DoctorAvailability>,
}
