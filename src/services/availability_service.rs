/*!
 * Availability Oracle
 *
 * Interprets practice hours, doctor hours, absences and breaks over a
 * time window. The oracle never fails on "unavailable": each check
 * returns the first offending reference in deterministic order (earliest
 * date, then earliest start time, then lowest id), or `None` when the
 * window is clear.
 *
 * Hours semantics: every local day segment of the window must be fully
 * contained in at least one practice window *and* one doctor window of
 * that weekday. Containment, not intersection. Weekdays derive from the
 * practice's local calendar, never from UTC.
 */

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::config::CoreConfig;
use crate::db::SchedulingStore;
use crate::models::{DoctorAbsence, DoctorBreak, Id};
use crate::utils::errors::{HoursViolationReason, Result, WorkingHoursViolation};
use crate::utils::time::{day_segments, local_date, localize, overlaps, weekday_index};

/// Availability service
#[derive(Clone)]
pub struct AvailabilityService {
    store: Arc<dyn SchedulingStore>,
    config: CoreConfig,
}

impl AvailabilityService {
    /// Create a new availability service
    pub fn new(store: Arc<dyn SchedulingStore>, config: CoreConfig) -> Self {
        Self { store, config }
    }

    /// Check that the window lies within practice hours and the doctor's
    /// hours on every local day it touches. Returns the first violation.
    pub async fn hours_violation(
        &self,
        doctor_id: Id,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Option<WorkingHoursViolation>> {
        let tz = self.config.time_zone;

        for segment in day_segments(start, end, tz) {
            let weekday = weekday_index(segment.date);

            let violation = |reason: HoursViolationReason| WorkingHoursViolation {
                doctor_id,
                date: segment.date,
                start_time: segment.start_time,
                end_time: segment.end_time,
                reason,
                alternatives: Vec::new(),
            };

            let practice_windows = self.store.practice_hours_on(weekday).await?;
            if practice_windows.is_empty() {
                return Ok(Some(violation(HoursViolationReason::NoPracticeHours)));
            }
            let practice_covers = practice_windows
                .iter()
                .any(|w| w.start_time <= segment.start_time && w.end_time >= segment.end_time);
            if !practice_covers {
                return Ok(Some(violation(HoursViolationReason::OutsidePracticeHours)));
            }

            let doctor_windows = self.store.doctor_hours_on(doctor_id, weekday).await?;
            if doctor_windows.is_empty() {
                return Ok(Some(violation(HoursViolationReason::NoDoctorHours)));
            }
            let doctor_covers = doctor_windows
                .iter()
                .any(|w| w.start_time <= segment.start_time && w.end_time >= segment.end_time);
            if !doctor_covers {
                return Ok(Some(violation(HoursViolationReason::OutsideDoctorHours)));
            }
        }

        Ok(None)
    }

    /// First active absence of the doctor whose date range overlaps the
    /// window's local dates.
    pub async fn first_absence(
        &self,
        doctor_id: Id,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Option<DoctorAbsence>> {
        let tz = self.config.time_zone;
        let start_date = local_date(start, tz);
        let end_date = local_date(end, tz);
        Ok(self
            .store
            .first_absence_overlapping(doctor_id, start_date, end_date)
            .await?)
    }

    /// First active break (practice-wide or the doctor's own) whose
    /// concrete interval overlaps the window.
    pub async fn first_break_conflict(
        &self,
        doctor_id: Id,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Option<DoctorBreak>> {
        let tz = self.config.time_zone;
        let start_date = local_date(start, tz);
        let end_date = local_date(end, tz);

        let breaks = self
            .store
            .breaks_for_doctor(doctor_id, start_date, end_date)
            .await?;

        for break_row in breaks {
            let break_start = localize(tz, break_row.date, break_row.start_time);
            let break_end = localize(tz, break_row.date, break_row.end_time);
            if let (Some(break_start), Some(break_end)) = (break_start, break_end) {
                if overlaps(start, end, break_start, break_end) {
                    return Ok(Some(break_row));
                }
            }
        }

        Ok(None)
    }
}
