/*!
 * Calendar Service
 *
 * Aggregates a day/week/month window into one payload: visible
 * bookings, absences, breaks, active resources and a per-doctor
 * availability summary for the range.
 */

use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};

use crate::config::CoreConfig;
use crate::db::SchedulingStore;
use crate::models::{
    AuditAction, CalendarQuery, CalendarRange, CalendarView, Clinician, DoctorAvailability,
    DoctorRef,
};
use crate::services::audit_service::AuditService;
use crate::services::suggestion_service::SuggestionService;
use crate::utils::errors::{Result, SchedulingError};
use crate::utils::permissions;
use crate::utils::time::{day_end, day_start};

/// Probe duration for the availability summary.
const AVAILABILITY_PROBE_MINUTES: i64 = 30;

/// Calendar service
#[derive(Clone)]
pub struct CalendarService {
    store: Arc<dyn SchedulingStore>,
    config: CoreConfig,
    suggestions: SuggestionService,
    audit: AuditService,
}

impl CalendarService {
    /// Create a new calendar service
    pub fn new(store: Arc<dyn SchedulingStore>, config: CoreConfig) -> Self {
        let suggestions = SuggestionService::new(store.clone(), config.clone());
        let audit = AuditService::new(store.clone());
        Self {
            store,
            config,
            suggestions,
            audit,
        }
    }

    /// Build the calendar payload for the requested range.
    pub async fn view(
        &self,
        actor: &Clinician,
        query: CalendarQuery,
        now: DateTime<Utc>,
    ) -> Result<CalendarView> {
        permissions::ensure_calendar_read(actor)?;

        let (range_start, range_end) = range_bounds(query.date, query.range);
        let tz = self.config.time_zone;
        let window_start = day_start(tz, range_start)
            .ok_or_else(|| SchedulingError::invalid("date", "date is outside supported range"))?;
        let window_end = day_end(tz, range_end)
            .ok_or_else(|| SchedulingError::invalid("date", "date is outside supported range"))?;

        let appointments = self
            .store
            .appointments_in_range(Some(window_start), Some(window_end), query.doctor_id)
            .await?
            .into_iter()
            .filter(|a| permissions::appointment_visible(actor, a))
            .collect();

        let operations = self
            .store
            .operations_in_range(Some(window_start), Some(window_end))
            .await?
            .into_iter()
            .filter(|o| permissions::operation_visible(actor, o))
            .filter(|o| query.doctor_id.map(|d| o.involves(d)).unwrap_or(true))
            .collect();

        let absences = self.store.absences_in_range(range_start, range_end).await?;
        let breaks = self.store.breaks_in_range(range_start, range_end).await?;
        let resources = self.store.active_resources().await?;

        let doctors = match query.doctor_id {
            Some(doctor_id) => {
                let doctor = self
                    .store
                    .clinician(doctor_id)
                    .await?
                    .filter(|c| c.is_doctor())
                    .ok_or_else(|| SchedulingError::not_found(format!("doctor {doctor_id}")))?;
                vec![doctor]
            }
            None => self.store.active_doctors(None).await?,
        };

        let mut doctor_availability = Vec::with_capacity(doctors.len());
        for doctor in &doctors {
            let availability = self
                .suggestions
                .availability_for_range(
                    doctor,
                    range_start,
                    range_end,
                    AVAILABILITY_PROBE_MINUTES,
                    now,
                )
                .await?;
            doctor_availability.push(DoctorAvailability {
                doctor: DoctorRef {
                    id: doctor.id,
                    name: doctor.display_name.clone(),
                    color: doctor.color.clone(),
                },
                available: availability.available,
                reason: availability.reason,
            });
        }

        self.audit
            .emit(
                Some(actor),
                AuditAction::ResourceCalendarView,
                None,
                serde_json::json!({
                    "date": query.date,
                    "range": range_label(query.range),
                }),
            )
            .await;

        Ok(CalendarView {
            range_start,
            range_end,
            appointments,
            operations,
            absences,
            breaks,
            resources,
            doctor_availability,
        })
    }
}

fn range_label(range: CalendarRange) -> &'static str {
    match range {
        CalendarRange::Day => "day",
        CalendarRange::Week => "week",
        CalendarRange::Month => "month",
    }
}

/// Expand an anchor date to its inclusive range bounds.
fn range_bounds(date: NaiveDate, range: CalendarRange) -> (NaiveDate, NaiveDate) {
    match range {
        CalendarRange::Day => (date, date),
        CalendarRange::Week => {
            let monday =
                date - Duration::days(date.weekday().num_days_from_monday() as i64);
            (monday, monday + Duration::days(6))
        }
        CalendarRange::Month => {
            let first = date.with_day(1).unwrap_or(date);
            let next_month = if first.month() == 12 {
                NaiveDate::from_ymd_opt(first.year() + 1, 1, 1)
            } else {
                NaiveDate::from_ymd_opt(first.year(), first.month() + 1, 1)
            };
            let last = next_month
                .map(|d| d - Duration::days(1))
                .unwrap_or(first);
            (first, last)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_week_bounds_monday_to_sunday() {
        let (start, end) = range_bounds(date(2026, 3, 4), CalendarRange::Week); // Wednesday
        assert_eq!(start, date(2026, 3, 2));
        assert_eq!(end, date(2026, 3, 8));
    }

    #[test]
    fn test_month_bounds() {
        let (start, end) = range_bounds(date(2026, 2, 15), CalendarRange::Month);
        assert_eq!(start, date(2026, 2, 1));
        assert_eq!(end, date(2026, 2, 28));

        let (start, end) = range_bounds(date(2026, 12, 31), CalendarRange::Month);
        assert_eq!(start, date(2026, 12, 1));
        assert_eq!(end, date(2026, 12, 31));
    }

    #[test]
    fn test_day_bounds() {
        let (start, end) = range_bounds(date(2026, 3, 4), CalendarRange::Day);
        assert_eq!(start, end);
    }
}
