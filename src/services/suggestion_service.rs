/*!
 * Slot-Suggestion Engine
 *
 * Scans day windows for free slots, reconciling practice hours, doctor
 * hours, absences, breaks, existing bookings and requested resources.
 * When the requested doctor has no free slot, other active doctors are
 * offered as substitutes.
 *
 * The engine is read-only and re-entrant. Candidates advance on the
 * configured step grid (default 5 minutes); identical inputs with an
 * explicit `now` produce identical output.
 */

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;

use crate::config::CoreConfig;
use crate::db::SchedulingStore;
use crate::models::{
    Appointment, AppointmentType, AuditAction, Availability, AvailabilityBlock, Clinician,
    DoctorRef, DoctorSuggestions, Id, OperationSuggestQuery, OperationSuggestion, OperationType,
    Resource, SlotSuggestion, SuggestQuery, SuggestionResponse, TypeBadge,
};
use crate::services::audit_service::AuditService;
use crate::services::conflict_service::ConflictDetector;
use crate::utils::errors::{Result, SchedulingError};
use crate::utils::permissions;
use crate::utils::time::{ceil_to_step, day_end, day_start, localize, overlaps, weekday_index};

/// Diagnostics of a single day scan, used by the availability summary.
#[derive(Debug, Default, Clone, Copy)]
struct DayDiagnostics {
    has_hours: bool,
    absent: bool,
    blocked_by_break: bool,
    blocked_by_busy: bool,
    blocked_by_resource: bool,
}

/// Suggestion service
#[derive(Clone)]
pub struct SuggestionService {
    store: Arc<dyn SchedulingStore>,
    config: CoreConfig,
    audit: AuditService,
}

impl SuggestionService {
    /// Create a new suggestion service
    pub fn new(store: Arc<dyn SchedulingStore>, config: CoreConfig) -> Self {
        let audit = AuditService::new(store.clone());
        Self {
            store,
            config,
            audit,
        }
    }

    /// Suggest free appointment slots for a doctor on the requested day,
    /// falling back to substitute doctors when the primary has none.
    pub async fn suggest_appointment_slots(
        &self,
        actor: &Clinician,
        query: SuggestQuery,
    ) -> Result<SuggestionResponse> {
        permissions::ensure_suggest(actor, query.doctor_id)?;

        if query.limit == 0 {
            return Err(SchedulingError::invalid("limit", "limit must be >= 1"));
        }

        let doctor = self.resolve_doctor(query.doctor_id).await?;

        let type_obj = match query.type_id {
            Some(type_id) => {
                let appointment_type = self
                    .store
                    .appointment_type(type_id)
                    .await?
                    .filter(|t| t.active)
                    .ok_or_else(|| {
                        SchedulingError::not_found(format!("appointment type {type_id}"))
                    })?;
                Some(appointment_type)
            }
            None => None,
        };

        let duration_minutes = match query.duration_minutes {
            Some(minutes) => minutes,
            None => type_obj
                .as_ref()
                .and_then(|t| t.duration_minutes)
                .ok_or_else(|| {
                    SchedulingError::invalid(
                        "duration_minutes",
                        "duration_minutes is required when the type has no default duration",
                    )
                })?,
        };
        if duration_minutes <= 0 {
            return Err(SchedulingError::invalid(
                "duration_minutes",
                "duration_minutes must be >= 1",
            ));
        }

        let resources = match &query.resource_ids {
            Some(ids) => self.resolve_active_resources(ids).await?,
            None => Vec::new(),
        };

        let now = query.now.unwrap_or_else(Utc::now);

        let primary_suggestions = self
            .compute_for_doctor(
                &doctor,
                query.start_date,
                duration_minutes,
                query.limit,
                type_obj.as_ref(),
                &resources,
                Some(query.start_date),
                now,
                1,
            )
            .await?;

        let mut fallback_suggestions = Vec::new();
        if primary_suggestions.is_empty() {
            let substitutes = self.store.active_doctors(Some(doctor.id)).await?;
            for substitute in substitutes {
                let suggestions = self
                    .compute_for_doctor(
                        &substitute,
                        query.start_date,
                        duration_minutes,
                        query.limit,
                        type_obj.as_ref(),
                        &resources,
                        Some(query.start_date),
                        now,
                        1,
                    )
                    .await?;
                if !suggestions.is_empty() {
                    fallback_suggestions.push(DoctorSuggestions {
                        doctor: doctor_ref(&substitute),
                        suggestions,
                    });
                }
            }
            fallback_suggestions.sort_by_key(|group| {
                (
                    group.suggestions.first().map(|s| s.start_time),
                    group.doctor.id,
                )
            });
        }

        self.audit
            .emit(
                Some(actor),
                AuditAction::AppointmentSuggest,
                None,
                serde_json::json!({ "doctor_id": doctor.id, "date": query.start_date }),
            )
            .await;
        if !fallback_suggestions.is_empty() {
            self.audit
                .emit(
                    Some(actor),
                    AuditAction::DoctorSubstitutionSuggest,
                    None,
                    serde_json::json!({ "doctor_id": doctor.id, "date": query.start_date }),
                )
                .await;
        }

        Ok(SuggestionResponse {
            primary_doctor: doctor_ref(&doctor),
            primary_suggestions,
            fallback_suggestions,
        })
    }

    /// Walk days forward from `start_date` collecting up to `limit`
    /// suggestions. Scanning stops at `end_date`, at `max_days` and at
    /// the configured scan ceiling, whichever comes first.
    #[allow(clippy::too_many_arguments)]
    pub async fn compute_for_doctor(
        &self,
        doctor: &Clinician,
        start_date: NaiveDate,
        duration_minutes: i64,
        limit: usize,
        type_obj: Option<&AppointmentType>,
        resources: &[Resource],
        end_date: Option<NaiveDate>,
        now: DateTime<Utc>,
        max_days: u32,
    ) -> Result<Vec<SlotSuggestion>> {
        if duration_minutes <= 0 || limit == 0 {
            return Ok(Vec::new());
        }

        let max_days = max_days.min(self.config.max_scan_days);
        let now_local = now.with_timezone(&self.config.time_zone);

        let mut suggestions: Vec<SlotSuggestion> = Vec::new();
        let mut days_checked: u32 = 0;
        let mut current_date = start_date;

        while suggestions.len() < limit && days_checked < max_days {
            if let Some(end_date) = end_date {
                if current_date > end_date {
                    break;
                }
            }

            let (day_suggestions, _diag) = self
                .scan_day(
                    doctor,
                    current_date,
                    duration_minutes,
                    now_local,
                    start_date,
                    type_obj,
                    resources,
                    limit - suggestions.len(),
                )
                .await?;
            suggestions.extend(day_suggestions);

            current_date = match current_date.succ_opt() {
                Some(next) => next,
                None => break,
            };
            days_checked += 1;
        }

        Ok(suggestions)
    }

    /// Probe whether a doctor has at least one free slot of the given
    /// duration in the inclusive date range, and if not, why.
    pub async fn availability_for_range(
        &self,
        doctor: &Clinician,
        start_date: NaiveDate,
        end_date: NaiveDate,
        duration_minutes: i64,
        now: DateTime<Utc>,
    ) -> Result<Availability> {
        if end_date < start_date {
            return Ok(Availability {
                available: false,
                reason: Some(AvailabilityBlock::NoHours),
            });
        }

        let now_local = now.with_timezone(&self.config.time_zone);

        let mut seen_hours_any = false;
        let mut seen_absence_on_hours_day = false;
        let mut seen_break_block = false;
        let mut seen_busy_block = false;

        let mut days_checked: u32 = 0;
        let mut current_date = start_date;
        while current_date <= end_date && days_checked < self.config.max_scan_days {
            let (suggestions, diag) = self
                .scan_day(
                    doctor,
                    current_date,
                    duration_minutes,
                    now_local,
                    start_date,
                    None,
                    &[],
                    1,
                )
                .await?;

            if diag.has_hours {
                seen_hours_any = true;
                if diag.absent {
                    seen_absence_on_hours_day = true;
                } else {
                    seen_break_block = seen_break_block || diag.blocked_by_break;
                    seen_busy_block = seen_busy_block || diag.blocked_by_busy;
                }
            }

            if !suggestions.is_empty() {
                return Ok(Availability {
                    available: true,
                    reason: None,
                });
            }

            current_date = match current_date.succ_opt() {
                Some(next) => next,
                None => break,
            };
            days_checked += 1;
        }

        let reason = if !seen_hours_any {
            AvailabilityBlock::NoHours
        } else if seen_absence_on_hours_day && !(seen_break_block || seen_busy_block) {
            AvailabilityBlock::Absence
        } else if seen_break_block && !seen_busy_block {
            AvailabilityBlock::Break
        } else {
            AvailabilityBlock::Busy
        };

        Ok(Availability {
            available: false,
            reason: Some(reason),
        })
    }

    /// Suggest free operation slots for the primary surgeon, scanning
    /// forward from `start_date` until enough slots are found. The
    /// free-slot predicate delegates to the conflict detector; team
    /// absences exclude whole days and team breaks block candidates.
    pub async fn suggest_operation_slots(
        &self,
        actor: &Clinician,
        query: OperationSuggestQuery,
    ) -> Result<Vec<OperationSuggestion>> {
        permissions::ensure_operation_suggest(actor, query.primary_surgeon_id)?;

        if query.limit == 0 {
            return Err(SchedulingError::invalid("limit", "limit must be >= 1"));
        }

        let surgeon = self.resolve_doctor(query.primary_surgeon_id).await?;
        let mut team = vec![surgeon.id];
        for (field, member_id) in [
            ("assistant_id", query.assistant_id),
            ("anesthesist_id", query.anesthesist_id),
        ] {
            if let Some(member_id) = member_id {
                let member = self
                    .store
                    .clinician(member_id)
                    .await?
                    .filter(|c| c.active && c.is_doctor())
                    .ok_or_else(|| {
                        SchedulingError::invalid(
                            field,
                            format!("no active doctor with id {member_id}"),
                        )
                    })?;
                team.push(member.id);
            }
        }

        let op_type = self
            .store
            .operation_type(query.op_type_id)
            .await?
            .filter(|t| t.active)
            .ok_or_else(|| {
                SchedulingError::not_found(format!("operation type {}", query.op_type_id))
            })?;
        let duration_minutes = op_type.total_minutes();
        if duration_minutes <= 0 {
            return Err(SchedulingError::invalid(
                "op_type_id",
                "operation type has no bookable duration",
            ));
        }

        let room = self
            .store
            .resource(query.op_room_id)
            .await?
            .filter(|r| r.active)
            .ok_or_else(|| SchedulingError::not_found(format!("room {}", query.op_room_id)))?;
        if !room.is_room() {
            return Err(SchedulingError::invalid(
                "op_room_id",
                "resource is not a room",
            ));
        }

        let device_ids = dedup_ids(query.op_device_ids.as_deref().unwrap_or(&[]));
        let devices = self.resolve_active_resources(&device_ids).await?;
        for device in &devices {
            if !device.is_device() {
                return Err(SchedulingError::invalid(
                    "op_device_ids",
                    format!("resource {} is not a device", device.id),
                ));
            }
        }

        let now = query.now.unwrap_or_else(Utc::now);
        let suggestions = self
            .scan_operation_days(&surgeon, &team, &room, &device_ids, &op_type, query, now)
            .await?;

        self.audit
            .emit(
                Some(actor),
                AuditAction::OperationSuggest,
                None,
                serde_json::json!({ "primary_surgeon_id": surgeon.id }),
            )
            .await;

        Ok(suggestions)
    }

    // ==================== Internals ====================

    async fn resolve_doctor(&self, doctor_id: Id) -> Result<Clinician> {
        let doctor = self
            .store
            .clinician(doctor_id)
            .await?
            .filter(|c| c.active)
            .ok_or_else(|| SchedulingError::not_found(format!("doctor {doctor_id}")))?;
        if !doctor.is_doctor() {
            return Err(SchedulingError::invalid(
                "doctor_id",
                "clinician does not have role doctor",
            ));
        }
        Ok(doctor)
    }

    async fn resolve_active_resources(&self, ids: &[Id]) -> Result<Vec<Resource>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let unique = dedup_ids(ids);
        let found = self.store.resources_by_ids(&unique).await?;
        for id in &unique {
            let resource = found.iter().find(|r| r.id == *id);
            match resource {
                Some(r) if r.active => {}
                _ => return Err(SchedulingError::not_found(format!("resource {id}"))),
            }
        }
        // preserve the caller's order
        Ok(unique
            .iter()
            .filter_map(|id| found.iter().find(|r| r.id == *id).cloned())
            .collect())
    }

    /// Scan one day of one doctor for free slots.
    #[allow(clippy::too_many_arguments)]
    async fn scan_day(
        &self,
        doctor: &Clinician,
        date: NaiveDate,
        duration_minutes: i64,
        now_local: DateTime<Tz>,
        start_date: NaiveDate,
        type_obj: Option<&AppointmentType>,
        resources: &[Resource],
        limit: usize,
    ) -> Result<(Vec<SlotSuggestion>, DayDiagnostics)> {
        let tz = self.config.time_zone;
        let mut diag = DayDiagnostics::default();

        let weekday = weekday_index(date);
        let practice_windows = self.store.practice_hours_on(weekday).await?;
        let doctor_windows = self.store.doctor_hours_on(doctor.id, weekday).await?;

        diag.has_hours = !practice_windows.is_empty() && !doctor_windows.is_empty();
        if !diag.has_hours {
            return Ok((Vec::new(), diag));
        }

        let absent = self
            .store
            .first_absence_overlapping(doctor.id, date, date)
            .await?
            .is_some();
        diag.absent = absent;
        if absent {
            return Ok((Vec::new(), diag));
        }

        let (Some(window_query_start), Some(window_query_end)) =
            (day_start(tz, date), day_end(tz, date))
        else {
            return Ok((Vec::new(), diag));
        };

        let existing: Vec<Appointment> = self
            .store
            .appointments_for_doctor_overlapping(
                doctor.id,
                window_query_start,
                window_query_end,
                None,
            )
            .await?;

        let break_rows = self.store.breaks_for_doctor(doctor.id, date, date).await?;
        let break_intervals: Vec<(DateTime<Utc>, DateTime<Utc>)> = break_rows
            .iter()
            .filter_map(|b| {
                Some((
                    localize(tz, b.date, b.start_time)?,
                    localize(tz, b.date, b.end_time)?,
                ))
            })
            .collect();

        // Intervals where any requested resource is taken, by appointments
        // or by operations (as op_room or via device links).
        let mut resource_intervals: Vec<(DateTime<Utc>, DateTime<Utc>)> = Vec::new();
        let resource_ids: Vec<Id> = resources.iter().map(|r| r.id).collect();
        let resource_colors: Vec<String> = resources.iter().map(|r| r.color.clone()).collect();
        if !resources.is_empty() {
            let bookings = self
                .store
                .resource_bookings_overlapping(
                    &resource_ids,
                    window_query_start,
                    window_query_end,
                    None,
                )
                .await?;
            for booking in bookings {
                resource_intervals
                    .push((booking.appointment.start_time, booking.appointment.end_time));
            }

            let room_ids: Vec<Id> =
                resources.iter().filter(|r| r.is_room()).map(|r| r.id).collect();
            if !room_ids.is_empty() {
                let operations = self
                    .store
                    .operations_using_rooms_overlapping(
                        &room_ids,
                        window_query_start,
                        window_query_end,
                        None,
                    )
                    .await?;
                for operation in operations {
                    resource_intervals.push((operation.start_time, operation.end_time));
                }
            }

            let device_ids: Vec<Id> =
                resources.iter().filter(|r| r.is_device()).map(|r| r.id).collect();
            if !device_ids.is_empty() {
                let bookings = self
                    .store
                    .device_bookings_overlapping(
                        &device_ids,
                        window_query_start,
                        window_query_end,
                        None,
                    )
                    .await?;
                for booking in bookings {
                    resource_intervals
                        .push((booking.operation.start_time, booking.operation.end_time));
                }
            }
        }

        let step = Duration::minutes(self.config.slot_step_minutes.max(1) as i64);
        let duration = Duration::minutes(duration_minutes);
        let mut suggestions: Vec<SlotSuggestion> = Vec::new();

        'windows: for practice_window in &practice_windows {
            for doctor_window in &doctor_windows {
                let window_start_t = practice_window.start_time.max(doctor_window.start_time);
                let window_end_t = practice_window.end_time.min(doctor_window.end_time);
                if window_start_t >= window_end_t {
                    continue;
                }

                let Some(window_start) = localize(tz, date, window_start_t) else {
                    continue;
                };
                let Some(window_end) = localize(tz, date, window_end_t) else {
                    continue;
                };

                let mut candidate_base = window_start.with_timezone(&tz);
                // When the scan starts today, never propose slots in the past.
                if start_date == now_local.date_naive() && date == start_date {
                    candidate_base = candidate_base.max(now_local);
                }

                let mut candidate = ceil_to_step(candidate_base, self.config.slot_step_minutes);
                let latest_start = window_end - duration;

                while candidate.with_timezone(&Utc) <= latest_start
                    && suggestions.len() < limit
                {
                    let candidate_start = candidate.with_timezone(&Utc);
                    let candidate_end = candidate_start + duration;

                    if !self.blocks_candidate(
                        candidate_start,
                        candidate_end,
                        &existing,
                        &break_intervals,
                        &resource_intervals,
                        &mut diag,
                    ) {
                        suggestions.push(SlotSuggestion {
                            start_time: candidate_start,
                            end_time: candidate_end,
                            appointment_type: type_obj.map(|t| TypeBadge {
                                id: t.id,
                                name: t.name.clone(),
                                color: t.color.clone(),
                            }),
                            doctor_color: doctor.color.clone(),
                            type_color: type_obj.and_then(|t| t.color.clone()),
                            resource_ids: resource_ids.clone(),
                            resource_colors: resource_colors.clone(),
                        });
                        // only the first free slot per window
                        break;
                    }
                    candidate += step;
                }

                if suggestions.len() >= limit {
                    break 'windows;
                }
            }
        }

        Ok((suggestions, diag))
    }

    fn blocks_candidate(
        &self,
        candidate_start: DateTime<Utc>,
        candidate_end: DateTime<Utc>,
        existing: &[Appointment],
        break_intervals: &[(DateTime<Utc>, DateTime<Utc>)],
        resource_intervals: &[(DateTime<Utc>, DateTime<Utc>)],
        diag: &mut DayDiagnostics,
    ) -> bool {
        for appointment in existing {
            if overlaps(
                appointment.start_time,
                appointment.end_time,
                candidate_start,
                candidate_end,
            ) {
                diag.blocked_by_busy = true;
                return true;
            }
        }
        for (break_start, break_end) in break_intervals {
            if overlaps(*break_start, *break_end, candidate_start, candidate_end) {
                diag.blocked_by_break = true;
                return true;
            }
        }
        for (resource_start, resource_end) in resource_intervals {
            if overlaps(*resource_start, *resource_end, candidate_start, candidate_end) {
                diag.blocked_by_resource = true;
                return true;
            }
        }
        false
    }

    /// Day scan for operations: practice windows intersected with the
    /// primary surgeon's windows, free iff the conflict detector finds
    /// nothing and no team member has a break there.
    #[allow(clippy::too_many_arguments)]
    async fn scan_operation_days(
        &self,
        surgeon: &Clinician,
        team: &[Id],
        room: &Resource,
        device_ids: &[Id],
        op_type: &OperationType,
        query: OperationSuggestQuery,
        now: DateTime<Utc>,
    ) -> Result<Vec<OperationSuggestion>> {
        let tz = self.config.time_zone;
        let detector = ConflictDetector::new(self.store.clone());
        let step = Duration::minutes(self.config.slot_step_minutes.max(1) as i64);
        let duration = Duration::minutes(op_type.total_minutes());
        let now_local = now.with_timezone(&tz);

        let mut suggestions: Vec<OperationSuggestion> = Vec::new();
        let mut days_checked: u32 = 0;
        let mut date = query.start_date;

        'days: while suggestions.len() < query.limit && days_checked < self.config.max_scan_days {
            let weekday = weekday_index(date);
            let practice_windows = self.store.practice_hours_on(weekday).await?;
            let surgeon_windows = self.store.doctor_hours_on(surgeon.id, weekday).await?;

            if practice_windows.is_empty() || surgeon_windows.is_empty() {
                date = match date.succ_opt() {
                    Some(next) => next,
                    None => break,
                };
                days_checked += 1;
                continue;
            }

            let mut team_absent = false;
            for &member in team {
                if self
                    .store
                    .first_absence_overlapping(member, date, date)
                    .await?
                    .is_some()
                {
                    team_absent = true;
                    break;
                }
            }
            if team_absent {
                date = match date.succ_opt() {
                    Some(next) => next,
                    None => break,
                };
                days_checked += 1;
                continue;
            }

            // Break intervals of every team member on this day.
            let mut break_intervals: Vec<(DateTime<Utc>, DateTime<Utc>)> = Vec::new();
            for &member in team {
                let rows = self.store.breaks_for_doctor(member, date, date).await?;
                for row in rows {
                    if let (Some(break_start), Some(break_end)) = (
                        localize(tz, row.date, row.start_time),
                        localize(tz, row.date, row.end_time),
                    ) {
                        break_intervals.push((break_start, break_end));
                    }
                }
            }

            for practice_window in &practice_windows {
                for surgeon_window in &surgeon_windows {
                    let window_start_t = practice_window.start_time.max(surgeon_window.start_time);
                    let window_end_t = practice_window.end_time.min(surgeon_window.end_time);
                    if window_start_t >= window_end_t {
                        continue;
                    }
                    let Some(window_start) = localize(tz, date, window_start_t) else {
                        continue;
                    };
                    let Some(window_end) = localize(tz, date, window_end_t) else {
                        continue;
                    };

                    let mut candidate_base = window_start.with_timezone(&tz);
                    if query.start_date == now_local.date_naive() && date == query.start_date {
                        candidate_base = candidate_base.max(now_local);
                    }
                    let mut candidate =
                        ceil_to_step(candidate_base, self.config.slot_step_minutes);
                    let latest_start = window_end - duration;

                    while candidate.with_timezone(&Utc) <= latest_start {
                        let candidate_start = candidate.with_timezone(&Utc);
                        let candidate_end = candidate_start + duration;

                        let break_blocked = break_intervals.iter().any(|(bs, be)| {
                            overlaps(*bs, *be, candidate_start, candidate_end)
                        });
                        let conflicts = if break_blocked {
                            Vec::new()
                        } else {
                            detector
                                .operation_conflicts(
                                    team,
                                    room.id,
                                    device_ids,
                                    candidate_start,
                                    candidate_end,
                                    None,
                                )
                                .await?
                        };

                        if !break_blocked && conflicts.is_empty() {
                            suggestions.push(OperationSuggestion {
                                start_time: candidate_start,
                                end_time: candidate_end,
                                op_room_id: room.id,
                                device_ids: device_ids.to_vec(),
                            });
                            break;
                        }
                        candidate += step;
                    }

                    if suggestions.len() >= query.limit {
                        break 'days;
                    }
                }
            }

            date = match date.succ_opt() {
                Some(next) => next,
                None => break,
            };
            days_checked += 1;
        }

        Ok(suggestions)
    }
}

fn doctor_ref(doctor: &Clinician) -> DoctorRef {
    DoctorRef {
        id: doctor.id,
        name: doctor.display_name.clone(),
        color: doctor.color.clone(),
    }
}

/// Deduplicate ids preserving first-seen order.
pub fn dedup_ids(ids: &[Id]) -> Vec<Id> {
    let mut seen = std::collections::HashSet::new();
    ids.iter()
        .copied()
        .filter(|id| seen.insert(*id))
        .collect()
}
