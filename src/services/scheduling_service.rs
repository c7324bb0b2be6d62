/*!
 * Admission Planner
 *
 * Orchestrates the full validation pipeline for appointments and
 * operations: structural validation, authorization, reference
 * resolution, working-hours/absence/break checks, conflict detection,
 * persistence and audit emission.
 *
 * Any step's failure short-circuits; validation runs strictly before the
 * store mutation and every mutation is an atomic unit, so a typed
 * failure never leaves partial state. Each top-level operation accepts
 * an optional deadline and aborts with `Cancelled` once it passes.
 */

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use validator::Validate;

use crate::config::CoreConfig;
use crate::db::SchedulingStore;
use crate::models::{
    Appointment, AppointmentPatch, AppointmentStatus, AppointmentType, AuditAction, Clinician,
    CreateAppointmentRequest, CreateOperationRequest, Id, NewAppointment, NewOperation, Operation,
    OperationPatch, OperationStatus, Resource, SlotSuggestion, UpdateAppointmentRequest,
    UpdateOperationRequest,
};
use crate::services::audit_service::AuditService;
use crate::services::availability_service::AvailabilityService;
use crate::services::conflict_service::{merge_conflicts, ConflictDetector};
use crate::services::suggestion_service::{dedup_ids, SuggestionService};
use crate::utils::errors::{
    AbsenceRejection, BookingModel, BreakRejection, Conflict, ConflictKind, Result,
    SchedulingError, validation_error,
};
use crate::utils::permissions;
use crate::utils::time::{deadline_exceeded, local_date};

/// How many substitute slots to attach to hours/absence rejections.
const ALTERNATIVE_LIMIT: usize = 3;

/// Optional per-call deadline; once passed the pipeline aborts with
/// `Cancelled` before any mutation.
pub type Deadline = Option<DateTime<Utc>>;

/// Scheduling service
#[derive(Clone)]
pub struct SchedulingService {
    store: Arc<dyn SchedulingStore>,
    config: CoreConfig,
    availability: AvailabilityService,
    detector: ConflictDetector,
    suggestions: SuggestionService,
    audit: AuditService,
}

impl SchedulingService {
    /// Create a new scheduling service
    pub fn new(store: Arc<dyn SchedulingStore>, config: CoreConfig) -> Self {
        Self {
            availability: AvailabilityService::new(store.clone(), config.clone()),
            detector: ConflictDetector::new(store.clone()),
            suggestions: SuggestionService::new(store.clone(), config.clone()),
            audit: AuditService::new(store.clone()),
            store,
            config,
        }
    }

    fn check_deadline(&self, deadline: Deadline) -> Result<()> {
        if deadline_exceeded(deadline) {
            return Err(SchedulingError::Cancelled);
        }
        Ok(())
    }

    // ==================== Appointments ====================

    /// Plan and persist an appointment with full validation.
    pub async fn plan_appointment(
        &self,
        actor: &Clinician,
        request: CreateAppointmentRequest,
        deadline: Deadline,
    ) -> Result<Appointment> {
        request.validate().map_err(validation_error)?;
        if request.end_time <= request.start_time {
            return Err(SchedulingError::invalid(
                "end_time",
                "end_time must be after start_time",
            ));
        }

        permissions::ensure_appointment_write(actor, request.doctor_id)?;
        self.check_deadline(deadline)?;

        let doctor = self.resolve_doctor(request.doctor_id, "doctor_id").await?;
        if let Some(type_id) = request.type_id {
            self.resolve_appointment_type(type_id).await?;
        }
        let resources = self
            .resolve_active_resources(request.resource_ids.as_deref().unwrap_or(&[]))
            .await?;

        self.check_deadline(deadline)?;
        self.validate_window(
            doctor.id,
            request.start_time,
            request.end_time,
            true,
            Some(&resources),
        )
        .await?;

        self.check_deadline(deadline)?;
        let conflicts = self
            .detector
            .appointment_conflicts(
                doctor.id,
                &resources,
                request.start_time,
                request.end_time,
                None,
            )
            .await?;
        let patient_conflicts = self
            .detector
            .patient_conflicts(
                request.patient_id,
                request.start_time,
                request.end_time,
                None,
                None,
            )
            .await?;
        let conflicts = merge_conflicts(conflicts, patient_conflicts);
        if !conflicts.is_empty() {
            self.report_resource_conflict(actor, request.patient_id, &conflicts)
                .await;
            return Err(SchedulingError::Conflicts(conflicts));
        }

        self.check_deadline(deadline)?;
        let appointment = self
            .store
            .create_appointment(NewAppointment {
                patient_id: request.patient_id,
                doctor_id: doctor.id,
                type_id: request.type_id,
                start_time: request.start_time,
                end_time: request.end_time,
                status: request.status.unwrap_or(AppointmentStatus::Scheduled),
                notes: request.notes,
                resource_ids: resources.iter().map(|r| r.id).collect(),
            })
            .await?;

        self.audit
            .emit(
                Some(actor),
                AuditAction::AppointmentCreate,
                Some(appointment.patient_id),
                serde_json::json!({ "appointment_id": appointment.id }),
            )
            .await;

        Ok(appointment)
    }

    /// Patch an appointment, re-validating the window when it moves and
    /// the resource set when it changes.
    pub async fn update_appointment(
        &self,
        actor: &Clinician,
        id: Id,
        request: UpdateAppointmentRequest,
        deadline: Deadline,
    ) -> Result<Appointment> {
        request.validate().map_err(validation_error)?;

        let existing = self.require_appointment(id).await?;
        permissions::ensure_appointment_write(actor, existing.doctor_id)?;
        if request.is_empty() {
            return Ok(existing);
        }

        let start_time = request.start_time.unwrap_or(existing.start_time);
        let end_time = request.end_time.unwrap_or(existing.end_time);
        if end_time <= start_time {
            return Err(SchedulingError::invalid(
                "end_time",
                "end_time must be after start_time",
            ));
        }
        let window_changed =
            start_time != existing.start_time || end_time != existing.end_time;

        if let Some(type_id) = request.type_id {
            self.resolve_appointment_type(type_id).await?;
        }

        let resources = match &request.resource_ids {
            Some(ids) => self.resolve_active_resources(ids).await?,
            None => {
                let ids = self.store.appointment_resource_ids(id).await?;
                // existing links may reference now-inactive resources
                self.store.resources_by_ids(&ids).await?
            }
        };

        self.check_deadline(deadline)?;
        if window_changed {
            self.validate_window(existing.doctor_id, start_time, end_time, true, Some(&resources))
                .await?;
        }

        if window_changed || request.resource_ids.is_some() {
            let conflicts = self
                .detector
                .appointment_conflicts(
                    existing.doctor_id,
                    &resources,
                    start_time,
                    end_time,
                    Some(id),
                )
                .await?;
            let patient_conflicts = self
                .detector
                .patient_conflicts(existing.patient_id, start_time, end_time, Some(id), None)
                .await?;
            let conflicts = merge_conflicts(conflicts, patient_conflicts);
            if !conflicts.is_empty() {
                self.report_resource_conflict(actor, existing.patient_id, &conflicts)
                    .await;
                return Err(SchedulingError::Conflicts(conflicts));
            }
        }

        self.check_deadline(deadline)?;
        let audit_changes = serde_json::to_value(&request).unwrap_or(serde_json::Value::Null);
        let updated = self
            .store
            .update_appointment(
                id,
                AppointmentPatch {
                    start_time: request.start_time,
                    end_time: request.end_time,
                    type_id: request.type_id,
                    status: request.status,
                    notes: request.notes,
                    resource_ids: request
                        .resource_ids
                        .map(|_| resources.iter().map(|r| r.id).collect()),
                },
            )
            .await?;

        self.audit
            .emit(
                Some(actor),
                AuditAction::AppointmentUpdate,
                Some(updated.patient_id),
                audit_changes,
            )
            .await;

        Ok(updated)
    }

    /// Mark a past scheduled/confirmed appointment as a confirmed
    /// no-show. The flag is idempotent and immutable once set.
    pub async fn mark_no_show(
        &self,
        actor: &Clinician,
        id: Id,
        now: DateTime<Utc>,
    ) -> Result<Appointment> {
        let existing = self.require_appointment(id).await?;
        permissions::ensure_appointment_write(actor, existing.doctor_id)?;

        if !existing.is_past(now) {
            return Err(SchedulingError::InvalidState {
                detail: "no-show can only be set for past appointments".to_string(),
            });
        }
        if !existing.status.no_show_eligible() {
            return Err(SchedulingError::InvalidState {
                detail: "only scheduled or confirmed appointments can be marked as no-show"
                    .to_string(),
            });
        }

        let newly_marked = !existing.is_no_show;
        let appointment = self.store.mark_appointment_no_show(id).await?;

        if newly_marked {
            self.audit
                .emit(
                    Some(actor),
                    AuditAction::AppointmentMarkNoShow,
                    Some(appointment.patient_id),
                    serde_json::json!({ "appointment_id": appointment.id }),
                )
                .await;
        }

        Ok(appointment)
    }

    /// Fetch a single appointment, enforcing read visibility.
    pub async fn get_appointment(&self, actor: &Clinician, id: Id) -> Result<Appointment> {
        permissions::ensure_appointment_read(actor)?;
        let appointment = self.require_appointment(id).await?;
        if !permissions::appointment_visible(actor, &appointment) {
            return Err(SchedulingError::not_authorized("appointments.read"));
        }

        self.audit
            .emit(
                Some(actor),
                AuditAction::AppointmentView,
                Some(appointment.patient_id),
                serde_json::json!({ "appointment_id": appointment.id }),
            )
            .await;

        Ok(appointment)
    }

    /// List appointments in an optional window, filtered by visibility.
    pub async fn list_appointments(
        &self,
        actor: &Clinician,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        doctor_id: Option<Id>,
    ) -> Result<Vec<Appointment>> {
        permissions::ensure_appointment_read(actor)?;
        let appointments = self
            .store
            .appointments_in_range(from, to, doctor_id)
            .await?
            .into_iter()
            .filter(|a| permissions::appointment_visible(actor, a))
            .collect();

        self.audit
            .emit(Some(actor), AuditAction::AppointmentList, None, serde_json::json!({}))
            .await;

        Ok(appointments)
    }

    /// Delete an appointment.
    pub async fn delete_appointment(&self, actor: &Clinician, id: Id) -> Result<()> {
        let existing = self.require_appointment(id).await?;
        permissions::ensure_appointment_write(actor, existing.doctor_id)?;

        self.store.delete_appointment(id).await?;

        self.audit
            .emit(
                Some(actor),
                AuditAction::AppointmentDelete,
                Some(existing.patient_id),
                serde_json::json!({ "appointment_id": id }),
            )
            .await;

        Ok(())
    }

    // ==================== Operations ====================

    /// Plan and persist an operation. The end time is derived from the
    /// operation type; working hours are enforced for the primary
    /// surgeon, absence and break checks for every team member.
    pub async fn plan_operation(
        &self,
        actor: &Clinician,
        request: CreateOperationRequest,
        deadline: Deadline,
    ) -> Result<Operation> {
        request.validate().map_err(validation_error)?;
        permissions::ensure_operation_write(actor)?;
        self.check_deadline(deadline)?;

        let op_type = self
            .store
            .operation_type(request.op_type_id)
            .await?
            .filter(|t| t.active)
            .ok_or_else(|| {
                SchedulingError::not_found(format!("operation type {}", request.op_type_id))
            })?;
        let total_minutes = op_type.total_minutes();
        if total_minutes <= 0 {
            return Err(SchedulingError::invalid(
                "op_type_id",
                "operation type has no bookable duration",
            ));
        }
        let start_time = request.start_time;
        let end_time = start_time + Duration::minutes(total_minutes);

        let surgeon = self
            .resolve_doctor(request.primary_surgeon_id, "primary_surgeon_id")
            .await?;
        let mut team = vec![surgeon.id];
        for (field, member_id) in [
            ("assistant_id", request.assistant_id),
            ("anesthesist_id", request.anesthesist_id),
        ] {
            if let Some(member_id) = member_id {
                let member = self.resolve_doctor(member_id, field).await?;
                team.push(member.id);
            }
        }

        let room = self.resolve_room(request.op_room_id).await?;
        let device_ids = dedup_ids(request.op_device_ids.as_deref().unwrap_or(&[]));
        self.resolve_devices(&device_ids).await?;

        self.check_deadline(deadline)?;

        // Working hours: primary surgeon only. Absences and breaks:
        // every provided team member.
        if let Some(violation) = self
            .availability
            .hours_violation(surgeon.id, start_time, end_time)
            .await?
        {
            return Err(SchedulingError::WorkingHours(violation));
        }
        for &member in &team {
            self.validate_window(member, start_time, end_time, false, None)
                .await?;
        }

        self.check_deadline(deadline)?;
        let conflicts = self
            .detector
            .operation_conflicts(&team, room.id, &device_ids, start_time, end_time, None)
            .await?;
        let patient_conflicts = self
            .detector
            .patient_conflicts(request.patient_id, start_time, end_time, None, None)
            .await?;
        let conflicts = merge_conflicts(conflicts, patient_conflicts);
        if !conflicts.is_empty() {
            self.report_resource_conflict(actor, request.patient_id, &conflicts)
                .await;
            return Err(SchedulingError::Conflicts(conflicts));
        }

        self.check_deadline(deadline)?;
        let operation = self
            .store
            .create_operation(NewOperation {
                patient_id: request.patient_id,
                primary_surgeon_id: surgeon.id,
                assistant_id: request.assistant_id,
                anesthesist_id: request.anesthesist_id,
                op_room_id: room.id,
                op_type_id: op_type.id,
                start_time,
                end_time,
                status: request.status.unwrap_or(OperationStatus::Planned),
                notes: request.notes,
                device_ids,
            })
            .await?;

        self.audit
            .emit(
                Some(actor),
                AuditAction::OperationCreate,
                Some(operation.patient_id),
                serde_json::json!({ "operation_id": operation.id }),
            )
            .await;

        Ok(operation)
    }

    /// Patch an operation, recomputing the derived end time and
    /// re-running the full validation pipeline against the new shape.
    pub async fn update_operation(
        &self,
        actor: &Clinician,
        id: Id,
        request: UpdateOperationRequest,
        deadline: Deadline,
    ) -> Result<Operation> {
        request.validate().map_err(validation_error)?;
        permissions::ensure_operation_write(actor)?;

        let existing = self.require_operation(id).await?;
        if request.is_empty() {
            return Ok(existing);
        }

        let op_type_id = request.op_type_id.unwrap_or(existing.op_type_id);
        let op_type = self
            .store
            .operation_type(op_type_id)
            .await?
            .ok_or_else(|| SchedulingError::not_found(format!("operation type {op_type_id}")))?;
        let total_minutes = op_type.total_minutes();
        if total_minutes <= 0 {
            return Err(SchedulingError::invalid(
                "op_type_id",
                "operation type has no bookable duration",
            ));
        }
        let start_time = request.start_time.unwrap_or(existing.start_time);
        let end_time = start_time + Duration::minutes(total_minutes);

        let room_id = request.op_room_id.unwrap_or(existing.op_room_id);
        if request.op_room_id.is_some() {
            self.resolve_room(room_id).await?;
        }

        let assistant_id = request.assistant_id.or(existing.assistant_id);
        let anesthesist_id = request.anesthesist_id.or(existing.anesthesist_id);
        for (field, member_id, changed) in [
            ("assistant_id", assistant_id, request.assistant_id.is_some()),
            (
                "anesthesist_id",
                anesthesist_id,
                request.anesthesist_id.is_some(),
            ),
        ] {
            if changed {
                if let Some(member_id) = member_id {
                    self.resolve_doctor(member_id, field).await?;
                }
            }
        }

        let device_ids = match &request.op_device_ids {
            Some(ids) => {
                let ids = dedup_ids(ids);
                self.resolve_devices(&ids).await?;
                ids
            }
            None => self.store.operation_device_ids(id).await?,
        };

        let mut team = vec![existing.primary_surgeon_id];
        if let Some(member) = assistant_id {
            team.push(member);
        }
        if let Some(member) = anesthesist_id {
            team.push(member);
        }

        self.check_deadline(deadline)?;
        if let Some(violation) = self
            .availability
            .hours_violation(existing.primary_surgeon_id, start_time, end_time)
            .await?
        {
            return Err(SchedulingError::WorkingHours(violation));
        }
        for &member in &team {
            self.validate_window(member, start_time, end_time, false, None)
                .await?;
        }

        let conflicts = self
            .detector
            .operation_conflicts(&team, room_id, &device_ids, start_time, end_time, Some(id))
            .await?;
        let patient_conflicts = self
            .detector
            .patient_conflicts(existing.patient_id, start_time, end_time, None, Some(id))
            .await?;
        let conflicts = merge_conflicts(conflicts, patient_conflicts);
        if !conflicts.is_empty() {
            self.report_resource_conflict(actor, existing.patient_id, &conflicts)
                .await;
            return Err(SchedulingError::Conflicts(conflicts));
        }

        self.check_deadline(deadline)?;
        let audit_changes = serde_json::to_value(&request).unwrap_or(serde_json::Value::Null);
        let updated = self
            .store
            .update_operation(
                id,
                OperationPatch {
                    start_time: Some(start_time),
                    end_time: Some(end_time),
                    op_type_id: request.op_type_id,
                    op_room_id: request.op_room_id,
                    assistant_id: request.assistant_id,
                    anesthesist_id: request.anesthesist_id,
                    notes: request.notes,
                    device_ids: request.op_device_ids.map(|_| device_ids),
                },
            )
            .await?;

        self.audit
            .emit(
                Some(actor),
                AuditAction::OperationUpdate,
                Some(updated.patient_id),
                audit_changes,
            )
            .await;

        Ok(updated)
    }

    /// Fetch a single operation, enforcing read visibility.
    pub async fn get_operation(&self, actor: &Clinician, id: Id) -> Result<Operation> {
        permissions::ensure_operation_read(actor)?;
        let operation = self.require_operation(id).await?;
        if !permissions::operation_visible(actor, &operation) {
            return Err(SchedulingError::not_authorized("operations.read"));
        }

        self.audit
            .emit(
                Some(actor),
                AuditAction::OperationView,
                Some(operation.patient_id),
                serde_json::json!({ "operation_id": operation.id }),
            )
            .await;

        Ok(operation)
    }

    /// List operations in an optional window, filtered by visibility.
    pub async fn list_operations(
        &self,
        actor: &Clinician,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<Operation>> {
        permissions::ensure_operation_read(actor)?;
        let operations = self
            .store
            .operations_in_range(from, to)
            .await?
            .into_iter()
            .filter(|o| permissions::operation_visible(actor, o))
            .collect();

        self.audit
            .emit(Some(actor), AuditAction::OperationList, None, serde_json::json!({}))
            .await;

        Ok(operations)
    }

    /// Delete an operation.
    pub async fn delete_operation(&self, actor: &Clinician, id: Id) -> Result<()> {
        permissions::ensure_operation_write(actor)?;
        let existing = self.require_operation(id).await?;

        self.store.delete_operation(id).await?;

        self.audit
            .emit(
                Some(actor),
                AuditAction::OperationDelete,
                Some(existing.patient_id),
                serde_json::json!({ "operation_id": id }),
            )
            .await;

        Ok(())
    }

    // ==================== Shared pipeline steps ====================

    /// Run the oracle checks for one doctor. `check_hours` is off for
    /// operation team members other than the primary surgeon. When
    /// `alternative_resources` is set, rejections carry substitute
    /// suggestions.
    async fn validate_window(
        &self,
        doctor_id: Id,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        check_hours: bool,
        alternative_resources: Option<&[Resource]>,
    ) -> Result<()> {
        if check_hours {
            if let Some(mut violation) = self
                .availability
                .hours_violation(doctor_id, start, end)
                .await?
            {
                if let Some(resources) = alternative_resources {
                    violation.alternatives = self
                        .substitute_alternatives(doctor_id, start, end, resources)
                        .await;
                }
                return Err(SchedulingError::WorkingHours(violation));
            }
        }

        if let Some(absence) = self.availability.first_absence(doctor_id, start, end).await? {
            let alternatives = match alternative_resources {
                Some(resources) => {
                    self.substitute_alternatives(doctor_id, start, end, resources)
                        .await
                }
                None => Vec::new(),
            };
            return Err(SchedulingError::DoctorAbsent(AbsenceRejection {
                doctor_id,
                date: local_date(start, self.config.time_zone),
                absence_id: absence.id,
                reason: absence.reason,
                alternatives,
            }));
        }

        if let Some(break_row) = self
            .availability
            .first_break_conflict(doctor_id, start, end)
            .await?
        {
            return Err(SchedulingError::BreakConflict(BreakRejection {
                doctor_id: break_row.doctor_id,
                date: break_row.date,
                break_id: break_row.id,
                break_start: break_row.start_time,
                break_end: break_row.end_time,
            }));
        }

        Ok(())
    }

    /// Compute a few same-day slots with other active doctors to attach
    /// to hours/absence rejections. Best-effort: failures yield an empty
    /// list.
    async fn substitute_alternatives(
        &self,
        doctor_id: Id,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        resources: &[Resource],
    ) -> Vec<SlotSuggestion> {
        let duration_minutes = (end - start).num_minutes();
        if duration_minutes <= 0 {
            return Vec::new();
        }
        let date = local_date(start, self.config.time_zone);

        let substitutes = match self.store.active_doctors(Some(doctor_id)).await {
            Ok(doctors) => doctors,
            Err(_) => return Vec::new(),
        };

        let mut alternatives = Vec::new();
        for substitute in substitutes {
            if alternatives.len() >= ALTERNATIVE_LIMIT {
                break;
            }
            let slots = self
                .suggestions
                .compute_for_doctor(
                    &substitute,
                    date,
                    duration_minutes,
                    1,
                    None,
                    resources,
                    Some(date),
                    start,
                    1,
                )
                .await;
            if let Ok(slots) = slots {
                alternatives.extend(slots);
            }
        }
        alternatives.truncate(ALTERNATIVE_LIMIT);
        alternatives
    }

    /// Emit the `resource_booking_conflict` audit event for the first
    /// room/device conflict in the list, if any. Best-effort.
    async fn report_resource_conflict(
        &self,
        actor: &Clinician,
        patient_id: i64,
        conflicts: &[Conflict],
    ) {
        let resource_conflict = conflicts.iter().find(|c| {
            matches!(
                c.kind,
                ConflictKind::RoomConflict | ConflictKind::DeviceConflict
            )
        });
        let Some(conflict) = resource_conflict else {
            return;
        };

        let mut meta = serde_json::Map::new();
        if let Some(resource_id) = conflict.resource_id {
            meta.insert("resource_id".to_string(), serde_json::json!(resource_id));
        }
        match conflict.model {
            BookingModel::Appointment => {
                meta.insert("appointment_id".to_string(), serde_json::json!(conflict.id));
            }
            BookingModel::Operation => {
                meta.insert("operation_id".to_string(), serde_json::json!(conflict.id));
                let reason = match conflict.kind {
                    ConflictKind::RoomConflict => "operation_room",
                    _ => "operation_device",
                };
                meta.insert("reason".to_string(), serde_json::json!(reason));
            }
        }

        self.audit
            .emit(
                Some(actor),
                AuditAction::ResourceBookingConflict,
                Some(patient_id),
                serde_json::Value::Object(meta),
            )
            .await;
    }

    // ==================== Reference resolution ====================

    async fn require_appointment(&self, id: Id) -> Result<Appointment> {
        self.store
            .appointment(id)
            .await?
            .ok_or_else(|| SchedulingError::not_found(format!("appointment {id}")))
    }

    async fn require_operation(&self, id: Id) -> Result<Operation> {
        self.store
            .operation(id)
            .await?
            .ok_or_else(|| SchedulingError::not_found(format!("operation {id}")))
    }

    async fn resolve_doctor(&self, doctor_id: Id, field: &str) -> Result<Clinician> {
        let clinician = self
            .store
            .clinician(doctor_id)
            .await?
            .filter(|c| c.active)
            .ok_or_else(|| SchedulingError::not_found(format!("doctor {doctor_id}")))?;
        if !clinician.is_doctor() {
            return Err(SchedulingError::invalid(
                field,
                "clinician does not have role doctor",
            ));
        }
        Ok(clinician)
    }

    async fn resolve_appointment_type(&self, type_id: Id) -> Result<AppointmentType> {
        self.store
            .appointment_type(type_id)
            .await?
            .filter(|t| t.active)
            .ok_or_else(|| SchedulingError::not_found(format!("appointment type {type_id}")))
    }

    async fn resolve_room(&self, room_id: Id) -> Result<Resource> {
        let room = self
            .store
            .resource(room_id)
            .await?
            .filter(|r| r.active)
            .ok_or_else(|| SchedulingError::not_found(format!("room {room_id}")))?;
        if !room.is_room() {
            return Err(SchedulingError::invalid(
                "op_room_id",
                "resource is not a room",
            ));
        }
        Ok(room)
    }

    async fn resolve_devices(&self, device_ids: &[Id]) -> Result<Vec<Resource>> {
        let devices = self.resolve_active_resources(device_ids).await?;
        for device in &devices {
            if !device.is_device() {
                return Err(SchedulingError::invalid(
                    "op_device_ids",
                    format!("resource {} is not a device", device.id),
                ));
            }
        }
        Ok(devices)
    }

    /// Deduplicate ids preserving order and resolve each to an active
    /// resource.
    async fn resolve_active_resources(&self, ids: &[Id]) -> Result<Vec<Resource>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let unique = dedup_ids(ids);
        let found = self.store.resources_by_ids(&unique).await?;
        let mut resolved = Vec::with_capacity(unique.len());
        for id in &unique {
            match found.iter().find(|r| r.id == *id) {
                Some(resource) if resource.active => resolved.push(resource.clone()),
                _ => return Err(SchedulingError::not_found(format!("resource {id}"))),
            }
        }
        Ok(resolved)
    }
}
