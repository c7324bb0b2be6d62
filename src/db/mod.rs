/*!
 * Storage Seam
 *
 * The scheduling core talks to its datastore through the
 * `SchedulingStore` trait. Query methods return rows pre-sorted in the
 * deterministic orders the oracle/detector/suggestion engine depend on;
 * mutation methods are atomic units (an admission either fully persists
 * or leaves no trace).
 *
 * Production deployments back this with a SQL database and must provide
 * serializable conflict-check semantics (SERIALIZABLE isolation or range
 * locks over doctor/resource time ranges). The bundled `MemoryStore`
 * serializes writers through a single lock and is used by tests and
 * local development.
 */

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

use crate::models::{
    Appointment, AppointmentPatch, AppointmentType, AuditEvent, Clinician,
    DoctorAbsence, DoctorBreak, DoctorHours, FlowStatus, Id, NewAppointment, NewAppointmentType,
    NewClinician, NewDoctorBreak, NewDoctorHours, NewOperation, NewOperationType, NewPatientFlow,
    NewPracticeHours, NewResource, NewAuditEvent, Operation, OperationPatch, OperationStatus,
    OperationType, PatientFlow, PracticeHours, Resource,
};

pub use memory::MemoryStore;

/// Storage result type
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Storage backend failures.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Unique constraint violation.
    #[error("duplicate: {0}")]
    Duplicate(String),

    /// Row addressed by a mutation does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Backend failure (connection, serialization, ...).
    #[error("backend failure: {0}")]
    Backend(String),
}

/// A resource booked by an appointment within a probed window.
#[derive(Debug, Clone)]
pub struct ResourceBooking {
    pub resource_id: Id,
    pub appointment: Appointment,
}

/// A device used by an operation within a probed window.
#[derive(Debug, Clone)]
pub struct DeviceBooking {
    pub resource_id: Id,
    pub operation: Operation,
}

/// The datastore interface consumed by the scheduling core.
///
/// Sort contracts (unless noted otherwise): windows by
/// `(start_time, id)`, hours by `(start_time, id)`, absences by
/// `(start_date, id)`, breaks by `(date, start_time, id)`.
#[async_trait]
pub trait SchedulingStore: Send + Sync {
    // ==================== Clinicians ====================

    async fn clinician(&self, id: Id) -> StoreResult<Option<Clinician>>;

    /// Active clinicians with role doctor, ordered by id.
    async fn active_doctors(&self, exclude: Option<Id>) -> StoreResult<Vec<Clinician>>;

    async fn create_clinician(&self, new: NewClinician) -> StoreResult<Clinician>;

    // ==================== Catalog ====================

    async fn appointment_type(&self, id: Id) -> StoreResult<Option<AppointmentType>>;
    async fn appointment_types(&self) -> StoreResult<Vec<AppointmentType>>;
    async fn create_appointment_type(&self, new: NewAppointmentType)
        -> StoreResult<AppointmentType>;
    async fn set_appointment_type_active(&self, id: Id, active: bool)
        -> StoreResult<AppointmentType>;

    async fn operation_type(&self, id: Id) -> StoreResult<Option<OperationType>>;
    async fn operation_types(&self) -> StoreResult<Vec<OperationType>>;
    async fn create_operation_type(&self, new: NewOperationType) -> StoreResult<OperationType>;
    async fn set_operation_type_active(&self, id: Id, active: bool) -> StoreResult<OperationType>;

    async fn resource(&self, id: Id) -> StoreResult<Option<Resource>>;
    /// Resolve the given ids (active or not), ordered by id.
    async fn resources_by_ids(&self, ids: &[Id]) -> StoreResult<Vec<Resource>>;
    /// Active resources ordered by `(kind, name, id)`.
    async fn active_resources(&self) -> StoreResult<Vec<Resource>>;
    async fn create_resource(&self, new: NewResource) -> StoreResult<Resource>;
    async fn set_resource_active(&self, id: Id, active: bool) -> StoreResult<Resource>;

    // ==================== Hours ====================

    /// Active practice windows for a weekday (0 = Monday).
    async fn practice_hours_on(&self, weekday: u8) -> StoreResult<Vec<PracticeHours>>;
    async fn practice_hours(&self) -> StoreResult<Vec<PracticeHours>>;
    async fn create_practice_hours(&self, new: NewPracticeHours) -> StoreResult<PracticeHours>;
    async fn set_practice_hours_active(&self, id: Id, active: bool) -> StoreResult<PracticeHours>;

    /// Active doctor windows for a weekday (0 = Monday).
    async fn doctor_hours_on(&self, doctor_id: Id, weekday: u8) -> StoreResult<Vec<DoctorHours>>;
    async fn doctor_hours_for(&self, doctor_id: Id) -> StoreResult<Vec<DoctorHours>>;
    /// Fails with `Duplicate` when `(doctor, weekday, start, end, active)`
    /// already exists.
    async fn create_doctor_hours(&self, new: NewDoctorHours) -> StoreResult<DoctorHours>;
    async fn set_doctor_hours_active(&self, id: Id, active: bool) -> StoreResult<DoctorHours>;

    // ==================== Absences & breaks ====================

    async fn absence(&self, id: Id) -> StoreResult<Option<DoctorAbsence>>;

    /// First active absence of the doctor overlapping the inclusive date
    /// range, in `(start_date, id)` order.
    async fn first_absence_overlapping(
        &self,
        doctor_id: Id,
        start: NaiveDate,
        end: NaiveDate,
    ) -> StoreResult<Option<DoctorAbsence>>;

    /// Active absences overlapping the inclusive date range, all doctors.
    async fn absences_in_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> StoreResult<Vec<DoctorAbsence>>;

    /// Active vacation absences of a doctor, optionally excluding one
    /// record (for recomputation on update).
    async fn active_vacation_absences(
        &self,
        doctor_id: Id,
        exclude: Option<Id>,
    ) -> StoreResult<Vec<DoctorAbsence>>;

    /// Insert an absence with precomputed derived fields; the store
    /// assigns the id.
    async fn create_absence(&self, absence: DoctorAbsence) -> StoreResult<DoctorAbsence>;
    async fn set_absence_active(&self, id: Id, active: bool) -> StoreResult<DoctorAbsence>;

    async fn doctor_break(&self, id: Id) -> StoreResult<Option<DoctorBreak>>;

    /// Active breaks applying to the doctor (practice-wide or personal)
    /// in the inclusive date range.
    async fn breaks_for_doctor(
        &self,
        doctor_id: Id,
        start: NaiveDate,
        end: NaiveDate,
    ) -> StoreResult<Vec<DoctorBreak>>;

    /// Active breaks of all doctors in the inclusive date range.
    async fn breaks_in_range(&self, start: NaiveDate, end: NaiveDate)
        -> StoreResult<Vec<DoctorBreak>>;

    async fn create_break(&self, new: NewDoctorBreak) -> StoreResult<DoctorBreak>;
    async fn set_break_active(&self, id: Id, active: bool) -> StoreResult<DoctorBreak>;

    // ==================== Appointments ====================

    async fn appointment(&self, id: Id) -> StoreResult<Option<Appointment>>;

    /// Resource ids linked to an appointment, ordered by resource id.
    async fn appointment_resource_ids(&self, appointment_id: Id) -> StoreResult<Vec<Id>>;

    /// Appointments intersecting the optional window, optionally
    /// restricted to one doctor.
    async fn appointments_in_range(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        doctor_id: Option<Id>,
    ) -> StoreResult<Vec<Appointment>>;

    async fn appointments_for_doctor_overlapping(
        &self,
        doctor_id: Id,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude: Option<Id>,
    ) -> StoreResult<Vec<Appointment>>;

    async fn appointments_for_patient_overlapping(
        &self,
        patient_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude: Option<Id>,
    ) -> StoreResult<Vec<Appointment>>;

    /// Bookings of the given resources by appointments overlapping the
    /// window, ordered by `(appointment start, appointment id,
    /// resource id)`.
    async fn resource_bookings_overlapping(
        &self,
        resource_ids: &[Id],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude_appointment: Option<Id>,
    ) -> StoreResult<Vec<ResourceBooking>>;

    /// Create the appointment and its resource links atomically;
    /// duplicate pairs are ignored.
    async fn create_appointment(&self, new: NewAppointment) -> StoreResult<Appointment>;

    async fn update_appointment(&self, id: Id, patch: AppointmentPatch)
        -> StoreResult<Appointment>;

    async fn mark_appointment_no_show(&self, id: Id) -> StoreResult<Appointment>;

    async fn delete_appointment(&self, id: Id) -> StoreResult<()>;

    // ==================== Operations ====================

    async fn operation(&self, id: Id) -> StoreResult<Option<Operation>>;

    /// Device ids linked to an operation, ordered by resource id.
    async fn operation_device_ids(&self, operation_id: Id) -> StoreResult<Vec<Id>>;

    async fn operations_in_range(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> StoreResult<Vec<Operation>>;

    /// Operations where the doctor appears in any team role.
    async fn operations_for_doctor_overlapping(
        &self,
        doctor_id: Id,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude: Option<Id>,
    ) -> StoreResult<Vec<Operation>>;

    async fn operations_for_patient_overlapping(
        &self,
        patient_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude: Option<Id>,
    ) -> StoreResult<Vec<Operation>>;

    /// Operations using one of the rooms as op_room in the window.
    async fn operations_using_rooms_overlapping(
        &self,
        room_ids: &[Id],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude: Option<Id>,
    ) -> StoreResult<Vec<Operation>>;

    /// Device links of operations overlapping the window, ordered by
    /// `(operation start, operation id, resource id)`.
    async fn device_bookings_overlapping(
        &self,
        device_ids: &[Id],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude_operation: Option<Id>,
    ) -> StoreResult<Vec<DeviceBooking>>;

    /// Running operations that have started, ordered by `(start, id)`.
    async fn running_operations(&self, now: DateTime<Utc>) -> StoreResult<Vec<Operation>>;

    /// Create the operation and its device links atomically; duplicate
    /// pairs are ignored.
    async fn create_operation(&self, new: NewOperation) -> StoreResult<Operation>;

    async fn update_operation(&self, id: Id, patch: OperationPatch) -> StoreResult<Operation>;

    async fn set_operation_status(&self, id: Id, status: OperationStatus)
        -> StoreResult<Operation>;

    async fn delete_operation(&self, id: Id) -> StoreResult<()>;

    // ==================== Patient flow ====================

    async fn patient_flow(&self, id: Id) -> StoreResult<Option<PatientFlow>>;
    async fn patient_flows(&self) -> StoreResult<Vec<PatientFlow>>;
    async fn create_patient_flow(&self, new: NewPatientFlow) -> StoreResult<PatientFlow>;
    async fn set_flow_status(
        &self,
        id: Id,
        status: FlowStatus,
        now: DateTime<Utc>,
    ) -> StoreResult<PatientFlow>;

    // ==================== Audit ====================

    /// Append an audit event. The sink is append-only and must be safe
    /// to call from concurrent admissions.
    async fn append_audit(&self, event: NewAuditEvent) -> StoreResult<AuditEvent>;

    /// All audit events in append order.
    async fn audit_events(&self) -> StoreResult<Vec<AuditEvent>>;
}
