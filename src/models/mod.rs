/*!
 * Data Models Module
 *
 * Contains the scheduling domain entities, their status enums and the
 * request/response DTOs consumed by the service layer.
 */

pub mod absence;
pub mod appointment;
pub mod audit;
pub mod calendar;
pub mod clinician;
pub mod hours;
pub mod operation;
pub mod patient_flow;
pub mod resource;

/// Stable entity identifier. Sequences are monotonic per entity kind.
pub type Id = i64;

pub use absence::{DoctorAbsence, DoctorBreak, NewDoctorAbsence, NewDoctorBreak};
pub use appointment::{
    Appointment, AppointmentPatch, AppointmentStatus, AppointmentType, CreateAppointmentRequest,
    DoctorRef, DoctorSuggestions, NewAppointment, NewAppointmentType, SlotSuggestion,
    SuggestQuery, SuggestionResponse, TypeBadge, UpdateAppointmentRequest,
};
pub use audit::{AuditAction, AuditEvent, NewAuditEvent};
pub use calendar::{
    Availability, AvailabilityBlock, CalendarQuery, CalendarRange, CalendarView,
    DoctorAvailability,
};
pub use clinician::{Clinician, ClinicianRole, NewClinician};
pub use hours::{DoctorHours, NewDoctorHours, NewPracticeHours, PracticeHours};
pub use operation::{
    CreateOperationRequest, NewOperation, NewOperationType, Operation, OperationPatch,
    OperationStatus, OperationSuggestQuery, OperationSuggestion, OperationType,
    UpdateOperationRequest,
};
pub use patient_flow::{FlowStatus, NewPatientFlow, PatientFlow};
pub use resource::{NewResource, Resource, ResourceKind};
