/*!
 * Test Utilities
 *
 * Provides helper functions and structures for integration testing:
 * - In-memory store and service wiring
 * - Seed helpers for staff, hours, resources and types
 * - Time literal helpers in the practice's local zone
 */

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

use praxi_core::config::CoreConfig;
use praxi_core::db::{MemoryStore, SchedulingStore};
use praxi_core::models::{
    AppointmentType, Clinician, ClinicianRole, CreateAppointmentRequest, CreateOperationRequest,
    Id, NewAppointmentType, NewClinician, NewDoctorAbsence, NewDoctorBreak, NewDoctorHours,
    NewOperationType, NewPracticeHours, NewResource, OperationType, Resource, ResourceKind,
};
use praxi_core::services::{
    CalendarService, CatalogService, OperationLifecycleService, PatientFlowService, RosterService,
    SchedulingService, SuggestionService,
};
use praxi_core::utils::time::localize;

/// Test practice wrapper: one in-memory store with all services wired
/// against it, plus an admin and an assistant actor.
pub struct TestPractice {
    pub store: Arc<dyn SchedulingStore>,
    pub config: CoreConfig,
    pub scheduling: SchedulingService,
    pub suggestions: SuggestionService,
    pub lifecycle: OperationLifecycleService,
    pub flows: PatientFlowService,
    pub calendar: CalendarService,
    pub roster: RosterService,
    pub catalog: CatalogService,
    pub admin: Clinician,
    pub assistant: Clinician,
}

impl TestPractice {
    /// Create a fresh practice with default configuration.
    pub async fn new() -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();

        let store: Arc<dyn SchedulingStore> = Arc::new(MemoryStore::new());
        let config = CoreConfig::default();

        let admin = store
            .create_clinician(NewClinician {
                display_name: "Admin".to_string(),
                role: ClinicianRole::Admin,
                active: true,
                color: None,
            })
            .await
            .expect("seed admin");
        let assistant = store
            .create_clinician(NewClinician {
                display_name: "Front Desk".to_string(),
                role: ClinicianRole::Assistant,
                active: true,
                color: None,
            })
            .await
            .expect("seed assistant");

        Self {
            scheduling: SchedulingService::new(store.clone(), config.clone()),
            suggestions: SuggestionService::new(store.clone(), config.clone()),
            lifecycle: OperationLifecycleService::new(store.clone()),
            flows: PatientFlowService::new(store.clone()),
            calendar: CalendarService::new(store.clone(), config.clone()),
            roster: RosterService::new(store.clone(), config.clone()),
            catalog: CatalogService::new(store.clone()),
            store,
            config,
            admin,
            assistant,
        }
    }

    /// Seed an active doctor.
    pub async fn doctor(&self, name: &str) -> Clinician {
        self.store
            .create_clinician(NewClinician {
                display_name: name.to_string(),
                role: ClinicianRole::Doctor,
                active: true,
                color: Some("#2E8B57".to_string()),
            })
            .await
            .expect("seed doctor")
    }

    /// Seed a clinician with an arbitrary role.
    pub async fn clinician(&self, name: &str, role: ClinicianRole) -> Clinician {
        self.store
            .create_clinician(NewClinician {
                display_name: name.to_string(),
                role,
                active: true,
                color: None,
            })
            .await
            .expect("seed clinician")
    }

    /// Seed an active practice window.
    pub async fn practice_hours(&self, weekday: u8, start: &str, end: &str) {
        self.store
            .create_practice_hours(NewPracticeHours {
                weekday,
                start_time: t(start),
                end_time: t(end),
                active: true,
            })
            .await
            .expect("seed practice hours");
    }

    /// Seed an active doctor window.
    pub async fn doctor_hours(&self, doctor: &Clinician, weekday: u8, start: &str, end: &str) {
        self.store
            .create_doctor_hours(NewDoctorHours {
                doctor_id: doctor.id,
                weekday,
                start_time: t(start),
                end_time: t(end),
                active: true,
            })
            .await
            .expect("seed doctor hours");
    }

    /// Seed identical practice and doctor windows for every weekday.
    pub async fn full_week(&self, doctor: &Clinician, start: &str, end: &str) {
        for weekday in 0..7u8 {
            self.practice_hours(weekday, start, end).await;
            self.doctor_hours(doctor, weekday, start, end).await;
        }
    }

    /// Seed an absence via the roster service (derived fields included).
    pub async fn absence(&self, doctor: &Clinician, start: &str, end: &str, reason: &str) {
        self.roster
            .create_absence(
                &self.admin,
                NewDoctorAbsence {
                    doctor_id: doctor.id,
                    start_date: d(start),
                    end_date: d(end),
                    reason: Some(reason.to_string()),
                    active: true,
                },
            )
            .await
            .expect("seed absence");
    }

    /// Seed a break; `doctor = None` makes it practice-wide.
    pub async fn doctor_break(
        &self,
        doctor: Option<&Clinician>,
        date: &str,
        start: &str,
        end: &str,
    ) {
        self.store
            .create_break(NewDoctorBreak {
                doctor_id: doctor.map(|doc| doc.id),
                date: d(date),
                start_time: t(start),
                end_time: t(end),
                reason: Some("blocked".to_string()),
                active: true,
            })
            .await
            .expect("seed break");
    }

    pub async fn room(&self, name: &str) -> Resource {
        self.store
            .create_resource(NewResource {
                name: name.to_string(),
                kind: ResourceKind::Room,
                color: "#6A5ACD".to_string(),
                active: true,
            })
            .await
            .expect("seed room")
    }

    pub async fn device(&self, name: &str) -> Resource {
        self.store
            .create_resource(NewResource {
                name: name.to_string(),
                kind: ResourceKind::Device,
                color: "#6A5ACD".to_string(),
                active: true,
            })
            .await
            .expect("seed device")
    }

    pub async fn appointment_type(&self, name: &str, duration: Option<i64>) -> AppointmentType {
        self.store
            .create_appointment_type(NewAppointmentType {
                name: name.to_string(),
                color: Some("#2E8B57".to_string()),
                duration_minutes: duration,
                active: true,
            })
            .await
            .expect("seed appointment type")
    }

    pub async fn operation_type(
        &self,
        name: &str,
        prep: i64,
        op: i64,
        post: i64,
    ) -> OperationType {
        self.store
            .create_operation_type(NewOperationType {
                name: name.to_string(),
                prep_minutes: prep,
                op_minutes: op,
                post_minutes: post,
                color: Some("#8A2BE2".to_string()),
                active: true,
            })
            .await
            .expect("seed operation type")
    }

    /// Local practice wall-clock instant as UTC.
    pub fn local(&self, date: &str, time: &str) -> DateTime<Utc> {
        localize(self.config.time_zone, d(date), t(time)).expect("resolvable local time")
    }

    /// All audit events in append order.
    pub async fn audit_events(&self) -> Vec<praxi_core::models::AuditEvent> {
        self.store.audit_events().await.expect("audit events")
    }

    /// All audit action names in append order.
    pub async fn audit_actions(&self) -> Vec<String> {
        self.audit_events()
            .await
            .into_iter()
            .map(|e| e.action.as_str().to_string())
            .collect()
    }

    /// Resource ids linked to an appointment.
    pub async fn appointment_resource_ids(&self, appointment_id: Id) -> Vec<Id> {
        self.store
            .appointment_resource_ids(appointment_id)
            .await
            .expect("appointment resource links")
    }
}

/// Parse a `HH:MM` literal.
pub fn t(s: &str) -> NaiveTime {
    NaiveTime::parse_from_str(s, "%H:%M").expect("time literal")
}

/// Parse a `YYYY-MM-DD` literal.
pub fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("date literal")
}

/// Minimal appointment request.
pub fn appointment_request(
    patient_id: i64,
    doctor_id: Id,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> CreateAppointmentRequest {
    CreateAppointmentRequest {
        patient_id,
        doctor_id,
        start_time: start,
        end_time: end,
        type_id: None,
        resource_ids: None,
        status: None,
        notes: None,
    }
}

/// Minimal operation request.
pub fn operation_request(
    patient_id: i64,
    primary_surgeon_id: Id,
    op_room_id: Id,
    op_type_id: Id,
    start: DateTime<Utc>,
) -> CreateOperationRequest {
    CreateOperationRequest {
        patient_id,
        primary_surgeon_id,
        assistant_id: None,
        anesthesist_id: None,
        op_room_id,
        op_type_id,
        start_time: start,
        op_device_ids: None,
        status: None,
        notes: None,
    }
}
