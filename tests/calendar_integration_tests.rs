/*!
 * Calendar, Patient Flow and Administration Integration Tests
 *
 * Covers the aggregated calendar view with its availability summary,
 * the patient-flow lifecycle, and roster/catalog administration rules.
 */

mod test_utils;

use praxi_core::models::{
    AvailabilityBlock, CalendarQuery, CalendarRange, ClinicianRole, FlowStatus, NewDoctorAbsence,
    NewDoctorHours, NewPatientFlow,
};
use praxi_core::utils::errors::SchedulingError;
use test_utils::{appointment_request, d, t, TestPractice};

// 2026-03-02 is a Monday.
const MONDAY: &str = "2026-03-02";

#[tokio::test]
async fn test_calendar_week_view_collects_bookings() {
    let practice = TestPractice::new().await;
    let doctor = practice.doctor("Dr. Weber").await;
    practice.practice_hours(0, "08:00", "16:00").await;
    practice.doctor_hours(&doctor, 0, "08:00", "16:00").await;
    practice.doctor_break(None, MONDAY, "12:00", "13:00").await;

    practice
        .scheduling
        .plan_appointment(
            &practice.assistant,
            appointment_request(
                1,
                doctor.id,
                practice.local(MONDAY, "10:00"),
                practice.local(MONDAY, "10:30"),
            ),
            None,
        )
        .await
        .expect("appointment");

    let view = practice
        .calendar
        .view(
            &practice.assistant,
            CalendarQuery {
                date: d("2026-03-04"), // Wednesday of the same week
                range: CalendarRange::Week,
                doctor_id: None,
            },
            practice.local("2026-03-01", "12:00"),
        )
        .await
        .expect("calendar view");

    assert_eq!(view.range_start, d(MONDAY));
    assert_eq!(view.range_end, d("2026-03-08"));
    assert_eq!(view.appointments.len(), 1);
    assert_eq!(view.breaks.len(), 1);
    // the doctor still has free slots this week
    let availability = view
        .doctor_availability
        .iter()
        .find(|a| a.doctor.id == doctor.id)
        .expect("doctor availability entry");
    assert!(availability.available);

    let actions = practice.audit_actions().await;
    assert!(actions.contains(&"resource_calendar_view".to_string()));
}

#[tokio::test]
async fn test_calendar_availability_reports_absence() {
    let practice = TestPractice::new().await;
    let doctor = practice.doctor("Dr. Weber").await;
    practice.practice_hours(0, "08:00", "16:00").await;
    practice.doctor_hours(&doctor, 0, "08:00", "16:00").await;
    // absent the whole week
    practice.absence(&doctor, MONDAY, "2026-03-08", "vacation").await;

    let view = practice
        .calendar
        .view(
            &practice.assistant,
            CalendarQuery {
                date: d(MONDAY),
                range: CalendarRange::Week,
                doctor_id: Some(doctor.id),
            },
            practice.local("2026-03-01", "12:00"),
        )
        .await
        .expect("calendar view");

    let availability = &view.doctor_availability[0];
    assert!(!availability.available);
    assert_eq!(availability.reason, Some(AvailabilityBlock::Absence));
    assert_eq!(view.absences.len(), 1);
}

#[tokio::test]
async fn test_patient_flow_moves_forward_only() {
    let practice = TestPractice::new().await;
    let doctor = practice.doctor("Dr. Weber").await;
    practice.practice_hours(0, "08:00", "16:00").await;
    practice.doctor_hours(&doctor, 0, "08:00", "16:00").await;

    let appointment = practice
        .scheduling
        .plan_appointment(
            &practice.assistant,
            appointment_request(
                1,
                doctor.id,
                practice.local(MONDAY, "10:00"),
                practice.local(MONDAY, "10:30"),
            ),
            None,
        )
        .await
        .expect("appointment");

    let flow = practice
        .flows
        .create_flow(
            &practice.assistant,
            NewPatientFlow {
                appointment_id: Some(appointment.id),
                operation_id: None,
                status: FlowStatus::Registered,
                arrival_time: Some(practice.local(MONDAY, "09:50")),
                notes: None,
            },
        )
        .await
        .expect("flow");

    // forward, with a skipped state
    let flow = practice
        .flows
        .update_status(
            &practice.assistant,
            flow.id,
            FlowStatus::InTreatment,
            practice.local(MONDAY, "10:00"),
        )
        .await
        .expect("registered -> in_treatment");
    assert_eq!(flow.status, FlowStatus::InTreatment);

    // backwards is rejected
    let err = practice
        .flows
        .update_status(
            &practice.assistant,
            flow.id,
            FlowStatus::Waiting,
            practice.local(MONDAY, "10:05"),
        )
        .await
        .expect_err("no backwards transitions");
    assert!(matches!(err, SchedulingError::InvalidTransition { .. }));

    // done is terminal
    practice
        .flows
        .update_status(
            &practice.assistant,
            flow.id,
            FlowStatus::Done,
            practice.local(MONDAY, "10:30"),
        )
        .await
        .expect("-> done");
    let err = practice
        .flows
        .update_status(
            &practice.assistant,
            flow.id,
            FlowStatus::Registered,
            practice.local(MONDAY, "10:35"),
        )
        .await
        .expect_err("done is terminal");
    assert!(matches!(err, SchedulingError::InvalidTransition { .. }));

    let events = practice.audit_events().await;
    let updates: Vec<_> = events
        .iter()
        .filter(|e| e.action.as_str() == "patient_flow_status_update")
        .collect();
    assert_eq!(updates.len(), 2);
    assert_eq!(updates[0].patient_id, Some(1));
}

#[tokio::test]
async fn test_flow_requires_exactly_one_link() {
    let practice = TestPractice::new().await;

    let err = practice
        .flows
        .create_flow(
            &practice.assistant,
            NewPatientFlow {
                appointment_id: None,
                operation_id: None,
                status: FlowStatus::Registered,
                arrival_time: None,
                notes: None,
            },
        )
        .await
        .expect_err("a link is required");
    assert!(matches!(err, SchedulingError::InvalidData { .. }));
}

#[tokio::test]
async fn test_doctor_updates_own_flows_only() {
    let practice = TestPractice::new().await;
    let doctor_a = practice.doctor("Dr. Weber").await;
    let doctor_b = practice.doctor("Dr. Huber").await;
    practice.practice_hours(0, "08:00", "16:00").await;
    practice.doctor_hours(&doctor_a, 0, "08:00", "16:00").await;
    practice.doctor_hours(&doctor_b, 0, "08:00", "16:00").await;

    let appointment = practice
        .scheduling
        .plan_appointment(
            &practice.assistant,
            appointment_request(
                1,
                doctor_a.id,
                practice.local(MONDAY, "10:00"),
                practice.local(MONDAY, "10:30"),
            ),
            None,
        )
        .await
        .expect("appointment");
    let flow = practice
        .flows
        .create_flow(
            &practice.assistant,
            NewPatientFlow {
                appointment_id: Some(appointment.id),
                operation_id: None,
                status: FlowStatus::Registered,
                arrival_time: None,
                notes: None,
            },
        )
        .await
        .expect("flow");

    // the treating doctor may move the flow
    practice
        .flows
        .update_status(
            &doctor_a,
            flow.id,
            FlowStatus::Waiting,
            practice.local(MONDAY, "10:00"),
        )
        .await
        .expect("own flow");

    // another doctor may not
    let err = practice
        .flows
        .update_status(
            &doctor_b,
            flow.id,
            FlowStatus::Preparing,
            practice.local(MONDAY, "10:05"),
        )
        .await
        .expect_err("foreign flow");
    assert!(matches!(err, SchedulingError::NotAuthorized { .. }));
}

#[tokio::test]
async fn test_duplicate_doctor_hours_rejected() {
    let practice = TestPractice::new().await;
    let doctor = practice.doctor("Dr. Weber").await;

    let new = || NewDoctorHours {
        doctor_id: doctor.id,
        weekday: 0,
        start_time: t("08:00"),
        end_time: t("12:00"),
        active: true,
    };

    practice
        .roster
        .create_doctor_hours(&practice.admin, new())
        .await
        .expect("first slot");
    let err = practice
        .roster
        .create_doctor_hours(&practice.admin, new())
        .await
        .expect_err("identical slot is a duplicate");
    assert!(matches!(err, SchedulingError::InvalidData { .. }));
}

#[tokio::test]
async fn test_absence_derived_fields_and_vacation_budget() {
    let practice = TestPractice::new().await;
    let doctor = practice.doctor("Dr. Weber").await;

    // Mon..Fri vacation week
    let absence = practice
        .roster
        .create_absence(
            &practice.admin,
            NewDoctorAbsence {
                doctor_id: doctor.id,
                start_date: d(MONDAY),
                end_date: d("2026-03-06"),
                reason: Some("vacation".to_string()),
                active: true,
            },
        )
        .await
        .expect("absence");

    assert_eq!(absence.workdays_count, 5);
    // next workday after Friday is Monday
    assert_eq!(absence.return_date, d("2026-03-09"));
    // 30 days allocation minus this week
    assert_eq!(absence.remaining_vacation, Some(25));

    // a second vacation later the same year sees the first one
    let second = practice
        .roster
        .create_absence(
            &practice.admin,
            NewDoctorAbsence {
                doctor_id: doctor.id,
                start_date: d("2026-07-06"), // Monday
                end_date: d("2026-07-10"),   // Friday
                reason: Some("Vacation".to_string()),
                active: true,
            },
        )
        .await
        .expect("second absence");
    assert_eq!(second.remaining_vacation, Some(20));

    // non-vacation absences have no budget
    let sick = practice
        .roster
        .create_absence(
            &practice.admin,
            NewDoctorAbsence {
                doctor_id: doctor.id,
                start_date: d("2026-09-07"),
                end_date: d("2026-09-08"),
                reason: Some("sick leave".to_string()),
                active: true,
            },
        )
        .await
        .expect("sick leave");
    assert_eq!(sick.remaining_vacation, None);
}

#[tokio::test]
async fn test_doctor_manages_own_absences_only() {
    let practice = TestPractice::new().await;
    let doctor_a = practice.doctor("Dr. Weber").await;
    let doctor_b = practice.doctor("Dr. Huber").await;

    practice
        .roster
        .create_absence(
            &doctor_a,
            NewDoctorAbsence {
                doctor_id: doctor_a.id,
                start_date: d(MONDAY),
                end_date: d(MONDAY),
                reason: Some("vacation".to_string()),
                active: true,
            },
        )
        .await
        .expect("own absence");

    let err = practice
        .roster
        .create_absence(
            &doctor_a,
            NewDoctorAbsence {
                doctor_id: doctor_b.id,
                start_date: d(MONDAY),
                end_date: d(MONDAY),
                reason: Some("vacation".to_string()),
                active: true,
            },
        )
        .await
        .expect_err("colleague's absence");
    assert!(matches!(err, SchedulingError::NotAuthorized { .. }));
}

#[tokio::test]
async fn test_type_administration_is_admin_only() {
    let practice = TestPractice::new().await;

    let err = practice
        .catalog
        .create_appointment_type(
            &practice.assistant,
            praxi_core::models::NewAppointmentType {
                name: "checkup".to_string(),
                color: None,
                duration_minutes: Some(30),
                active: true,
            },
        )
        .await
        .expect_err("assistants cannot manage types");
    assert!(matches!(err, SchedulingError::NotAuthorized { .. }));

    practice
        .catalog
        .create_appointment_type(
            &practice.admin,
            praxi_core::models::NewAppointmentType {
                name: "checkup".to_string(),
                color: None,
                duration_minutes: Some(30),
                active: true,
            },
        )
        .await
        .expect("admins can");
}

#[tokio::test]
async fn test_billing_reads_but_never_writes_config() {
    let practice = TestPractice::new().await;
    let billing = practice.clinician("Books", ClinicianRole::Billing).await;

    practice
        .catalog
        .list_resources(&billing)
        .await
        .expect("billing reads resources");
    let err = practice
        .catalog
        .create_resource(
            &billing,
            praxi_core::models::NewResource {
                name: "OP 1".to_string(),
                kind: praxi_core::models::ResourceKind::Room,
                color: "#6A5ACD".to_string(),
                active: true,
            },
        )
        .await
        .expect_err("billing cannot write resources");
    assert!(matches!(err, SchedulingError::NotAuthorized { .. }));
}
