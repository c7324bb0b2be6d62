/*!
 * Slot Suggestion Integration Tests
 *
 * Covers the day-window scan: step alignment, window intersection,
 * busy/break/resource blocking, substitute doctors and determinism.
 */

mod test_utils;

use praxi_core::models::{OperationSuggestQuery, SuggestQuery};
use praxi_core::utils::errors::SchedulingError;
use test_utils::{appointment_request, d, operation_request, TestPractice};

// 2026-03-02 is a Monday.
const MONDAY: &str = "2026-03-02";

fn suggest_query(doctor_id: i64, duration: i64, limit: usize) -> SuggestQuery {
    SuggestQuery {
        doctor_id,
        start_date: d(MONDAY),
        duration_minutes: Some(duration),
        type_id: None,
        resource_ids: None,
        limit,
        now: None,
    }
}

#[tokio::test]
async fn test_first_slot_at_window_intersection() {
    let practice = TestPractice::new().await;
    let doctor = practice.doctor("Dr. Weber").await;
    practice.practice_hours(0, "08:00", "16:00").await;
    practice.doctor_hours(&doctor, 0, "10:00", "12:00").await;

    let response = practice
        .suggestions
        .suggest_appointment_slots(&practice.assistant, suggest_query(doctor.id, 30, 1))
        .await
        .expect("suggestions");

    assert_eq!(response.primary_suggestions.len(), 1);
    let slot = &response.primary_suggestions[0];
    // the scan starts where practice and doctor windows intersect
    assert_eq!(slot.start_time, practice.local(MONDAY, "10:00"));
    assert_eq!(slot.end_time, practice.local(MONDAY, "10:30"));
    assert!(response.fallback_suggestions.is_empty());

    let actions = practice.audit_actions().await;
    assert!(actions.contains(&"appointment_suggest".to_string()));
    assert!(!actions.contains(&"doctor_substitution_suggest".to_string()));
}

#[tokio::test]
async fn test_candidates_align_to_five_minute_grid() {
    let practice = TestPractice::new().await;
    let doctor = practice.doctor("Dr. Weber").await;
    practice.practice_hours(0, "08:00", "16:00").await;
    practice.doctor_hours(&doctor, 0, "09:02", "12:00").await;

    let response = practice
        .suggestions
        .suggest_appointment_slots(&practice.assistant, suggest_query(doctor.id, 30, 1))
        .await
        .expect("suggestions");

    // 09:02 is rounded up to the next 5-minute boundary
    assert_eq!(
        response.primary_suggestions[0].start_time,
        practice.local(MONDAY, "09:05")
    );
}

#[tokio::test]
async fn test_busy_slot_skipped() {
    let practice = TestPractice::new().await;
    let doctor = practice.doctor("Dr. Weber").await;
    practice.practice_hours(0, "09:00", "16:00").await;
    practice.doctor_hours(&doctor, 0, "09:00", "16:00").await;

    practice
        .scheduling
        .plan_appointment(
            &practice.assistant,
            appointment_request(
                1,
                doctor.id,
                practice.local(MONDAY, "09:00"),
                practice.local(MONDAY, "09:30"),
            ),
            None,
        )
        .await
        .expect("busy 09:00-09:30");

    let response = practice
        .suggestions
        .suggest_appointment_slots(&practice.assistant, suggest_query(doctor.id, 30, 1))
        .await
        .expect("suggestions");

    assert_eq!(
        response.primary_suggestions[0].start_time,
        practice.local(MONDAY, "09:30")
    );
}

#[tokio::test]
async fn test_break_blocks_candidates() {
    let practice = TestPractice::new().await;
    let doctor = practice.doctor("Dr. Weber").await;
    practice.practice_hours(0, "09:00", "16:00").await;
    practice.doctor_hours(&doctor, 0, "09:00", "16:00").await;
    practice.doctor_break(None, MONDAY, "09:00", "10:00").await;

    let response = practice
        .suggestions
        .suggest_appointment_slots(&practice.assistant, suggest_query(doctor.id, 30, 1))
        .await
        .expect("suggestions");

    assert_eq!(
        response.primary_suggestions[0].start_time,
        practice.local(MONDAY, "10:00")
    );
}

#[tokio::test]
async fn test_substitution_when_primary_absent() {
    let practice = TestPractice::new().await;
    let primary = practice.doctor("Dr. Weber").await;
    let substitute = practice.doctor("Dr. Huber").await;
    practice.practice_hours(0, "09:00", "17:00").await;
    practice.doctor_hours(&primary, 0, "09:00", "17:00").await;
    practice.doctor_hours(&substitute, 0, "09:00", "17:00").await;
    practice.absence(&primary, MONDAY, MONDAY, "vacation").await;

    let response = practice
        .suggestions
        .suggest_appointment_slots(&practice.assistant, suggest_query(primary.id, 30, 1))
        .await
        .expect("suggestions");

    assert!(response.primary_suggestions.is_empty());
    assert_eq!(response.fallback_suggestions.len(), 1);
    let fallback = &response.fallback_suggestions[0];
    assert_eq!(fallback.doctor.id, substitute.id);
    assert_eq!(
        fallback.suggestions[0].start_time,
        practice.local(MONDAY, "09:00")
    );
    assert_eq!(
        fallback.suggestions[0].end_time,
        practice.local(MONDAY, "09:30")
    );

    let actions = practice.audit_actions().await;
    assert!(actions.contains(&"appointment_suggest".to_string()));
    assert!(actions.contains(&"doctor_substitution_suggest".to_string()));
}

#[tokio::test]
async fn test_fallbacks_sorted_by_first_slot() {
    let practice = TestPractice::new().await;
    let primary = practice.doctor("Dr. Weber").await;
    let late_sub = practice.doctor("Dr. Early-Booked").await;
    let early_sub = practice.doctor("Dr. Free").await;
    practice.practice_hours(0, "09:00", "17:00").await;
    practice.doctor_hours(&primary, 0, "09:00", "17:00").await;
    practice.doctor_hours(&late_sub, 0, "09:00", "17:00").await;
    practice.doctor_hours(&early_sub, 0, "09:00", "17:00").await;
    practice.absence(&primary, MONDAY, MONDAY, "congress").await;

    // the first substitute is busy until 10:00
    practice
        .scheduling
        .plan_appointment(
            &practice.assistant,
            appointment_request(
                1,
                late_sub.id,
                practice.local(MONDAY, "09:00"),
                practice.local(MONDAY, "10:00"),
            ),
            None,
        )
        .await
        .expect("block the first substitute");

    let response = practice
        .suggestions
        .suggest_appointment_slots(&practice.assistant, suggest_query(primary.id, 30, 1))
        .await
        .expect("suggestions");

    assert_eq!(response.fallback_suggestions.len(), 2);
    // groups come sorted by their first slot's start, not by doctor id
    assert_eq!(response.fallback_suggestions[0].doctor.id, early_sub.id);
    assert_eq!(response.fallback_suggestions[1].doctor.id, late_sub.id);
}

#[tokio::test]
async fn test_resource_aware_suggestion() {
    let practice = TestPractice::new().await;
    let doctor_a = practice.doctor("Dr. Weber").await;
    let doctor_b = practice.doctor("Dr. Huber").await;
    let room = practice.room("Treatment 1").await;
    practice.practice_hours(0, "09:00", "16:00").await;
    practice.doctor_hours(&doctor_a, 0, "09:00", "16:00").await;
    practice.doctor_hours(&doctor_b, 0, "10:00", "16:00").await;

    // doctor A occupies the room 10:00-10:30
    let mut request = appointment_request(
        1,
        doctor_a.id,
        practice.local(MONDAY, "10:00"),
        practice.local(MONDAY, "10:30"),
    );
    request.resource_ids = Some(vec![room.id]);
    practice
        .scheduling
        .plan_appointment(&practice.assistant, request, None)
        .await
        .expect("room booked 10:00-10:30");

    // doctor B asks for a slot with the same room
    let mut query = suggest_query(doctor_b.id, 30, 1);
    query.resource_ids = Some(vec![room.id]);
    let response = practice
        .suggestions
        .suggest_appointment_slots(&practice.assistant, query)
        .await
        .expect("suggestions");

    let slot = &response.primary_suggestions[0];
    assert_eq!(slot.start_time, practice.local(MONDAY, "10:30"));
    assert_eq!(slot.end_time, practice.local(MONDAY, "11:00"));
    assert_eq!(slot.resource_ids, vec![room.id]);
}

#[tokio::test]
async fn test_duration_from_type_default() {
    let practice = TestPractice::new().await;
    let doctor = practice.doctor("Dr. Weber").await;
    let appointment_type = practice.appointment_type("checkup", Some(45)).await;
    practice.practice_hours(0, "09:00", "16:00").await;
    practice.doctor_hours(&doctor, 0, "09:00", "16:00").await;

    let query = SuggestQuery {
        doctor_id: doctor.id,
        start_date: d(MONDAY),
        duration_minutes: None,
        type_id: Some(appointment_type.id),
        resource_ids: None,
        limit: 1,
        now: None,
    };
    let response = practice
        .suggestions
        .suggest_appointment_slots(&practice.assistant, query)
        .await
        .expect("suggestions");

    let slot = &response.primary_suggestions[0];
    assert_eq!(slot.end_time - slot.start_time, chrono::Duration::minutes(45));
    assert_eq!(
        slot.appointment_type.as_ref().map(|t| t.id),
        Some(appointment_type.id)
    );

    // without a type, the duration is mandatory
    let query = SuggestQuery {
        doctor_id: doctor.id,
        start_date: d(MONDAY),
        duration_minutes: None,
        type_id: None,
        resource_ids: None,
        limit: 1,
        now: None,
    };
    let err = practice
        .suggestions
        .suggest_appointment_slots(&practice.assistant, query)
        .await
        .expect_err("duration required");
    assert!(matches!(err, SchedulingError::InvalidData { .. }));
}

#[tokio::test]
async fn test_suggestions_are_deterministic() {
    let practice = TestPractice::new().await;
    let doctor = practice.doctor("Dr. Weber").await;
    practice.practice_hours(0, "09:00", "16:00").await;
    practice.practice_hours(0, "09:00", "12:00").await;
    practice.doctor_hours(&doctor, 0, "09:00", "16:00").await;

    let now = practice.local("2026-03-01", "12:00");
    let query = || SuggestQuery {
        doctor_id: doctor.id,
        start_date: d(MONDAY),
        duration_minutes: Some(30),
        type_id: None,
        resource_ids: None,
        limit: 3,
        now: Some(now),
    };

    let first = practice
        .suggestions
        .suggest_appointment_slots(&practice.assistant, query())
        .await
        .expect("first run");
    let second = practice
        .suggestions
        .suggest_appointment_slots(&practice.assistant, query())
        .await
        .expect("second run");

    let starts = |response: &praxi_core::models::SuggestionResponse| {
        response
            .primary_suggestions
            .iter()
            .map(|s| s.start_time)
            .collect::<Vec<_>>()
    };
    assert_eq!(starts(&first), starts(&second));
}

#[tokio::test]
async fn test_doctor_requests_suggestions_for_self_only() {
    let practice = TestPractice::new().await;
    let doctor_a = practice.doctor("Dr. Weber").await;
    let doctor_b = practice.doctor("Dr. Huber").await;
    practice.practice_hours(0, "09:00", "16:00").await;
    practice.doctor_hours(&doctor_a, 0, "09:00", "16:00").await;
    practice.doctor_hours(&doctor_b, 0, "09:00", "16:00").await;

    practice
        .suggestions
        .suggest_appointment_slots(&doctor_a, suggest_query(doctor_a.id, 30, 1))
        .await
        .expect("own suggestions are allowed");

    let err = practice
        .suggestions
        .suggest_appointment_slots(&doctor_a, suggest_query(doctor_b.id, 30, 1))
        .await
        .expect_err("suggestions for colleagues are not");
    assert!(matches!(err, SchedulingError::NotAuthorized { .. }));
}

#[tokio::test]
async fn test_operation_suggestions_avoid_conflicts() {
    let practice = TestPractice::new().await;
    let surgeon = practice.doctor("Dr. Weber").await;
    let room = practice.room("OP 1").await;
    let op_type = practice.operation_type("arthroscopy", 0, 60, 0).await;
    practice.practice_hours(0, "08:00", "12:00").await;
    practice.doctor_hours(&surgeon, 0, "08:00", "12:00").await;

    // the room is taken 08:00-09:00
    practice
        .scheduling
        .plan_operation(
            &practice.assistant,
            operation_request(
                1,
                surgeon.id,
                room.id,
                op_type.id,
                practice.local(MONDAY, "08:00"),
            ),
            None,
        )
        .await
        .expect("existing operation");

    let query = OperationSuggestQuery {
        primary_surgeon_id: surgeon.id,
        assistant_id: None,
        anesthesist_id: None,
        op_type_id: op_type.id,
        op_room_id: room.id,
        op_device_ids: None,
        start_date: d(MONDAY),
        limit: 1,
        now: Some(practice.local("2026-03-01", "12:00")),
    };
    let suggestions = practice
        .suggestions
        .suggest_operation_slots(&practice.assistant, query)
        .await
        .expect("operation suggestions");

    assert_eq!(suggestions.len(), 1);
    // the surgeon is busy until 09:00, so the first free hour starts there
    assert_eq!(suggestions[0].start_time, practice.local(MONDAY, "09:00"));
    assert_eq!(suggestions[0].end_time, practice.local(MONDAY, "10:00"));
    assert_eq!(suggestions[0].op_room_id, room.id);

    let actions = practice.audit_actions().await;
    assert!(actions.contains(&"operation_suggest".to_string()));
}
