/*!
 * Conflict Detector
 *
 * Pairwise overlap checks across doctors, rooms, devices and patients,
 * walking both booking tables (appointments and operations). All
 * intervals are half-open; touching edges never conflict.
 *
 * Determinism: results are sorted by `(model, id)`; the same model id may
 * appear once per conflict kind. Exclusion arguments suppress
 * self-comparison during updates.
 */

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::db::SchedulingStore;
use crate::models::{Id, Resource};
use crate::utils::errors::{BookingModel, Conflict, ConflictKind, Result};

/// Conflict detection service
#[derive(Clone)]
pub struct ConflictDetector {
    store: Arc<dyn SchedulingStore>,
}

fn sort_conflicts(conflicts: &mut Vec<Conflict>) {
    conflicts.sort_by_key(|c| (c.model, c.id, c.kind, c.resource_id, c.doctor_id));
}

impl ConflictDetector {
    /// Create a new conflict detector
    pub fn new(store: Arc<dyn SchedulingStore>) -> Self {
        Self { store }
    }

    /// Conflicts for a proposed appointment: the doctor's other
    /// appointments and operations, plus bookings of every requested
    /// resource by appointments and operations.
    pub async fn appointment_conflicts(
        &self,
        doctor_id: Id,
        resources: &[Resource],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude_appointment: Option<Id>,
    ) -> Result<Vec<Conflict>> {
        let mut conflicts = Vec::new();

        // 1. Overlapping appointments of the same doctor
        let doctor_appointments = self
            .store
            .appointments_for_doctor_overlapping(doctor_id, start, end, exclude_appointment)
            .await?;
        for appointment in doctor_appointments {
            conflicts.push(Conflict {
                kind: ConflictKind::DoctorConflict,
                model: BookingModel::Appointment,
                id: appointment.id,
                resource_id: None,
                doctor_id: None,
                message: format!("Doctor has overlapping appointment #{}", appointment.id),
            });
        }

        // 2. Operations where the doctor serves in any team role
        let doctor_operations = self
            .store
            .operations_for_doctor_overlapping(doctor_id, start, end, None)
            .await?;
        for operation in doctor_operations {
            conflicts.push(Conflict {
                kind: ConflictKind::DoctorConflict,
                model: BookingModel::Operation,
                id: operation.id,
                resource_id: None,
                doctor_id: None,
                message: format!("Doctor is involved in operation #{}", operation.id),
            });
        }

        // 3. Resource bookings
        if !resources.is_empty() {
            let all_ids: Vec<Id> = resources.iter().map(|r| r.id).collect();
            let room_ids: Vec<Id> = resources.iter().filter(|r| r.is_room()).map(|r| r.id).collect();
            let device_ids: Vec<Id> =
                resources.iter().filter(|r| r.is_device()).map(|r| r.id).collect();

            let bookings = self
                .store
                .resource_bookings_overlapping(&all_ids, start, end, exclude_appointment)
                .await?;
            for booking in bookings {
                let kind = if room_ids.contains(&booking.resource_id) {
                    ConflictKind::RoomConflict
                } else {
                    ConflictKind::DeviceConflict
                };
                conflicts.push(Conflict {
                    kind,
                    model: BookingModel::Appointment,
                    id: booking.appointment.id,
                    resource_id: Some(booking.resource_id),
                    doctor_id: None,
                    message: format!(
                        "Resource {} is booked by appointment #{}",
                        booking.resource_id, booking.appointment.id
                    ),
                });
            }

            if !room_ids.is_empty() {
                let room_operations = self
                    .store
                    .operations_using_rooms_overlapping(&room_ids, start, end, None)
                    .await?;
                for operation in room_operations {
                    conflicts.push(Conflict {
                        kind: ConflictKind::RoomConflict,
                        model: BookingModel::Operation,
                        id: operation.id,
                        resource_id: Some(operation.op_room_id),
                        doctor_id: None,
                        message: format!("Room is used by operation #{}", operation.id),
                    });
                }
            }

            if !device_ids.is_empty() {
                let device_bookings = self
                    .store
                    .device_bookings_overlapping(&device_ids, start, end, None)
                    .await?;
                for booking in device_bookings {
                    conflicts.push(Conflict {
                        kind: ConflictKind::DeviceConflict,
                        model: BookingModel::Operation,
                        id: booking.operation.id,
                        resource_id: Some(booking.resource_id),
                        doctor_id: None,
                        message: format!("Device is used by operation #{}", booking.operation.id),
                    });
                }
            }
        }

        sort_conflicts(&mut conflicts);
        Ok(conflicts)
    }

    /// Conflicts for a proposed operation: room and devices against both
    /// booking tables, plus every team member's appointments and
    /// operations.
    pub async fn operation_conflicts(
        &self,
        team: &[Id],
        room_id: Id,
        device_ids: &[Id],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude_operation: Option<Id>,
    ) -> Result<Vec<Conflict>> {
        let mut conflicts = Vec::new();

        // 1. Room against other operations
        let room_operations = self
            .store
            .operations_using_rooms_overlapping(&[room_id], start, end, exclude_operation)
            .await?;
        for operation in room_operations {
            conflicts.push(Conflict {
                kind: ConflictKind::RoomConflict,
                model: BookingModel::Operation,
                id: operation.id,
                resource_id: Some(room_id),
                doctor_id: None,
                message: format!("Room is already booked by operation #{}", operation.id),
            });
        }

        // 2. Room against appointments that booked it as a resource
        let room_bookings = self
            .store
            .resource_bookings_overlapping(&[room_id], start, end, None)
            .await?;
        for booking in room_bookings {
            conflicts.push(Conflict {
                kind: ConflictKind::RoomConflict,
                model: BookingModel::Appointment,
                id: booking.appointment.id,
                resource_id: Some(room_id),
                doctor_id: None,
                message: format!("Room is booked by appointment #{}", booking.appointment.id),
            });
        }

        // 3. Devices against operations and appointments
        if !device_ids.is_empty() {
            let device_bookings = self
                .store
                .device_bookings_overlapping(device_ids, start, end, exclude_operation)
                .await?;
            for booking in device_bookings {
                conflicts.push(Conflict {
                    kind: ConflictKind::DeviceConflict,
                    model: BookingModel::Operation,
                    id: booking.operation.id,
                    resource_id: Some(booking.resource_id),
                    doctor_id: None,
                    message: format!(
                        "Device is already used by operation #{}",
                        booking.operation.id
                    ),
                });
            }

            let appointment_bookings = self
                .store
                .resource_bookings_overlapping(device_ids, start, end, None)
                .await?;
            for booking in appointment_bookings {
                conflicts.push(Conflict {
                    kind: ConflictKind::DeviceConflict,
                    model: BookingModel::Appointment,
                    id: booking.appointment.id,
                    resource_id: Some(booking.resource_id),
                    doctor_id: None,
                    message: format!(
                        "Device is booked by appointment #{}",
                        booking.appointment.id
                    ),
                });
            }
        }

        // 4. Every team member's own bookings
        for &doctor_id in team {
            let appointments = self
                .store
                .appointments_for_doctor_overlapping(doctor_id, start, end, None)
                .await?;
            for appointment in appointments {
                conflicts.push(Conflict {
                    kind: ConflictKind::DoctorConflict,
                    model: BookingModel::Appointment,
                    id: appointment.id,
                    resource_id: None,
                    doctor_id: Some(doctor_id),
                    message: format!(
                        "Doctor {} has overlapping appointment #{}",
                        doctor_id, appointment.id
                    ),
                });
            }

            let operations = self
                .store
                .operations_for_doctor_overlapping(doctor_id, start, end, exclude_operation)
                .await?;
            for operation in operations {
                conflicts.push(Conflict {
                    kind: ConflictKind::DoctorConflict,
                    model: BookingModel::Operation,
                    id: operation.id,
                    resource_id: None,
                    doctor_id: Some(doctor_id),
                    message: format!(
                        "Doctor {} is involved in operation #{}",
                        doctor_id, operation.id
                    ),
                });
            }
        }

        sort_conflicts(&mut conflicts);
        Ok(conflicts)
    }

    /// Conflicts of the same patient across both booking tables.
    pub async fn patient_conflicts(
        &self,
        patient_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude_appointment: Option<Id>,
        exclude_operation: Option<Id>,
    ) -> Result<Vec<Conflict>> {
        let mut conflicts = Vec::new();

        let appointments = self
            .store
            .appointments_for_patient_overlapping(patient_id, start, end, exclude_appointment)
            .await?;
        for appointment in appointments {
            conflicts.push(Conflict {
                kind: ConflictKind::PatientConflict,
                model: BookingModel::Appointment,
                id: appointment.id,
                resource_id: None,
                doctor_id: None,
                message: format!(
                    "Patient already has appointment #{} in this time range",
                    appointment.id
                ),
            });
        }

        let operations = self
            .store
            .operations_for_patient_overlapping(patient_id, start, end, exclude_operation)
            .await?;
        for operation in operations {
            conflicts.push(Conflict {
                kind: ConflictKind::PatientConflict,
                model: BookingModel::Operation,
                id: operation.id,
                resource_id: None,
                doctor_id: None,
                message: format!(
                    "Patient already has operation #{} in this time range",
                    operation.id
                ),
            });
        }

        sort_conflicts(&mut conflicts);
        Ok(conflicts)
    }
}

/// Merge conflict lists from several checks back into the canonical
/// `(model, id)` order.
pub fn merge_conflicts(mut conflicts: Vec<Conflict>, more: Vec<Conflict>) -> Vec<Conflict> {
    conflicts.extend(more);
    sort_conflicts(&mut conflicts);
    conflicts
}
