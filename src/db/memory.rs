/*!
 * In-Memory Store
 *
 * Implements `SchedulingStore` over plain maps behind a single lock.
 * Used by tests and local development; the single writer lock makes
 * concurrent admissions serializable, matching the isolation contract a
 * SQL backend must provide.
 *
 * Identifier sequences are monotonic per entity kind.
 */

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::models::{
    Appointment, AppointmentPatch, AppointmentType, AuditEvent, Clinician, DoctorAbsence,
    DoctorBreak, DoctorHours, FlowStatus, Id, NewAppointment, NewAppointmentType, NewClinician,
    NewDoctorBreak, NewDoctorHours, NewOperation, NewOperationType, NewPatientFlow,
    NewPracticeHours, NewResource, NewAuditEvent, Operation, OperationPatch, OperationStatus,
    OperationType, PatientFlow, PracticeHours, Resource,
};
use crate::utils::time::overlaps;

use super::{DeviceBooking, ResourceBooking, SchedulingStore, StoreError, StoreResult};

/// In-memory scheduling store.
#[derive(Clone, Default)]
pub struct MemoryStore {
    data: Arc<RwLock<StoreData>>,
}

#[derive(Default)]
struct StoreData {
    clinicians: HashMap<Id, Clinician>,
    appointment_types: HashMap<Id, AppointmentType>,
    operation_types: HashMap<Id, OperationType>,
    resources: HashMap<Id, Resource>,
    practice_hours: HashMap<Id, PracticeHours>,
    doctor_hours: HashMap<Id, DoctorHours>,
    absences: HashMap<Id, DoctorAbsence>,
    breaks: HashMap<Id, DoctorBreak>,
    appointments: HashMap<Id, Appointment>,
    /// Unique (appointment, resource) pairs.
    appointment_resources: BTreeSet<(Id, Id)>,
    operations: HashMap<Id, Operation>,
    /// Unique (operation, device) pairs.
    operation_devices: BTreeSet<(Id, Id)>,
    flows: HashMap<Id, PatientFlow>,
    audit: Vec<AuditEvent>,
    counters: Counters,
}

#[derive(Default)]
struct Counters {
    clinician: Id,
    appointment_type: Id,
    operation_type: Id,
    resource: Id,
    practice_hours: Id,
    doctor_hours: Id,
    absence: Id,
    break_: Id,
    appointment: Id,
    operation: Id,
    flow: Id,
    audit: Id,
}

fn next_id(counter: &mut Id) -> Id {
    *counter += 1;
    *counter
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, StoreData>> {
        self.data
            .read()
            .map_err(|_| StoreError::Backend("store lock poisoned".into()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, StoreData>> {
        self.data
            .write()
            .map_err(|_| StoreError::Backend("store lock poisoned".into()))
    }
}

#[async_trait]
impl SchedulingStore for MemoryStore {
    // ==================== Clinicians ====================

    async fn clinician(&self, id: Id) -> StoreResult<Option<Clinician>> {
        Ok(self.read()?.clinicians.get(&id).cloned())
    }

    async fn active_doctors(&self, exclude: Option<Id>) -> StoreResult<Vec<Clinician>> {
        let data = self.read()?;
        let mut doctors: Vec<Clinician> = data
            .clinicians
            .values()
            .filter(|c| c.active && c.is_doctor() && Some(c.id) != exclude)
            .cloned()
            .collect();
        doctors.sort_by_key(|c| c.id);
        Ok(doctors)
    }

    async fn create_clinician(&self, new: NewClinician) -> StoreResult<Clinician> {
        let mut data = self.write()?;
        let id = next_id(&mut data.counters.clinician);
        let clinician = Clinician {
            id,
            display_name: new.display_name,
            role: new.role,
            active: new.active,
            color: new.color,
        };
        data.clinicians.insert(id, clinician.clone());
        Ok(clinician)
    }

    // ==================== Catalog ====================

    async fn appointment_type(&self, id: Id) -> StoreResult<Option<AppointmentType>> {
        Ok(self.read()?.appointment_types.get(&id).cloned())
    }

    async fn appointment_types(&self) -> StoreResult<Vec<AppointmentType>> {
        let data = self.read()?;
        let mut types: Vec<AppointmentType> = data.appointment_types.values().cloned().collect();
        types.sort_by(|a, b| (a.name.clone(), a.id).cmp(&(b.name.clone(), b.id)));
        Ok(types)
    }

    async fn create_appointment_type(
        &self,
        new: NewAppointmentType,
    ) -> StoreResult<AppointmentType> {
        let mut data = self.write()?;
        let id = next_id(&mut data.counters.appointment_type);
        let appointment_type = AppointmentType {
            id,
            name: new.name,
            color: new.color,
            duration_minutes: new.duration_minutes,
            active: new.active,
        };
        data.appointment_types.insert(id, appointment_type.clone());
        Ok(appointment_type)
    }

    async fn set_appointment_type_active(
        &self,
        id: Id,
        active: bool,
    ) -> StoreResult<AppointmentType> {
        let mut data = self.write()?;
        let appointment_type = data
            .appointment_types
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("appointment type {id}")))?;
        appointment_type.active = active;
        Ok(appointment_type.clone())
    }

    async fn operation_type(&self, id: Id) -> StoreResult<Option<OperationType>> {
        Ok(self.read()?.operation_types.get(&id).cloned())
    }

    async fn operation_types(&self) -> StoreResult<Vec<OperationType>> {
        let data = self.read()?;
        let mut types: Vec<OperationType> = data.operation_types.values().cloned().collect();
        types.sort_by(|a, b| (a.name.clone(), a.id).cmp(&(b.name.clone(), b.id)));
        Ok(types)
    }

    async fn create_operation_type(&self, new: NewOperationType) -> StoreResult<OperationType> {
        let mut data = self.write()?;
        let id = next_id(&mut data.counters.operation_type);
        let operation_type = OperationType {
            id,
            name: new.name,
            prep_minutes: new.prep_minutes,
            op_minutes: new.op_minutes,
            post_minutes: new.post_minutes,
            color: new.color,
            active: new.active,
        };
        data.operation_types.insert(id, operation_type.clone());
        Ok(operation_type)
    }

    async fn set_operation_type_active(&self, id: Id, active: bool) -> StoreResult<OperationType> {
        let mut data = self.write()?;
        let operation_type = data
            .operation_types
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("operation type {id}")))?;
        operation_type.active = active;
        Ok(operation_type.clone())
    }

    async fn resource(&self, id: Id) -> StoreResult<Option<Resource>> {
        Ok(self.read()?.resources.get(&id).cloned())
    }

    async fn resources_by_ids(&self, ids: &[Id]) -> StoreResult<Vec<Resource>> {
        let data = self.read()?;
        let mut resources: Vec<Resource> = ids
            .iter()
            .filter_map(|id| data.resources.get(id).cloned())
            .collect();
        resources.sort_by_key(|r| r.id);
        resources.dedup_by_key(|r| r.id);
        Ok(resources)
    }

    async fn active_resources(&self) -> StoreResult<Vec<Resource>> {
        let data = self.read()?;
        let mut resources: Vec<Resource> =
            data.resources.values().filter(|r| r.active).cloned().collect();
        resources.sort_by(|a, b| {
            (a.kind.as_str(), a.name.clone(), a.id).cmp(&(b.kind.as_str(), b.name.clone(), b.id))
        });
        Ok(resources)
    }

    async fn create_resource(&self, new: NewResource) -> StoreResult<Resource> {
        let mut data = self.write()?;
        let id = next_id(&mut data.counters.resource);
        let resource = Resource {
            id,
            name: new.name,
            kind: new.kind,
            color: new.color,
            active: new.active,
        };
        data.resources.insert(id, resource.clone());
        Ok(resource)
    }

    async fn set_resource_active(&self, id: Id, active: bool) -> StoreResult<Resource> {
        let mut data = self.write()?;
        let resource = data
            .resources
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("resource {id}")))?;
        resource.active = active;
        Ok(resource.clone())
    }

    // ==================== Hours ====================

    async fn practice_hours_on(&self, weekday: u8) -> StoreResult<Vec<PracticeHours>> {
        let data = self.read()?;
        let mut hours: Vec<PracticeHours> = data
            .practice_hours
            .values()
            .filter(|h| h.active && h.weekday == weekday)
            .cloned()
            .collect();
        hours.sort_by_key(|h| (h.start_time, h.id));
        Ok(hours)
    }

    async fn practice_hours(&self) -> StoreResult<Vec<PracticeHours>> {
        let data = self.read()?;
        let mut hours: Vec<PracticeHours> = data.practice_hours.values().cloned().collect();
        hours.sort_by_key(|h| (h.weekday, h.start_time, h.id));
        Ok(hours)
    }

    async fn create_practice_hours(&self, new: NewPracticeHours) -> StoreResult<PracticeHours> {
        let mut data = self.write()?;
        let id = next_id(&mut data.counters.practice_hours);
        let hours = PracticeHours {
            id,
            weekday: new.weekday,
            start_time: new.start_time,
            end_time: new.end_time,
            active: new.active,
        };
        data.practice_hours.insert(id, hours.clone());
        Ok(hours)
    }

    async fn set_practice_hours_active(&self, id: Id, active: bool) -> StoreResult<PracticeHours> {
        let mut data = self.write()?;
        let hours = data
            .practice_hours
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("practice hours {id}")))?;
        hours.active = active;
        Ok(hours.clone())
    }

    async fn doctor_hours_on(&self, doctor_id: Id, weekday: u8) -> StoreResult<Vec<DoctorHours>> {
        let data = self.read()?;
        let mut hours: Vec<DoctorHours> = data
            .doctor_hours
            .values()
            .filter(|h| h.active && h.doctor_id == doctor_id && h.weekday == weekday)
            .cloned()
            .collect();
        hours.sort_by_key(|h| (h.start_time, h.id));
        Ok(hours)
    }

    async fn doctor_hours_for(&self, doctor_id: Id) -> StoreResult<Vec<DoctorHours>> {
        let data = self.read()?;
        let mut hours: Vec<DoctorHours> = data
            .doctor_hours
            .values()
            .filter(|h| h.doctor_id == doctor_id)
            .cloned()
            .collect();
        hours.sort_by_key(|h| (h.weekday, h.start_time, h.id));
        Ok(hours)
    }

    async fn create_doctor_hours(&self, new: NewDoctorHours) -> StoreResult<DoctorHours> {
        let mut data = self.write()?;
        let duplicate = data.doctor_hours.values().any(|h| {
            h.doctor_id == new.doctor_id
                && h.weekday == new.weekday
                && h.start_time == new.start_time
                && h.end_time == new.end_time
                && h.active == new.active
        });
        if duplicate {
            return Err(StoreError::Duplicate(format!(
                "doctor hours slot for doctor {} on weekday {}",
                new.doctor_id, new.weekday
            )));
        }
        let id = next_id(&mut data.counters.doctor_hours);
        let hours = DoctorHours {
            id,
            doctor_id: new.doctor_id,
            weekday: new.weekday,
            start_time: new.start_time,
            end_time: new.end_time,
            active: new.active,
        };
        data.doctor_hours.insert(id, hours.clone());
        Ok(hours)
    }

    async fn set_doctor_hours_active(&self, id: Id, active: bool) -> StoreResult<DoctorHours> {
        let mut data = self.write()?;
        let hours = data
            .doctor_hours
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("doctor hours {id}")))?;
        hours.active = active;
        Ok(hours.clone())
    }

    // ==================== Absences & breaks ====================

    async fn absence(&self, id: Id) -> StoreResult<Option<DoctorAbsence>> {
        Ok(self.read()?.absences.get(&id).cloned())
    }

    async fn first_absence_overlapping(
        &self,
        doctor_id: Id,
        start: NaiveDate,
        end: NaiveDate,
    ) -> StoreResult<Option<DoctorAbsence>> {
        let data = self.read()?;
        let mut matches: Vec<&DoctorAbsence> = data
            .absences
            .values()
            .filter(|a| {
                a.active && a.doctor_id == doctor_id && a.start_date <= end && a.end_date >= start
            })
            .collect();
        matches.sort_by_key(|a| (a.start_date, a.id));
        Ok(matches.first().map(|a| (*a).clone()))
    }

    async fn absences_in_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> StoreResult<Vec<DoctorAbsence>> {
        let data = self.read()?;
        let mut matches: Vec<DoctorAbsence> = data
            .absences
            .values()
            .filter(|a| a.active && a.start_date <= end && a.end_date >= start)
            .cloned()
            .collect();
        matches.sort_by_key(|a| (a.start_date, a.id));
        Ok(matches)
    }

    async fn active_vacation_absences(
        &self,
        doctor_id: Id,
        exclude: Option<Id>,
    ) -> StoreResult<Vec<DoctorAbsence>> {
        let data = self.read()?;
        let mut matches: Vec<DoctorAbsence> = data
            .absences
            .values()
            .filter(|a| {
                a.active && a.doctor_id == doctor_id && a.is_vacation() && Some(a.id) != exclude
            })
            .cloned()
            .collect();
        matches.sort_by_key(|a| (a.start_date, a.id));
        Ok(matches)
    }

    async fn create_absence(&self, absence: DoctorAbsence) -> StoreResult<DoctorAbsence> {
        let mut data = self.write()?;
        let id = next_id(&mut data.counters.absence);
        let absence = DoctorAbsence { id, ..absence };
        data.absences.insert(id, absence.clone());
        Ok(absence)
    }

    async fn set_absence_active(&self, id: Id, active: bool) -> StoreResult<DoctorAbsence> {
        let mut data = self.write()?;
        let absence = data
            .absences
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("absence {id}")))?;
        absence.active = active;
        Ok(absence.clone())
    }

    async fn doctor_break(&self, id: Id) -> StoreResult<Option<DoctorBreak>> {
        Ok(self.read()?.breaks.get(&id).cloned())
    }

    async fn breaks_for_doctor(
        &self,
        doctor_id: Id,
        start: NaiveDate,
        end: NaiveDate,
    ) -> StoreResult<Vec<DoctorBreak>> {
        let data = self.read()?;
        let mut matches: Vec<DoctorBreak> = data
            .breaks
            .values()
            .filter(|b| {
                b.active && b.date >= start && b.date <= end && b.applies_to(doctor_id)
            })
            .cloned()
            .collect();
        matches.sort_by_key(|b| (b.date, b.start_time, b.id));
        Ok(matches)
    }

    async fn breaks_in_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> StoreResult<Vec<DoctorBreak>> {
        let data = self.read()?;
        let mut matches: Vec<DoctorBreak> = data
            .breaks
            .values()
            .filter(|b| b.active && b.date >= start && b.date <= end)
            .cloned()
            .collect();
        matches.sort_by_key(|b| (b.date, b.start_time, b.id));
        Ok(matches)
    }

    async fn create_break(&self, new: NewDoctorBreak) -> StoreResult<DoctorBreak> {
        let mut data = self.write()?;
        let id = next_id(&mut data.counters.break_);
        let break_row = DoctorBreak {
            id,
            doctor_id: new.doctor_id,
            date: new.date,
            start_time: new.start_time,
            end_time: new.end_time,
            reason: new.reason,
            active: new.active,
        };
        data.breaks.insert(id, break_row.clone());
        Ok(break_row)
    }

    async fn set_break_active(&self, id: Id, active: bool) -> StoreResult<DoctorBreak> {
        let mut data = self.write()?;
        let break_row = data
            .breaks
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("break {id}")))?;
        break_row.active = active;
        Ok(break_row.clone())
    }

    // ==================== Appointments ====================

    async fn appointment(&self, id: Id) -> StoreResult<Option<Appointment>> {
        Ok(self.read()?.appointments.get(&id).cloned())
    }

    async fn appointment_resource_ids(&self, appointment_id: Id) -> StoreResult<Vec<Id>> {
        let data = self.read()?;
        Ok(data
            .appointment_resources
            .iter()
            .filter(|(appt, _)| *appt == appointment_id)
            .map(|(_, resource)| *resource)
            .collect())
    }

    async fn appointments_in_range(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        doctor_id: Option<Id>,
    ) -> StoreResult<Vec<Appointment>> {
        let data = self.read()?;
        let mut matches: Vec<Appointment> = data
            .appointments
            .values()
            .filter(|a| {
                start.map(|s| a.end_time > s).unwrap_or(true)
                    && end.map(|e| a.start_time < e).unwrap_or(true)
                    && doctor_id.map(|d| a.doctor_id == d).unwrap_or(true)
            })
            .cloned()
            .collect();
        matches.sort_by_key(|a| (a.start_time, a.id));
        Ok(matches)
    }

    async fn appointments_for_doctor_overlapping(
        &self,
        doctor_id: Id,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude: Option<Id>,
    ) -> StoreResult<Vec<Appointment>> {
        let data = self.read()?;
        let mut matches: Vec<Appointment> = data
            .appointments
            .values()
            .filter(|a| {
                a.doctor_id == doctor_id
                    && Some(a.id) != exclude
                    && overlaps(a.start_time, a.end_time, start, end)
            })
            .cloned()
            .collect();
        matches.sort_by_key(|a| (a.start_time, a.id));
        Ok(matches)
    }

    async fn appointments_for_patient_overlapping(
        &self,
        patient_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude: Option<Id>,
    ) -> StoreResult<Vec<Appointment>> {
        let data = self.read()?;
        let mut matches: Vec<Appointment> = data
            .appointments
            .values()
            .filter(|a| {
                a.patient_id == patient_id
                    && Some(a.id) != exclude
                    && overlaps(a.start_time, a.end_time, start, end)
            })
            .cloned()
            .collect();
        matches.sort_by_key(|a| (a.start_time, a.id));
        Ok(matches)
    }

    async fn resource_bookings_overlapping(
        &self,
        resource_ids: &[Id],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude_appointment: Option<Id>,
    ) -> StoreResult<Vec<ResourceBooking>> {
        let data = self.read()?;
        let mut bookings = Vec::new();
        for (appointment_id, resource_id) in data.appointment_resources.iter() {
            if !resource_ids.contains(resource_id) || Some(*appointment_id) == exclude_appointment {
                continue;
            }
            if let Some(appointment) = data.appointments.get(appointment_id) {
                if overlaps(appointment.start_time, appointment.end_time, start, end) {
                    bookings.push(ResourceBooking {
                        resource_id: *resource_id,
                        appointment: appointment.clone(),
                    });
                }
            }
        }
        bookings.sort_by_key(|b| {
            (
                b.appointment.start_time,
                b.appointment.id,
                b.resource_id,
            )
        });
        Ok(bookings)
    }

    async fn create_appointment(&self, new: NewAppointment) -> StoreResult<Appointment> {
        let mut data = self.write()?;
        let now = Utc::now();
        let id = next_id(&mut data.counters.appointment);
        let appointment = Appointment {
            id,
            patient_id: new.patient_id,
            doctor_id: new.doctor_id,
            type_id: new.type_id,
            start_time: new.start_time,
            end_time: new.end_time,
            status: new.status,
            is_no_show: false,
            notes: new.notes,
            created_at: now,
            updated_at: now,
        };
        data.appointments.insert(id, appointment.clone());
        for resource_id in new.resource_ids {
            // BTreeSet insert ignores duplicate pairs
            data.appointment_resources.insert((id, resource_id));
        }
        Ok(appointment)
    }

    async fn update_appointment(
        &self,
        id: Id,
        patch: AppointmentPatch,
    ) -> StoreResult<Appointment> {
        let mut data = self.write()?;
        let appointment = {
            let appointment = data
                .appointments
                .get_mut(&id)
                .ok_or_else(|| StoreError::NotFound(format!("appointment {id}")))?;
            if let Some(start_time) = patch.start_time {
                appointment.start_time = start_time;
            }
            if let Some(end_time) = patch.end_time {
                appointment.end_time = end_time;
            }
            if let Some(type_id) = patch.type_id {
                appointment.type_id = Some(type_id);
            }
            if let Some(status) = patch.status {
                appointment.status = status;
            }
            if let Some(notes) = patch.notes {
                appointment.notes = Some(notes);
            }
            appointment.updated_at = Utc::now();
            appointment.clone()
        };
        if let Some(resource_ids) = patch.resource_ids {
            data.appointment_resources.retain(|(appt, _)| *appt != id);
            for resource_id in resource_ids {
                data.appointment_resources.insert((id, resource_id));
            }
        }
        Ok(appointment)
    }

    async fn mark_appointment_no_show(&self, id: Id) -> StoreResult<Appointment> {
        let mut data = self.write()?;
        let appointment = data
            .appointments
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("appointment {id}")))?;
        if !appointment.is_no_show {
            appointment.is_no_show = true;
            appointment.updated_at = Utc::now();
        }
        Ok(appointment.clone())
    }

    async fn delete_appointment(&self, id: Id) -> StoreResult<()> {
        let mut data = self.write()?;
        data.appointments
            .remove(&id)
            .ok_or_else(|| StoreError::NotFound(format!("appointment {id}")))?;
        data.appointment_resources.retain(|(appt, _)| *appt != id);
        data.flows.retain(|_, flow| flow.appointment_id != Some(id));
        Ok(())
    }

    // ==================== Operations ====================

    async fn operation(&self, id: Id) -> StoreResult<Option<Operation>> {
        Ok(self.read()?.operations.get(&id).cloned())
    }

    async fn operation_device_ids(&self, operation_id: Id) -> StoreResult<Vec<Id>> {
        let data = self.read()?;
        Ok(data
            .operation_devices
            .iter()
            .filter(|(op, _)| *op == operation_id)
            .map(|(_, device)| *device)
            .collect())
    }

    async fn operations_in_range(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> StoreResult<Vec<Operation>> {
        let data = self.read()?;
        let mut matches: Vec<Operation> = data
            .operations
            .values()
            .filter(|o| {
                start.map(|s| o.end_time > s).unwrap_or(true)
                    && end.map(|e| o.start_time < e).unwrap_or(true)
            })
            .cloned()
            .collect();
        matches.sort_by_key(|o| (o.start_time, o.id));
        Ok(matches)
    }

    async fn operations_for_doctor_overlapping(
        &self,
        doctor_id: Id,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude: Option<Id>,
    ) -> StoreResult<Vec<Operation>> {
        let data = self.read()?;
        let mut matches: Vec<Operation> = data
            .operations
            .values()
            .filter(|o| {
                o.involves(doctor_id)
                    && Some(o.id) != exclude
                    && overlaps(o.start_time, o.end_time, start, end)
            })
            .cloned()
            .collect();
        matches.sort_by_key(|o| (o.start_time, o.id));
        Ok(matches)
    }

    async fn operations_for_patient_overlapping(
        &self,
        patient_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude: Option<Id>,
    ) -> StoreResult<Vec<Operation>> {
        let data = self.read()?;
        let mut matches: Vec<Operation> = data
            .operations
            .values()
            .filter(|o| {
                o.patient_id == patient_id
                    && Some(o.id) != exclude
                    && overlaps(o.start_time, o.end_time, start, end)
            })
            .cloned()
            .collect();
        matches.sort_by_key(|o| (o.start_time, o.id));
        Ok(matches)
    }

    async fn operations_using_rooms_overlapping(
        &self,
        room_ids: &[Id],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude: Option<Id>,
    ) -> StoreResult<Vec<Operation>> {
        let data = self.read()?;
        let mut matches: Vec<Operation> = data
            .operations
            .values()
            .filter(|o| {
                room_ids.contains(&o.op_room_id)
                    && Some(o.id) != exclude
                    && overlaps(o.start_time, o.end_time, start, end)
            })
            .cloned()
            .collect();
        matches.sort_by_key(|o| (o.start_time, o.id));
        Ok(matches)
    }

    async fn device_bookings_overlapping(
        &self,
        device_ids: &[Id],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude_operation: Option<Id>,
    ) -> StoreResult<Vec<DeviceBooking>> {
        let data = self.read()?;
        let mut bookings = Vec::new();
        for (operation_id, resource_id) in data.operation_devices.iter() {
            if !device_ids.contains(resource_id) || Some(*operation_id) == exclude_operation {
                continue;
            }
            if let Some(operation) = data.operations.get(operation_id) {
                if overlaps(operation.start_time, operation.end_time, start, end) {
                    bookings.push(DeviceBooking {
                        resource_id: *resource_id,
                        operation: operation.clone(),
                    });
                }
            }
        }
        bookings.sort_by_key(|b| (b.operation.start_time, b.operation.id, b.resource_id));
        Ok(bookings)
    }

    async fn running_operations(&self, now: DateTime<Utc>) -> StoreResult<Vec<Operation>> {
        let data = self.read()?;
        let mut matches: Vec<Operation> = data
            .operations
            .values()
            .filter(|o| o.status == OperationStatus::Running && o.start_time <= now)
            .cloned()
            .collect();
        matches.sort_by_key(|o| (o.start_time, o.id));
        Ok(matches)
    }

    async fn create_operation(&self, new: NewOperation) -> StoreResult<Operation> {
        let mut data = self.write()?;
        let now = Utc::now();
        let id = next_id(&mut data.counters.operation);
        let operation = Operation {
            id,
            patient_id: new.patient_id,
            primary_surgeon_id: new.primary_surgeon_id,
            assistant_id: new.assistant_id,
            anesthesist_id: new.anesthesist_id,
            op_room_id: new.op_room_id,
            op_type_id: new.op_type_id,
            start_time: new.start_time,
            end_time: new.end_time,
            status: new.status,
            notes: new.notes,
            created_at: now,
            updated_at: now,
        };
        data.operations.insert(id, operation.clone());
        for device_id in new.device_ids {
            data.operation_devices.insert((id, device_id));
        }
        Ok(operation)
    }

    async fn update_operation(&self, id: Id, patch: OperationPatch) -> StoreResult<Operation> {
        let mut data = self.write()?;
        let operation = {
            let operation = data
                .operations
                .get_mut(&id)
                .ok_or_else(|| StoreError::NotFound(format!("operation {id}")))?;
            if let Some(start_time) = patch.start_time {
                operation.start_time = start_time;
            }
            if let Some(end_time) = patch.end_time {
                operation.end_time = end_time;
            }
            if let Some(op_type_id) = patch.op_type_id {
                operation.op_type_id = op_type_id;
            }
            if let Some(op_room_id) = patch.op_room_id {
                operation.op_room_id = op_room_id;
            }
            if let Some(assistant_id) = patch.assistant_id {
                operation.assistant_id = Some(assistant_id);
            }
            if let Some(anesthesist_id) = patch.anesthesist_id {
                operation.anesthesist_id = Some(anesthesist_id);
            }
            if let Some(notes) = patch.notes {
                operation.notes = Some(notes);
            }
            operation.updated_at = Utc::now();
            operation.clone()
        };
        if let Some(device_ids) = patch.device_ids {
            data.operation_devices.retain(|(op, _)| *op != id);
            for device_id in device_ids {
                data.operation_devices.insert((id, device_id));
            }
        }
        Ok(operation)
    }

    async fn set_operation_status(
        &self,
        id: Id,
        status: OperationStatus,
    ) -> StoreResult<Operation> {
        let mut data = self.write()?;
        let operation = data
            .operations
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("operation {id}")))?;
        operation.status = status;
        operation.updated_at = Utc::now();
        Ok(operation.clone())
    }

    async fn delete_operation(&self, id: Id) -> StoreResult<()> {
        let mut data = self.write()?;
        data.operations
            .remove(&id)
            .ok_or_else(|| StoreError::NotFound(format!("operation {id}")))?;
        data.operation_devices.retain(|(op, _)| *op != id);
        data.flows.retain(|_, flow| flow.operation_id != Some(id));
        Ok(())
    }

    // ==================== Patient flow ====================

    async fn patient_flow(&self, id: Id) -> StoreResult<Option<PatientFlow>> {
        Ok(self.read()?.flows.get(&id).cloned())
    }

    async fn patient_flows(&self) -> StoreResult<Vec<PatientFlow>> {
        let data = self.read()?;
        let mut flows: Vec<PatientFlow> = data.flows.values().cloned().collect();
        flows.sort_by_key(|f| f.id);
        Ok(flows)
    }

    async fn create_patient_flow(&self, new: NewPatientFlow) -> StoreResult<PatientFlow> {
        let mut data = self.write()?;
        let id = next_id(&mut data.counters.flow);
        let flow = PatientFlow {
            id,
            appointment_id: new.appointment_id,
            operation_id: new.operation_id,
            status: new.status,
            arrival_time: new.arrival_time,
            status_changed_at: Utc::now(),
            notes: new.notes,
        };
        data.flows.insert(id, flow.clone());
        Ok(flow)
    }

    async fn set_flow_status(
        &self,
        id: Id,
        status: FlowStatus,
        now: DateTime<Utc>,
    ) -> StoreResult<PatientFlow> {
        let mut data = self.write()?;
        let flow = data
            .flows
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("patient flow {id}")))?;
        flow.status = status;
        flow.status_changed_at = now;
        Ok(flow.clone())
    }

    // ==================== Audit ====================

    async fn append_audit(&self, event: NewAuditEvent) -> StoreResult<AuditEvent> {
        let mut data = self.write()?;
        let id = next_id(&mut data.counters.audit);
        let event = AuditEvent {
            id,
            timestamp: Utc::now(),
            actor_id: event.actor_id,
            role_name: event.role_name,
            action: event.action,
            patient_id: event.patient_id,
            meta: event.meta,
        };
        data.audit.push(event.clone());
        Ok(event)
    }

    async fn audit_events(&self) -> StoreResult<Vec<AuditEvent>> {
        Ok(self.read()?.audit.clone())
    }
}
