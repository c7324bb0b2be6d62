/*!
 * Roster Service
 *
 * Administration of practice hours, doctor hours, absences and breaks.
 * Absence records get their derived fields (workday count, return date,
 * remaining vacation days) computed here before they are stored; the
 * remaining-days calculation runs on demand against the doctor's other
 * vacation absences of the same calendar year and is never cached
 * across writes.
 */

use std::sync::Arc;

use chrono::Datelike;

use crate::config::CoreConfig;
use crate::db::{SchedulingStore, StoreError};
use crate::models::{
    Clinician, DoctorAbsence, DoctorBreak, DoctorHours, Id, NewDoctorAbsence, NewDoctorBreak,
    NewDoctorHours, NewPracticeHours, PracticeHours,
};
use crate::utils::errors::{Result, SchedulingError};
use crate::utils::permissions;

/// Roster service
#[derive(Clone)]
pub struct RosterService {
    store: Arc<dyn SchedulingStore>,
    config: CoreConfig,
}

impl RosterService {
    /// Create a new roster service
    pub fn new(store: Arc<dyn SchedulingStore>, config: CoreConfig) -> Self {
        Self { store, config }
    }

    // ==================== Practice hours ====================

    pub async fn create_practice_hours(
        &self,
        actor: &Clinician,
        new: NewPracticeHours,
    ) -> Result<PracticeHours> {
        permissions::ensure_practice_hours_write(actor)?;
        validate_weekday(new.weekday)?;
        validate_time_window(new.start_time, new.end_time)?;
        Ok(self.store.create_practice_hours(new).await?)
    }

    pub async fn list_practice_hours(&self, actor: &Clinician) -> Result<Vec<PracticeHours>> {
        permissions::ensure_practice_config_read(actor)?;
        Ok(self.store.practice_hours().await?)
    }

    pub async fn set_practice_hours_active(
        &self,
        actor: &Clinician,
        id: Id,
        active: bool,
    ) -> Result<PracticeHours> {
        permissions::ensure_practice_hours_write(actor)?;
        Ok(self.store.set_practice_hours_active(id, active).await?)
    }

    // ==================== Doctor hours ====================

    pub async fn create_doctor_hours(
        &self,
        actor: &Clinician,
        new: NewDoctorHours,
    ) -> Result<DoctorHours> {
        permissions::ensure_doctor_hours_write(actor)?;
        validate_weekday(new.weekday)?;
        validate_time_window(new.start_time, new.end_time)?;
        self.require_doctor(new.doctor_id).await?;

        match self.store.create_doctor_hours(new).await {
            Ok(hours) => Ok(hours),
            Err(StoreError::Duplicate(_)) => Err(SchedulingError::invalid(
                "doctor_hours",
                "an identical active slot already exists for this doctor",
            )),
            Err(err) => Err(err.into()),
        }
    }

    /// Doctors list only their own hours; schedulers and billing see all.
    pub async fn list_doctor_hours(
        &self,
        actor: &Clinician,
        doctor_id: Id,
    ) -> Result<Vec<DoctorHours>> {
        permissions::ensure_practice_config_read(actor)?;
        if actor.is_doctor() && actor.id != doctor_id {
            return Err(SchedulingError::not_authorized("doctor_hours.read"));
        }
        Ok(self.store.doctor_hours_for(doctor_id).await?)
    }

    pub async fn set_doctor_hours_active(
        &self,
        actor: &Clinician,
        id: Id,
        active: bool,
    ) -> Result<DoctorHours> {
        permissions::ensure_doctor_hours_write(actor)?;
        Ok(self.store.set_doctor_hours_active(id, active).await?)
    }

    // ==================== Absences ====================

    /// Record an absence, computing the derived fields.
    pub async fn create_absence(
        &self,
        actor: &Clinician,
        new: NewDoctorAbsence,
    ) -> Result<DoctorAbsence> {
        permissions::ensure_absence_write(actor, new.doctor_id)?;
        if new.end_date < new.start_date {
            return Err(SchedulingError::invalid(
                "end_date",
                "end_date must not be before start_date",
            ));
        }
        self.require_doctor(new.doctor_id).await?;

        let (workdays_count, return_date) = new.derived_workdays();
        let remaining_vacation = if crate::models::absence::reason_is_vacation(new.reason.as_deref())
        {
            Some(
                self.remaining_vacation_days(new.doctor_id, new.start_date.year(), workdays_count, None)
                    .await?,
            )
        } else {
            None
        };

        let absence = DoctorAbsence {
            id: 0, // assigned by the store
            doctor_id: new.doctor_id,
            start_date: new.start_date,
            end_date: new.end_date,
            reason: new.reason,
            workdays_count,
            return_date,
            remaining_vacation,
            active: new.active,
        };
        Ok(self.store.create_absence(absence).await?)
    }

    pub async fn set_absence_active(
        &self,
        actor: &Clinician,
        id: Id,
        active: bool,
    ) -> Result<DoctorAbsence> {
        let absence = self
            .store
            .absence(id)
            .await?
            .ok_or_else(|| SchedulingError::not_found(format!("absence {id}")))?;
        permissions::ensure_absence_write(actor, absence.doctor_id)?;
        Ok(self.store.set_absence_active(id, active).await?)
    }

    /// Remaining vacation days for a doctor in a calendar year, after
    /// spending `requested_workdays` on a new absence. Counts the
    /// doctor's other active vacation absences of the same year.
    pub async fn remaining_vacation_days(
        &self,
        doctor_id: Id,
        year: i32,
        requested_workdays: u32,
        exclude_absence: Option<Id>,
    ) -> Result<u32> {
        let allocation = self.config.default_vacation_allocation;
        let others = self
            .store
            .active_vacation_absences(doctor_id, exclude_absence)
            .await?;
        let used: u32 = others.iter().map(|a| a.workdays_in_year(year)).sum();
        Ok(allocation.saturating_sub(used + requested_workdays))
    }

    // ==================== Breaks ====================

    pub async fn create_break(&self, actor: &Clinician, new: NewDoctorBreak) -> Result<DoctorBreak> {
        permissions::ensure_break_write(actor, new.doctor_id)?;
        validate_time_window(new.start_time, new.end_time)?;
        if let Some(doctor_id) = new.doctor_id {
            self.require_doctor(doctor_id).await?;
        }
        Ok(self.store.create_break(new).await?)
    }

    pub async fn set_break_active(
        &self,
        actor: &Clinician,
        id: Id,
        active: bool,
    ) -> Result<DoctorBreak> {
        let break_row = self
            .store
            .doctor_break(id)
            .await?
            .ok_or_else(|| SchedulingError::not_found(format!("break {id}")))?;
        permissions::ensure_break_write(actor, break_row.doctor_id)?;
        Ok(self.store.set_break_active(id, active).await?)
    }

    // ==================== Helpers ====================

    async fn require_doctor(&self, doctor_id: Id) -> Result<Clinician> {
        let clinician = self
            .store
            .clinician(doctor_id)
            .await?
            .filter(|c| c.active)
            .ok_or_else(|| SchedulingError::not_found(format!("doctor {doctor_id}")))?;
        if !clinician.is_doctor() {
            return Err(SchedulingError::invalid(
                "doctor_id",
                "clinician does not have role doctor",
            ));
        }
        Ok(clinician)
    }
}

fn validate_weekday(weekday: u8) -> Result<()> {
    if weekday > 6 {
        return Err(SchedulingError::invalid(
            "weekday",
            "weekday must be between 0 (Monday) and 6 (Sunday)",
        ));
    }
    Ok(())
}

fn validate_time_window(start: chrono::NaiveTime, end: chrono::NaiveTime) -> Result<()> {
    if start >= end {
        return Err(SchedulingError::invalid(
            "end_time",
            "end_time must be after start_time",
        ));
    }
    Ok(())
}
