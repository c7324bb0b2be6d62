/*!
 * Absence and Break Models
 *
 * Absences block a doctor for a date range (vacation, sick leave,
 * congress). Breaks block part of a single day; a break without a doctor
 * is practice-wide and applies to everyone.
 */

use chrono::{Datelike, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::utils::time::{count_workdays, next_workday};

use super::Id;

/// Absence reason treated as vacation for the remaining-days calculation.
pub const VACATION_REASON: &str = "vacation";

/// A doctor absence spanning an inclusive date range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorAbsence {
    pub id: Id,
    pub doctor_id: Id,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: Option<String>,
    /// Derived: Mon-Fri days in `[start_date, end_date]`.
    pub workdays_count: u32,
    /// Derived: next workday after `end_date`.
    pub return_date: NaiveDate,
    /// Derived: remaining vacation days for the calendar year, only when the
    /// reason is vacation.
    pub remaining_vacation: Option<u32>,
    pub active: bool,
}

impl DoctorAbsence {
    pub fn is_vacation(&self) -> bool {
        reason_is_vacation(self.reason.as_deref())
    }

    /// Workdays of this absence that fall into the given calendar year.
    pub fn workdays_in_year(&self, year: i32) -> u32 {
        if self.start_date.year() > year || self.end_date.year() < year {
            return 0;
        }
        let year_start = NaiveDate::from_ymd_opt(year, 1, 1).unwrap_or(self.start_date);
        let year_end = NaiveDate::from_ymd_opt(year, 12, 31).unwrap_or(self.end_date);
        count_workdays(self.start_date.max(year_start), self.end_date.min(year_end))
    }

    /// Whether the absence covers the given date.
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}

pub fn reason_is_vacation(reason: Option<&str>) -> bool {
    reason
        .map(|r| r.trim().eq_ignore_ascii_case(VACATION_REASON))
        .unwrap_or(false)
}

/// Data for recording an absence. Derived fields are computed by the
/// roster service before the record is stored.
#[derive(Debug, Clone)]
pub struct NewDoctorAbsence {
    pub doctor_id: Id,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: Option<String>,
    pub active: bool,
}

impl NewDoctorAbsence {
    /// Derive `workdays_count` and `return_date` from the date range.
    pub fn derived_workdays(&self) -> (u32, NaiveDate) {
        (
            count_workdays(self.start_date, self.end_date),
            next_workday(self.end_date),
        )
    }
}

/// A break or blocked time on a specific date.
///
/// `doctor_id = None` marks a practice-wide break (e.g. a team meeting).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorBreak {
    pub id: Id,
    pub doctor_id: Option<Id>,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub reason: Option<String>,
    pub active: bool,
}

impl DoctorBreak {
    /// Whether this break applies to the given doctor.
    pub fn applies_to(&self, doctor_id: Id) -> bool {
        match self.doctor_id {
            None => true,
            Some(id) => id == doctor_id,
        }
    }
}

/// Data for recording a break.
#[derive(Debug, Clone)]
pub struct NewDoctorBreak {
    pub doctor_id: Option<Id>,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub reason: Option<String>,
    pub active: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_vacation_reason_matching() {
        assert!(reason_is_vacation(Some("vacation")));
        assert!(reason_is_vacation(Some("  Vacation ")));
        assert!(!reason_is_vacation(Some("sick leave")));
        assert!(!reason_is_vacation(None));
    }

    #[test]
    fn test_derived_workdays_span_weekend() {
        // Fri 2026-03-06 .. Mon 2026-03-09: Fri + Mon.
        let new = NewDoctorAbsence {
            doctor_id: 1,
            start_date: date(2026, 3, 6),
            end_date: date(2026, 3, 9),
            reason: Some("vacation".into()),
            active: true,
        };
        let (workdays, return_date) = new.derived_workdays();
        assert_eq!(workdays, 2);
        assert_eq!(return_date, date(2026, 3, 10));
    }

    #[test]
    fn test_return_date_skips_weekend() {
        let new = NewDoctorAbsence {
            doctor_id: 1,
            start_date: date(2026, 3, 2),
            end_date: date(2026, 3, 6), // Friday
            reason: None,
            active: true,
        };
        let (workdays, return_date) = new.derived_workdays();
        assert_eq!(workdays, 5);
        // Next workday after Friday is Monday.
        assert_eq!(return_date, date(2026, 3, 9));
    }

    #[test]
    fn test_workdays_in_year_clamps_to_year() {
        let absence = DoctorAbsence {
            id: 1,
            doctor_id: 1,
            start_date: date(2025, 12, 29), // Monday
            end_date: date(2026, 1, 2),     // Friday
            reason: Some("vacation".into()),
            workdays_count: 5,
            return_date: date(2026, 1, 5),
            remaining_vacation: None,
            active: true,
        };
        assert_eq!(absence.workdays_in_year(2025), 3);
        assert_eq!(absence.workdays_in_year(2026), 2);
        assert_eq!(absence.workdays_in_year(2024), 0);
    }

    #[test]
    fn test_break_applies_to() {
        let practice_wide = DoctorBreak {
            id: 1,
            doctor_id: None,
            date: date(2026, 3, 2),
            start_time: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(13, 0, 0).unwrap(),
            reason: Some("team meeting".into()),
            active: true,
        };
        assert!(practice_wide.applies_to(1));
        assert!(practice_wide.applies_to(99));

        let personal = DoctorBreak {
            doctor_id: Some(1),
            ..practice_wide
        };
        assert!(personal.applies_to(1));
        assert!(!personal.applies_to(2));
    }
}
