/*!
 * Time Helpers
 *
 * Interval arithmetic and practice-timezone conversions shared by the
 * availability oracle, conflict detector and suggestion engine.
 *
 * All intervals are half-open `[start, end)`: touching edges never
 * overlap. Day-boundary logic runs in the practice's local zone.
 */

use chrono::{
    DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveTime, TimeZone, Timelike, Utc,
    Weekday,
};
use chrono_tz::Tz;

/// Half-open interval overlap: `[s1, e1)` and `[s2, e2)` overlap iff
/// `s1 < e2 && s2 < e1`.
pub fn overlaps(s1: DateTime<Utc>, e1: DateTime<Utc>, s2: DateTime<Utc>, e2: DateTime<Utc>) -> bool {
    s1 < e2 && s2 < e1
}

/// Clamp a ratio into `[0, 1]`.
pub fn clamp01(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

/// Round a local instant up to the next multiple of `step_minutes`
/// (wall-clock minutes). Seconds and sub-seconds are always rounded away
/// first.
pub fn ceil_to_step(dt: DateTime<Tz>, step_minutes: u32) -> DateTime<Tz> {
    if step_minutes <= 1 {
        return dt;
    }
    let mut dt = dt;
    if dt.second() != 0 || dt.nanosecond() != 0 {
        dt = dt - Duration::seconds(dt.second() as i64)
            - Duration::nanoseconds(dt.nanosecond() as i64)
            + Duration::minutes(1);
    }
    let rem = (dt.minute() as i64) % (step_minutes as i64);
    if rem == 0 {
        dt
    } else {
        dt + Duration::minutes(step_minutes as i64 - rem)
    }
}

/// Resolve a local wall-clock datetime in the practice zone to UTC.
/// Ambiguous times (DST fold) resolve to the earlier instant; skipped
/// times (DST gap) resolve to `None`.
pub fn localize(tz: Tz, date: NaiveDate, time: NaiveTime) -> Option<DateTime<Utc>> {
    match tz.from_local_datetime(&date.and_time(time)) {
        LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(earlier, _) => Some(earlier.with_timezone(&Utc)),
        LocalResult::None => None,
    }
}

/// Local calendar date of an instant in the practice zone.
pub fn local_date(dt: DateTime<Utc>, tz: Tz) -> NaiveDate {
    dt.with_timezone(&tz).date_naive()
}

/// Weekday index with 0 = Monday .. 6 = Sunday.
pub fn weekday_index(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_monday() as u8
}

/// Start of the given local day as a UTC instant. Midnight always
/// resolves in real zones.
pub fn day_start(tz: Tz, date: NaiveDate) -> Option<DateTime<Utc>> {
    localize(tz, date, NaiveTime::MIN)
}

/// Exclusive end of the given local day (midnight of the next day).
pub fn day_end(tz: Tz, date: NaiveDate) -> Option<DateTime<Utc>> {
    day_start(tz, date.succ_opt()?)
}

/// Last wall-clock second of a day, used as the closed end of a day
/// segment when a window continues past midnight.
fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN)
}

/// A window's slice of one local day, expressed as wall-clock times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DaySegment {
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

/// Split a UTC window into per-local-day segments. The closed segment
/// bounds are what hours windows must contain. A window ending exactly at
/// local midnight contributes nothing to the following day.
pub fn day_segments(start: DateTime<Utc>, end: DateTime<Utc>, tz: Tz) -> Vec<DaySegment> {
    if end <= start {
        return Vec::new();
    }
    let start_local = start.with_timezone(&tz);
    let end_local = end.with_timezone(&tz);

    let first = start_local.date_naive();
    let mut last = end_local.date_naive();
    if end_local.time() == NaiveTime::MIN {
        last = last.pred_opt().unwrap_or(last);
    }

    let mut segments = Vec::new();
    let mut date = first;
    loop {
        let start_time = if date == first {
            start_local.time()
        } else {
            NaiveTime::MIN
        };
        let end_time = if date == last && end_local.time() != NaiveTime::MIN {
            end_local.time()
        } else {
            end_of_day()
        };
        segments.push(DaySegment {
            date,
            start_time,
            end_time,
        });
        if date >= last {
            break;
        }
        match date.succ_opt() {
            Some(next) => date = next,
            None => break,
        }
    }
    segments
}

/// Count Mon-Fri days in the inclusive date range.
pub fn count_workdays(start: NaiveDate, end: NaiveDate) -> u32 {
    if end < start {
        return 0;
    }
    let mut days = 0;
    let mut current = start;
    loop {
        if !matches!(current.weekday(), Weekday::Sat | Weekday::Sun) {
            days += 1;
        }
        if current >= end {
            break;
        }
        match current.succ_opt() {
            Some(next) => current = next,
            None => break,
        }
    }
    days
}

/// First Mon-Fri day strictly after the given date.
pub fn next_workday(date: NaiveDate) -> NaiveDate {
    let mut current = date;
    loop {
        match current.succ_opt() {
            Some(next) => current = next,
            None => return current,
        }
        if !matches!(current.weekday(), Weekday::Sat | Weekday::Sun) {
            return current;
        }
    }
}

/// Whether a deadline has passed at the current instant.
pub fn deadline_exceeded(deadline: Option<DateTime<Utc>>) -> bool {
    deadline.is_some_and(|d| Utc::now() >= d)
}
