//! Recurrence resolver: next concrete fire time for a dose time and rule.
//!
//! Pure functions, generic over the chrono time zone of `now`. Dose times are
//! wall-clock `"HH:MM"` evaluated in that zone.

use chrono::{
    DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, Offset,
    TimeZone,
};

use crate::models::Recurrence;

/// Days examined when looking for the next allowed weekday.
pub const SPECIFIC_DAYS_SEARCH_LIMIT: usize = 8;

/// Parse a strict `"HH:MM"` (two digits each, 00:00 to 23:59).
pub fn parse_dose_time(s: &str) -> Option<NaiveTime> {
    let bytes = s.as_bytes();
    if bytes.len() != 5 || bytes[2] != b':' {
        return None;
    }
    if ![0, 1, 3, 4].iter().all(|&i| bytes[i].is_ascii_digit()) {
        return None;
    }
    let hour: u32 = s[..2].parse().ok()?;
    let minute: u32 = s[3..].parse().ok()?;
    NaiveTime::from_hms_opt(hour, minute, 0)
}

/// Next instant strictly after `now` at which `dose_time` fires under `recurrence`.
///
/// `None` when the time is malformed, the weekday set is empty, or no allowed
/// day turns up within the search window.
pub fn next_fire_time<Tz: TimeZone>(
    dose_time: &str,
    recurrence: &Recurrence,
    now: &DateTime<Tz>,
) -> Option<DateTime<Tz>> {
    let time = parse_dose_time(dose_time)?;

    match recurrence {
        // AlternateDay has no cadence of its own yet and fires daily.
        Recurrence::Daily | Recurrence::AlternateDay => next_daily_occurrence(time, now),
        Recurrence::SpecificDays(days) => {
            if days.is_empty() {
                return None;
            }
            let tz = now.timezone();
            let mut date = now.date_naive();
            for _ in 0..SPECIFIC_DAYS_SEARCH_LIMIT {
                if recurrence.includes(date.weekday()) {
                    if let Some(candidate) = localize(&tz, date.and_time(time)) {
                        if candidate > *now {
                            return Some(candidate);
                        }
                    }
                }
                date = date.succ_opt()?;
            }
            None
        }
    }
}

/// Next daily refill check at `at`: today if still ahead of `now`, else tomorrow.
pub fn next_refill_check<Tz: TimeZone>(now: &DateTime<Tz>, at: NaiveTime) -> Option<DateTime<Tz>> {
    next_daily_occurrence(at, now)
}

fn next_daily_occurrence<Tz: TimeZone>(time: NaiveTime, now: &DateTime<Tz>) -> Option<DateTime<Tz>> {
    let tz = now.timezone();
    let today: NaiveDate = now.date_naive();
    if let Some(candidate) = localize(&tz, today.and_time(time)) {
        if candidate > *now {
            return Some(candidate);
        }
    }
    localize(&tz, today.succ_opt()?.and_time(time))
}

/// Map a wall-clock time into `tz`. Times inside a DST gap move forward by
/// the size of the gap; ambiguous times take the earlier instant.
fn localize<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> Option<DateTime<Tz>> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(t) => Some(t),
        LocalResult::Ambiguous(earliest, _) => Some(earliest),
        LocalResult::None => {
            // offsets read three hours either side of the gap
            let probe = Duration::hours(3);
            let gap = utc_offset_secs(tz, naive + probe)? - utc_offset_secs(tz, naive - probe)?;
            if gap <= 0 {
                return None;
            }
            tz.from_local_datetime(&(naive + Duration::seconds(i64::from(gap))))
                .earliest()
        }
    }
}

fn utc_offset_secs<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> Option<i32> {
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|t| t.offset().fix().local_minus_utc())
}
