//! Business-day date helpers
//!
//! Weekend-only calendar: Saturdays and Sundays are non-business days.
//! Exchange holiday calendars are a configuration concern and are not
//! modelled here.

use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc, Weekday};

/// Is the given instant on a business day?
pub fn is_business_day(ts: DateTime<Utc>) -> bool {
    !matches!(ts.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Advance to the next business day, preserving time of day
pub fn next_business_day(ts: DateTime<Utc>) -> DateTime<Utc> {
    let mut next = ts + Duration::days(1);
    while !is_business_day(next) {
        next += Duration::days(1);
    }
    next
}

/// Add `n` business days to a timestamp
pub fn add_business_days(ts: DateTime<Utc>, n: u32) -> DateTime<Utc> {
    let mut result = ts;
    for _ in 0..n {
        result = next_business_day(result);
    }
    result
}

/// End-of-day deadline at `cutoff` on the current business day, rolling to
/// the next business day if the cutoff has already passed (or today is not
/// a business day)
pub fn end_of_day_deadline(now: DateTime<Utc>, cutoff: NaiveTime) -> DateTime<Utc> {
    let today_cutoff = now
        .date_naive()
        .and_time(cutoff)
        .and_utc();

    if is_business_day(now) && now < today_cutoff {
        today_cutoff
    } else {
        let next = next_business_day(now);
        next.date_naive().and_time(cutoff).and_utc()
    }
}
