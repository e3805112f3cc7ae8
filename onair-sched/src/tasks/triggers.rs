//! Calendar arithmetic for recurring triggers

use chrono::{Duration as ChronoDuration, NaiveDateTime, NaiveTime};
use std::time::Duration;

/// Next wall-clock instant at `at`, strictly after `now`
pub fn next_daily_occurrence(now: NaiveDateTime, at: NaiveTime) -> NaiveDateTime {
    let today = now.date().and_time(at);
    if today > now {
        today
    } else {
        today + ChronoDuration::days(1)
    }
}

/// Time to wait from `now` until the next occurrence of `at`
pub fn until_next_daily(now: NaiveDateTime, at: NaiveTime) -> Duration {
    (next_daily_occurrence(now, at) - now)
        .to_std()
        .unwrap_or(Duration::ZERO)
}
