use crate::warehouse::TimeBucket;
use chrono::{DateTime, Datelike, Timelike, Utc};

pub fn start_time_from_millis(ts: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ts)
}

/// Expands a play timestamp into its calendar attributes.
///
/// Week and year use ISO-8601 week numbering: week 1 is the week holding the
/// year's first Thursday, so early-January days can belong to the previous
/// ISO year and late-December days to the next one.
pub fn derive_time_bucket(start_time: DateTime<Utc>) -> TimeBucket {
    let iso_week = start_time.iso_week();
    TimeBucket {
        start_time,
        hour: start_time.hour(),
        day: start_time.day(),
        week: iso_week.week(),
        month: start_time.month(),
        year: iso_week.year(),
        weekday: start_time.weekday().num_days_from_monday(),
    }
}
