//! Decision interval grid arithmetic.
//!
//! Intervals are anchored at midnight UTC: each day is cut into consecutive
//! buckets of the timeframe length, and a frame that does not divide 24h
//! evenly gets a shorter final bucket that ends at the next midnight.

use crate::models::timeframe::Timeframe;
use chrono::{DateTime, Utc};

const DAY_SECONDS: i64 = 86_400;

/// Start of the interval containing `ts`. A timestamp sitting exactly on a
/// boundary belongs to the interval that begins there.
pub fn interval_start(ts: DateTime<Utc>, timeframe: Timeframe) -> DateTime<Utc> {
    let len = timeframe.duration().num_seconds();
    let secs = ts.timestamp();
    let day = secs.div_euclid(DAY_SECONDS) * DAY_SECONDS;
    let offset = (secs - day).div_euclid(len) * len;
    DateTime::from_timestamp(day + offset, 0).unwrap_or(ts)
}

/// End of the interval beginning at `start`, truncated at the next midnight
/// for frames that do not divide the day evenly.
pub fn interval_end(start: DateTime<Utc>, timeframe: Timeframe) -> DateTime<Utc> {
    let len = timeframe.duration().num_seconds();
    let secs = start.timestamp();
    let next_midnight = secs.div_euclid(DAY_SECONDS) * DAY_SECONDS + DAY_SECONDS;
    let end = (secs + len).min(next_midnight);
    DateTime::from_timestamp(end, 0).unwrap_or(start)
}

/// Whether two timestamps fall into the same decision interval.
pub fn same_interval(a: DateTime<Utc>, b: DateTime<Utc>, timeframe: Timeframe) -> bool {
    interval_start(a, timeframe) == interval_start(b, timeframe)
}
