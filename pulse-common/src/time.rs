//! Timestamp utilities

use chrono::{DateTime, Duration, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Elapsed time between `since` and `now`, clamped at zero
pub fn elapsed(since: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    let diff = now - since;
    if diff < Duration::zero() {
        Duration::zero()
    } else {
        diff
    }
}

/// Whole days elapsed between `since` and `now`
pub fn whole_days_since(since: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    elapsed(since, now).num_days()
}
