use chrono::{DateTime, Utc};

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

pub fn time_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Whole milliseconds elapsed between two instants, never negative.
pub fn elapsed_millis(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> u64 {
    (end - start).num_milliseconds().max(0) as u64
}
