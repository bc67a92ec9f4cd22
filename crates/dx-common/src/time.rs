use chrono::Utc;

/// Returns the current unix timestamp in milliseconds.
pub fn timestamp_ms() -> i64 {
    Utc::now().timestamp_millis()
}
