use chrono::Utc;

/// Local wall clock in epoch milliseconds, the unit every stored timestamp uses.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
