use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch, used for `TtsWorkItem::enqueued_at_ms`
/// and bus envelope timestamps. Monotonic enough for FIFO ordering within a
/// single process; cross-process ordering is not guaranteed or required.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Seconds since the Unix epoch, used for TTL comparisons against stored
/// `expires_at`/`updated_at` fields.
pub fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
