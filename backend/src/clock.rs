use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds since the Unix epoch, as stored in timestamp columns and token
/// claims.
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}
