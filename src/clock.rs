use std::time::{SystemTime, UNIX_EPOCH};

/// Current unix timestamp in seconds, used for row `timestamp` columns.
pub fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the unix epoch")
        .as_secs() as i64
}
