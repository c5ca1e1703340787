use std::time::Duration;

/// Source of "now" in unix seconds.
pub trait Clock {
    fn now(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        chrono::Local::now().timestamp()
    }
}

/// Whether a notification stamped at `timestamp` still counts as new at `now`.
///
/// Timestamps from the future are fresh.
pub fn is_fresh(timestamp: i64, now: i64, window: Duration) -> bool {
    let window = i64::try_from(window.as_secs()).unwrap_or(i64::MAX);
    now.saturating_sub(timestamp) <= window
}
