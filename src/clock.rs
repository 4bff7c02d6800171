use chrono::{DateTime, Utc};

pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Seconds left until `target_end_ms`, rounded to the nearest second and
/// clamped at zero. Always derived from the absolute target so a suspended
/// process catches up correctly.
pub fn remaining_from_target(target_end_ms: i64, now_ms: i64) -> u64 {
    let diff_ms = target_end_ms.saturating_sub(now_ms);
    if diff_ms <= 0 {
        return 0;
    }
    ((diff_ms as f64) / 1000.0).round() as u64
}

/// Absolute end timestamp for `remaining_seconds` from `now_ms`. Saturates
/// instead of overflowing.
pub fn target_from_remaining(now_ms: i64, remaining_seconds: u64) -> i64 {
    let remaining_ms = i64::try_from(remaining_seconds)
        .unwrap_or(i64::MAX)
        .saturating_mul(1000);
    now_ms.saturating_add(remaining_ms)
}

#[cfg(test)]
pub use manual::ManualClock;
