//! Time utilities for chargebot
//!
//! Session deadlines are enforced with monotonic time. The monotonic clock is
//! tokio's, so a paused test runtime (`tokio::time::pause`) controls both the
//! timers and every remaining-time computation.
//! Wall-clock time is only used for display.

use chrono::{DateTime, Local};
use std::time::Duration;

/// Get the current local time for display.
pub fn now() -> DateTime<Local> {
    Local::now()
}

/// Convert a monotonic offset into the wall-clock time it lands on.
pub fn wall_clock_after(from: DateTime<Local>, offset: Duration) -> DateTime<Local> {
    match chrono::Duration::from_std(offset) {
        Ok(d) => from + d,
        Err(_) => from,
    }
}

/// Format a remaining duration as `MM:SS`, or `Now` once it has run out.
pub fn format_remaining(remaining: Duration) -> String {
    let secs = remaining.as_secs();
    if secs == 0 {
        return "Now".to_string();
    }
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// Whole minutes in a duration, rounded up (a 9m30s lead reads as "10 minutes").
pub fn minutes_ceil(d: Duration) -> u64 {
    d.as_secs().div_ceil(60)
}

/// Represents a point in monotonic time for deadline enforcement.
/// This is immune to wall-clock changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct MonotonicInstant(tokio::time::Instant);

impl MonotonicInstant {
    pub fn now() -> Self {
        Self(tokio::time::Instant::now())
    }

    pub fn duration_since(&self, earlier: MonotonicInstant) -> Duration {
        self.0.saturating_duration_since(earlier.0)
    }

    /// Returns duration until `self`, or zero if `self` is in the past
    pub fn saturating_duration_until(&self, from: MonotonicInstant) -> Duration {
        self.0.saturating_duration_since(from.0)
    }
}

impl std::ops::Add<Duration> for MonotonicInstant {
    type Output = MonotonicInstant;

    fn add(self, rhs: Duration) -> Self::Output {
        MonotonicInstant(self.0 + rhs)
    }
}
