//! Local time sources.
//!
//! The estimator never reads the system clock directly; it asks a
//! [`TimeSource`] for the local time in milliseconds. Tests substitute a
//! deterministic closure.

use chrono::Utc;

/// A source of local time in milliseconds.
pub trait TimeSource: Send + Sync {
    /// Current local time in milliseconds.
    fn now_ms(&self) -> i64;
}

impl<F> TimeSource for F
where
    F: Fn() -> i64 + Send + Sync,
{
    fn now_ms(&self) -> i64 {
        self()
    }
}

/// Wall-clock time in milliseconds since the UNIX epoch.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl TimeSource for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}
