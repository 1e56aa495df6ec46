//! Wall-clock abstraction.
//!
//! Observation timestamps, check expiry and sanction windows are all expressed
//! in UTC wall-clock time. Components take an `Arc<dyn Clock>` so tests can
//! move time forward deterministically with [`ManualClock`].

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use std::{sync::Arc, time::Duration};

/// Source of the current time.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

/// Clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for tests and offline replay.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { now: Arc::new(Mutex::new(start)) }
    }

    /// Moves the clock forward by `duration`.
    pub fn advance(&self, duration: Duration) {
        let mut now = self.now.lock();
        *now = add_duration(*now, duration);
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        *self.now.lock() = instant;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Converts a std `Duration` into a chrono delta, saturating on overflow.
#[must_use]
pub fn to_delta(duration: Duration) -> TimeDelta {
    TimeDelta::from_std(duration).unwrap_or(TimeDelta::MAX)
}

/// Adds `duration` to `instant`, saturating at the maximum representable time.
#[must_use]
pub fn add_duration(instant: DateTime<Utc>, duration: Duration) -> DateTime<Utc> {
    instant.checked_add_signed(to_delta(duration)).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Returns true while `now` is less than `window` after `since`.
///
/// Timestamps in the future relative to `now` count as within the window.
#[must_use]
pub fn within_window(since: DateTime<Utc>, now: DateTime<Utc>, window: Duration) -> bool {
    now.signed_duration_since(since) < to_delta(window)
}
