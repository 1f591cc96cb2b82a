//! Wall-clock source.
//!
//! All time-of-day logic (the `time` predicate variable, market open/close)
//! is defined against the engine's local timezone. Components take a
//! `SharedClock` so tests can drive time by hand.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Days, Local, NaiveDate, NaiveTime, TimeZone, Timelike};
use parking_lot::Mutex;

/// Monotonic wall-clock source.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;

    /// Minutes since local midnight of the current instant.
    fn minutes_since_midnight(&self) -> u32 {
        minutes_of(self.now())
    }
}

/// Shared clock handle.
pub type SharedClock = Arc<dyn Clock>;

/// The real system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// A hand-driven clock for tests and simulations.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Local>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Local>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, instant: DateTime<Local>) {
        *self.now.lock() = instant;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        if let Ok(delta) = chrono::Duration::from_std(by) {
            *now = *now + delta;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Local> {
        *self.now.lock()
    }
}

/// Minutes since local midnight of `ts`.
pub fn minutes_of(ts: DateTime<Local>) -> u32 {
    ts.hour() * 60 + ts.minute()
}

/// The next wall-clock instant strictly after `now` whose local time of day
/// is `tod`. Comparing full instants rather than times of day keeps
/// sessions that straddle local midnight well-behaved.
pub fn next_occurrence(now: DateTime<Local>, tod: NaiveTime) -> DateTime<Local> {
    let today = now.date_naive();
    for days_ahead in 0..=2u64 {
        if let Some(date) = today.checked_add_days(Days::new(days_ahead)) {
            if let Some(instant) = local_at(date, tod) {
                if instant > now {
                    return instant;
                }
            }
        }
    }
    // Unreachable outside pathological DST configurations.
    now + chrono::Duration::days(1)
}

/// Resolve a local date + time of day, skipping instants that do not exist
/// (DST spring-forward gap).
fn local_at(date: NaiveDate, tod: NaiveTime) -> Option<DateTime<Local>> {
    Local.from_local_datetime(&date.and_time(tod)).earliest()
}
