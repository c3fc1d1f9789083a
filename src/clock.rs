//! Injected time source.
//!
//! Every timestamp the service writes and every window boundary it computes
//! comes from a [`Clock`]. Clocks always answer in UTC, so values stamped by
//! one clock and compared against `now()` of another are in the same frame
//! regardless of the host's local offset.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, FixedOffset, TimeZone, Utc};

/// Source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// `now()` converted to the offset-carrying type SeaORM columns use.
    fn now_fixed(&self) -> DateTime<FixedOffset> {
        self.now().fixed_offset()
    }
}

pub type SharedClock = Arc<dyn Clock>;

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for tests.
#[derive(Debug, Clone)]
pub struct FixedClock {
    instant: Arc<Mutex<DateTime<Utc>>>,
}

impl FixedClock {
    /// Accepts an instant expressed in any time zone and pins the clock to it.
    pub fn new<Tz: TimeZone>(instant: DateTime<Tz>) -> Self {
        Self {
            instant: Arc::new(Mutex::new(instant.with_timezone(&Utc))),
        }
    }

    pub fn set<Tz: TimeZone>(&self, instant: DateTime<Tz>) {
        let mut guard = self
            .instant
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = instant.with_timezone(&Utc);
    }

    pub fn advance(&self, by: Duration) {
        let mut guard = self
            .instant
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self
            .instant
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Normalises a stored or caller-supplied timestamp into UTC.
pub fn to_storage<Tz: TimeZone>(instant: &DateTime<Tz>) -> DateTime<FixedOffset> {
    instant.with_timezone(&Utc).fixed_offset()
}
