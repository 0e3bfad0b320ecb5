//! Time sources used for rollover decisions

use chrono::{DateTime, Duration, Local};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// Source of the current local time
pub trait Clock: fmt::Debug + Send + Sync {
    /// Current local time
    fn now(&self) -> DateTime<Local>;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Local>>>,
}

impl ManualClock {
    /// Create a clock frozen at `now`
    pub fn new(now: DateTime<Local>) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
        }
    }

    /// Jump to `now`
    pub fn set(&self, now: DateTime<Local>) {
        *self.now.lock() = now;
    }

    /// Move forward by `delta`
    pub fn advance(&self, delta: Duration) {
        let mut now = self.now.lock();
        *now += delta;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Local> {
        *self.now.lock()
    }
}
