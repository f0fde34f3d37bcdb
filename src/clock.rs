//! Time sources for the limiters and the memoizer.
//!
//! Everything that reads the wall clock goes through [`Clock`] so tests can
//! move time forward without sleeping.

use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, Utc};
use parking_lot::Mutex;

/// Offset of the reference timezone used for daily rollover (Asia/Shanghai).
///
/// China has not observed daylight saving time since 1991, so a fixed
/// UTC+08:00 offset is exact.
pub const REFERENCE_OFFSET_SECS: i32 = 8 * 3600;

/// The fixed reference timezone for daily quotas.
pub fn reference_offset() -> FixedOffset {
    FixedOffset::east_opt(REFERENCE_OFFSET_SECS).expect("UTC+08:00 is a valid offset")
}

/// A source of the current time.
pub trait Clock: Send + Sync {
    /// The current instant in UTC.
    fn now(&self) -> DateTime<Utc>;
}

/// Clock backed by the system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same underlying time, so a test can hand one clone to a
/// limiter and keep another to advance it.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    /// Create a clock frozen at `start`.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Move the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }

    /// Jump the clock to an absolute instant.
    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock() = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Shared handle to a clock.
pub type SharedClock = Arc<dyn Clock>;

/// The default clock for production use.
pub fn system_clock() -> SharedClock {
    Arc::new(SystemClock)
}
