//! Cooldown limiter.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tracing::{debug, trace};

use crate::clock::{system_clock, SharedClock};
use crate::config::LimitsConfig;

/// Fallback cooldown when neither the caller nor the configuration gives a
/// positive duration.
pub const DEFAULT_COOLDOWN_SECS: i64 = 60;

/// Per-key minimum-interval gate.
///
/// A key is eligible once the current time reaches the instant recorded by
/// the last [`CooldownLimiter::start`]. Keys that were never started are
/// always eligible.
pub struct CooldownLimiter {
    /// Earliest instant each key may act again
    next_allowed: DashMap<String, DateTime<Utc>>,
    /// Duration used when `start` gets a non-positive value
    default_secs: i64,
    clock: SharedClock,
}

impl CooldownLimiter {
    /// Create a limiter using the system clock.
    pub fn new() -> Self {
        Self::with_clock(system_clock())
    }

    /// Create a limiter reading time from `clock`.
    pub fn with_clock(clock: SharedClock) -> Self {
        Self {
            next_allowed: DashMap::new(),
            default_secs: DEFAULT_COOLDOWN_SECS,
            clock,
        }
    }

    /// Create a limiter whose default cooldown comes from `limits`.
    pub fn from_config(limits: &LimitsConfig) -> Self {
        Self::new().with_default_secs(limits.cooldown_secs)
    }

    /// Use `secs` when `start` is called with a non-positive duration.
    ///
    /// Non-positive values keep [`DEFAULT_COOLDOWN_SECS`].
    pub fn with_default_secs(mut self, secs: i64) -> Self {
        self.default_secs = if secs > 0 { secs } else { DEFAULT_COOLDOWN_SECS };
        self
    }

    /// The cooldown applied for non-positive `start` durations.
    pub fn default_secs(&self) -> i64 {
        self.default_secs
    }

    /// Returns `true` if the cooldown for `key` has elapsed.
    pub fn check(&self, key: &str) -> bool {
        match self.next_allowed.get(key) {
            Some(next) => self.clock.now() >= *next,
            None => true,
        }
    }

    /// Begin a cooldown of `duration_secs` seconds for `key`.
    ///
    /// Non-positive durations fall back to the limiter's default, which is
    /// [`DEFAULT_COOLDOWN_SECS`] unless configured otherwise.
    pub fn start(&self, key: &str, duration_secs: i64) {
        let secs = if duration_secs > 0 {
            duration_secs
        } else {
            self.default_secs
        };
        let next = self.clock.now() + Duration::seconds(secs);

        debug!(key = %key, cooldown_secs = secs, "Starting cooldown");
        self.next_allowed.insert(key.to_string(), next);
    }

    /// Seconds until `key` may act again.
    ///
    /// The whole-second remainder is rounded up by one, so a cooldown that is
    /// a fraction of a second from expiry still reports 1. Keys that were never
    /// started, or whose cooldown ended more than a second ago, report 0.
    pub fn remaining(&self, key: &str) -> i64 {
        let Some(next) = self.next_allowed.get(key).map(|n| *n) else {
            return 0;
        };

        let left_ms = (next - self.clock.now()).num_milliseconds();
        // Integer division truncates toward zero
        let left = left_ms / 1000 + 1;
        trace!(key = %key, left_ms = left_ms, "Computed remaining cooldown");
        left.max(0)
    }

    /// Drop any cooldown recorded for `key`.
    pub fn clear(&self, key: &str) {
        self.next_allowed.remove(key);
    }
}

impl Default for CooldownLimiter {
    fn default() -> Self {
        Self::new()
    }
}
