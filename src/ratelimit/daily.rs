//! Daily quota counter.

use std::collections::HashMap;

use chrono::NaiveDate;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::clock::{reference_offset, system_clock, SharedClock};
use crate::config::LimitsConfig;

/// Mutable state guarded by a single lock so rollover and the
/// following read or write happen atomically.
#[derive(Debug, Default)]
struct DailyState {
    /// Calendar date (reference timezone) the counts belong to
    day: Option<NaiveDate>,
    /// Per-key usage counts for `day`
    counts: HashMap<String, u64>,
}

/// Per-key usage counter that resets at midnight in the reference timezone.
///
/// Every operation first checks whether the reference-timezone date has
/// changed since the last call; if so all counts are dropped before the
/// operation is served.
pub struct DailyCounter {
    /// Maximum uses per key per day
    max: u64,
    state: Mutex<DailyState>,
    clock: SharedClock,
}

impl DailyCounter {
    /// Create a counter allowing `max` uses per key per day.
    pub fn new(max: u64) -> Self {
        Self::with_clock(max, system_clock())
    }

    /// Create a counter allowing `limits.daily_max` uses per key per day.
    pub fn from_config(limits: &LimitsConfig) -> Self {
        Self::new(limits.daily_max)
    }

    /// Create a counter reading time from `clock`.
    pub fn with_clock(max: u64, clock: SharedClock) -> Self {
        Self {
            max,
            state: Mutex::new(DailyState::default()),
            clock,
        }
    }

    /// Returns `true` if `key` has used fewer than `max` today.
    pub fn check(&self, key: &str) -> bool {
        let mut state = self.state.lock();
        self.roll_over(&mut state);

        let count = state.counts.get(key).copied().unwrap_or(0);
        trace!(key = %key, count = count, max = self.max, "Checking daily quota");
        count < self.max
    }

    /// Get today's count for `key` (0 if unseen).
    pub fn get_count(&self, key: &str) -> u64 {
        let mut state = self.state.lock();
        self.roll_over(&mut state);
        state.counts.get(key).copied().unwrap_or(0)
    }

    /// Add `amount` to the count for `key`.
    pub fn increase(&self, key: &str, amount: u64) {
        let mut state = self.state.lock();
        self.roll_over(&mut state);

        let count = state.counts.entry(key.to_string()).or_insert(0);
        *count = count.saturating_add(amount);
    }

    /// Add one use for `key`.
    pub fn increase_one(&self, key: &str) {
        self.increase(key, 1);
    }

    /// Set the count for `key` back to zero.
    pub fn reset(&self, key: &str) {
        let mut state = self.state.lock();
        self.roll_over(&mut state);
        state.counts.insert(key.to_string(), 0);
    }

    /// The daily limit this counter enforces.
    pub fn max(&self) -> u64 {
        self.max
    }

    /// Number of keys with a recorded count today.
    pub fn tracked_keys(&self) -> usize {
        let mut state = self.state.lock();
        self.roll_over(&mut state);
        state.counts.len()
    }

    fn today(&self) -> NaiveDate {
        self.clock
            .now()
            .with_timezone(&reference_offset())
            .date_naive()
    }

    fn roll_over(&self, state: &mut DailyState) {
        let today = self.today();
        if state.day != Some(today) {
            if state.day.is_some() {
                debug!(
                    previous = ?state.day,
                    today = %today,
                    keys = state.counts.len(),
                    "Daily quota rolled over"
                );
            }
            state.day = Some(today);
            state.counts.clear();
        }
    }
}
