//! Per-key usage gates: daily quotas and cooldowns.

mod cooldown;
mod daily;

pub use cooldown::{CooldownLimiter, DEFAULT_COOLDOWN_SECS};
pub use daily::DailyCounter;
