//! Questgate - usage guards and cached lookups for game-record chat bots
//!
//! This crate provides the plumbing a chat bot needs in front of a
//! rate-limited upstream API: per-key daily quotas that reset at local
//! midnight, per-key cooldowns, and a TTL memoizer for async lookups. The
//! `records` and `resources` modules wire those pieces to the game-record
//! HTTP endpoints and to the bot's static resource mirror.

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod http;
pub mod ratelimit;
pub mod records;
pub mod resources;

#[cfg(test)]
mod test_utils;
