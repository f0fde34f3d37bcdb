//! TTL memoization for asynchronous lookups.

mod key;
mod memoize;

pub use key::{CacheArgs, CacheKey, KEY_SEPARATOR};
pub use memoize::Memoized;
