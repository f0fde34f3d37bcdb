//! Game-record API wrappers and their memoized front end.
//!
//! [`RecordsApi`] assembles signed requests, pulls a session cookie from a
//! [`CookiePool`], and retries with a fresh cookie when the pool rejects a
//! response. [`RecordsService`] wraps the cacheable lookups in per-endpoint
//! TTL caches.

mod api;
mod pool;
mod service;

pub use api::{
    account_id_from_cookie, server_for, Lookup, RecordsApi, RecordsError, NO_PUBLIC_COOKIE,
};
pub use pool::{Cookie, CookiePool, RequestSigner};
pub use service::{AbyssQuery, MonthQuery, PlayerQuery, RecordsService, SkillQuery};
