//! Time-bounded memoization of asynchronous functions.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;
use tracing::{debug, trace};

use super::key::{CacheArgs, CacheKey};
use crate::clock::{system_clock, SharedClock};

type CallFn<A, T, E> = Box<dyn Fn(A) -> BoxFuture<'static, Result<T, E>> + Send + Sync>;
type KeyFn<A> = Box<dyn Fn(&A) -> CacheKey + Send + Sync>;
type Predicate<T> = Box<dyn Fn(&T) -> bool + Send + Sync>;

/// A cached successful result.
#[derive(Debug, Clone)]
struct CacheEntry<T> {
    value: T,
    stored_at: DateTime<Utc>,
}

/// An asynchronous function wrapped with a private TTL cache.
///
/// Each distinct argument key keeps the most recent successful result. A call
/// whose entry is younger than the TTL returns the stored value without
/// running the wrapped function; otherwise the function runs and, if it
/// succeeds, its result replaces the entry. Errors are returned unchanged and
/// never cached.
///
/// ```ignore
/// let card = Memoized::new(Duration::from_secs(3600), move |args: CardArgs| {
///     let api = api.clone();
///     async move { api.player_card(&args.user_id, &args.uid).await }
/// });
/// let data = card.call(CardArgs::new("42", "100000001")).await?;
/// ```
pub struct Memoized<A, T, E> {
    /// Label used in log fields
    name: String,
    func: CallFn<A, T, E>,
    key_fn: KeyFn<A>,
    ttl: Duration,
    cache: Mutex<HashMap<String, CacheEntry<T>>>,
    /// Decides which successful values are worth keeping
    cache_if: Option<Predicate<T>>,
    /// Per-key locks, present only in single-flight mode
    in_flight: Option<DashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    clock: SharedClock,
}

impl<A, T, E> Memoized<A, T, E>
where
    A: Send + 'static,
    T: Clone + Send + 'static,
    E: Send + 'static,
{
    /// Wrap `func`, keying entries by the arguments' [`CacheArgs`] rendering.
    pub fn new<F, Fut>(ttl: Duration, func: F) -> Self
    where
        A: CacheArgs,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        Self::with_key(ttl, |args: &A| args.cache_key(), func)
    }

    /// Wrap `func`, keying entries with an explicit key-extraction closure.
    pub fn with_key<K, F, Fut>(ttl: Duration, key_fn: K, func: F) -> Self
    where
        K: Fn(&A) -> CacheKey + Send + Sync + 'static,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        Self {
            name: "memoized".to_string(),
            func: Box::new(move |args| func(args).boxed()),
            key_fn: Box::new(key_fn),
            ttl,
            cache: Mutex::new(HashMap::new()),
            cache_if: None,
            in_flight: None,
            clock: system_clock(),
        }
    }

    /// Set the label used in log output.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Only cache successful values for which `predicate` returns `true`.
    ///
    /// Rejected values are still returned to the caller.
    pub fn cache_if<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.cache_if = Some(Box::new(predicate));
        self
    }

    /// Serialize concurrent misses on the same key so the wrapped function
    /// runs once and the other callers read its result.
    pub fn single_flight(mut self, enabled: bool) -> Self {
        self.in_flight = enabled.then(DashMap::new);
        self
    }

    /// Read time from `clock` instead of the system clock.
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    /// The configured time-to-live.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Call the wrapped function, or return a fresh cached result.
    pub async fn call(&self, args: A) -> Result<T, E> {
        let key = (self.key_fn)(&args).to_string();

        if let Some(value) = self.lookup(&key) {
            trace!(name = %self.name, key = %key, "Memoized cache hit");
            return Ok(value);
        }

        let Some(locks) = &self.in_flight else {
            return self.compute(key, args).await;
        };

        let lock = locks.entry(key.clone()).or_default().value().clone();
        let result = {
            let _guard = lock.lock().await;
            // Another caller may have filled the entry while we waited
            match self.lookup(&key) {
                Some(value) => {
                    trace!(name = %self.name, key = %key, "Memoized hit after waiting");
                    Ok(value)
                }
                None => self.compute(key.clone(), args).await,
            }
        };

        // Drop the lock once no other caller holds or waits on it
        drop(lock);
        locks.remove_if(&key, |_, lock| Arc::strong_count(lock) == 1);
        result
    }

    async fn compute(&self, key: String, args: A) -> Result<T, E> {
        debug!(name = %self.name, key = %key, "Memoized cache miss, invoking");
        let value = (self.func)(args).await?;

        if self.should_cache(&value) {
            self.store(key, value.clone());
        } else {
            debug!(name = %self.name, key = %key, "Result rejected by cache predicate");
        }

        Ok(value)
    }

    /// Drop the entry for `args`, if any.
    pub fn invalidate(&self, args: &A) {
        let key = (self.key_fn)(args).to_string();
        self.cache.lock().remove(&key);
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.cache.lock().clear();
    }

    /// Number of stored entries, fresh or stale.
    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    /// Whether nothing has been stored yet.
    pub fn is_empty(&self) -> bool {
        self.cache.lock().is_empty()
    }

    fn lookup(&self, key: &str) -> Option<T> {
        let now = self.clock.now();
        let cache = self.cache.lock();
        let entry = cache.get(key)?;

        // A clock that stepped backwards leaves the entry fresh
        let fresh = match (now - entry.stored_at).to_std() {
            Ok(age) => age <= self.ttl,
            Err(_) => true,
        };
        fresh.then(|| entry.value.clone())
    }

    fn store(&self, key: String, value: T) {
        let entry = CacheEntry {
            value,
            stored_at: self.clock.now(),
        };
        self.cache.lock().insert(key, entry);
    }

    fn should_cache(&self, value: &T) -> bool {
        self.cache_if.as_ref().map_or(true, |predicate| predicate(value))
    }
}
