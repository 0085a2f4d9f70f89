//! Sliding-window attempt limiter for sensitive actions.
//!
//! Counts attempts per action key within the trailing window and refuses
//! further attempts once the cap is reached. Attempt history lives in a
//! persisted [`AttemptStore`] so that restarting the client does not reset
//! the counters.
//!
//! This is advisory, client-side throttling: it raises the cost of naive
//! scripted abuse, but the backing store is attacker-writable. It is not a
//! substitute for server-side rate limiting.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use time::{Duration, OffsetDateTime};

/// Key-value persistence for attempt history.
///
/// Browser hosts back this with local storage, native hosts with a settings
/// file. Values are JSON arrays of unix-millisecond timestamps under keys
/// namespaced as `ratelimit_<action>`.
pub trait AttemptStore: Send + Sync {
    fn get_item(&self, key: &str) -> Option<String>;
    fn set_item(&self, key: &str, value: &str);
    fn remove_item(&self, key: &str);
}

/// In-memory [`AttemptStore`] for tests and hosts without durable storage.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<HashMap<String, String>>>,
}

impl AttemptStore for MemoryStore {
    fn get_item(&self, key: &str) -> Option<String> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set_item(&self, key: &str, value: &str) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_owned(), value.to_owned());
    }

    fn remove_item(&self, key: &str) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }
}

/// Point-in-time source for the limiter. Tests substitute [`ManualClock`].
pub trait Clock: Send + Sync {
    fn now_unix_millis(&self) -> i64;
}

/// Wall-clock [`Clock`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix_millis(&self) -> i64 {
        (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
    }
}

/// Hand-driven [`Clock`] for tests.
#[derive(Debug, Default, Clone)]
pub struct ManualClock {
    now: Arc<AtomicI64>,
}

impl ManualClock {
    #[must_use]
    pub fn new(start_unix_millis: i64) -> Self {
        Self {
            now: Arc::new(AtomicI64::new(start_unix_millis)),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now
            .fetch_add(by.whole_milliseconds() as i64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_unix_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Result of a [`RateLimiter::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub allowed: bool,
    /// Time until the oldest surviving attempt leaves the window. Zero when
    /// the attempt was allowed.
    pub retry_after: Duration,
}

/// Deterministic sliding-window attempt counter.
///
/// Not a token bucket: the record is the literal list of attempt timestamps
/// inside the window, and `retry_after` is measured from the oldest of them.
/// No randomness, no jitter.
pub struct RateLimiter<S, C = SystemClock> {
    store: S,
    clock: C,
}

impl<S: AttemptStore> RateLimiter<S> {
    #[must_use]
    pub fn new(store: S) -> Self {
        Self {
            store,
            clock: SystemClock,
        }
    }
}

impl<S: AttemptStore, C: Clock> RateLimiter<S, C> {
    /// Use a custom clock (for fake time in tests).
    #[must_use]
    pub fn with_clock(store: S, clock: C) -> Self {
        Self { store, clock }
    }

    /// Record an attempt for `action` unless the window is already full.
    ///
    /// A missing or corrupt record reads as empty: the limiter fails open
    /// toward "allow" rather than erroring. Entries older than `window` are
    /// pruned before counting, and the persisted record is rewritten so it
    /// only ever holds in-window timestamps. A blocked attempt is not
    /// itself recorded.
    pub fn check(&self, action: &str, max_attempts: usize, window: Duration) -> RateLimitStatus {
        let key = storage_key(action);
        let now = self.clock.now_unix_millis();
        let window_ms = window.whole_milliseconds() as i64;

        let mut history: Vec<i64> = self
            .store
            .get_item(&key)
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default();
        history.retain(|&stamp| now - stamp < window_ms);

        if history.len() >= max_attempts {
            let oldest = history.iter().copied().min().unwrap_or(now);
            self.persist(&key, &history);
            return RateLimitStatus {
                allowed: false,
                retry_after: Duration::milliseconds(window_ms - (now - oldest)),
            };
        }

        history.push(now);
        self.persist(&key, &history);
        RateLimitStatus {
            allowed: true,
            retry_after: Duration::ZERO,
        }
    }

    /// Clear the record for `action`, typically after the action succeeds.
    pub fn reset(&self, action: &str) {
        self.store.remove_item(&storage_key(action));
    }

    fn persist(&self, key: &str, history: &[i64]) {
        if let Ok(raw) = serde_json::to_string(history) {
            self.store.set_item(key, &raw);
        }
    }
}

fn storage_key(action: &str) -> String {
    format!("ratelimit_{action}")
}
