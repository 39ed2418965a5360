//! Region-keyed response cache with lazy expiry.
//!
//! Entries are evicted only when a lookup finds them stale; there is no
//! background sweeper. The clock is injected so tests can advance time
//! deterministically.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

/// Monotonic time source.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall clock used in production.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually advanced clock for tests.
pub struct ManualClock {
    now: RwLock<Instant>,
}

impl ManualClock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            now: RwLock::new(Instant::now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.read().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

struct Entry<T> {
    inserted_at: Instant,
    data: T,
}

/// TTL cache keyed by normalized region string.
pub struct TtlCache<T> {
    entries: RwLock<HashMap<String, Entry<T>>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<T: Clone> TtlCache<T> {
    #[must_use]
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            clock,
        }
    }

    /// Normalized cache key for a region query.
    #[must_use]
    pub fn key_for(region_query: &str) -> String {
        let key = region_query.trim().to_lowercase();
        if key.is_empty() {
            "global".to_string()
        } else {
            key
        }
    }

    /// Fetch a fresh entry, deleting it lazily if it has gone stale.
    pub fn get(&self, key: &str) -> Option<T> {
        let now = self.clock.now();
        {
            let entries = self
                .entries
                .read()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            match entries.get(key) {
                Some(entry) if now.duration_since(entry.inserted_at) < self.ttl => {
                    return Some(entry.data.clone());
                }
                Some(_) => {}
                None => return None,
            }
        }

        // Stale: evict under the write lock.
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if entries
            .get(key)
            .is_some_and(|entry| now.duration_since(entry.inserted_at) >= self.ttl)
        {
            entries.remove(key);
        }
        None
    }

    pub fn insert(&self, key: String, data: T) {
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        entries.insert(
            key,
            Entry {
                inserted_at: self.clock.now(),
                data,
            },
        );
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
