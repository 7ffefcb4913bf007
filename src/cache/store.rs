//! Key/value cache store with ttl
//!
//! The store is shared by every query running against a data source, so
//! implementations must be safe under concurrent access.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};

use super::errors::CacheResult;

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Moves the clock forward
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        if let Some(next) = chrono::Duration::from_std(by)
            .ok()
            .and_then(|by| now.checked_add_signed(by))
        {
            *now = next;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

/// Generic key/value store with ttl-based expiry
pub trait CacheStore: Send + Sync {
    /// Returns the payload if present and not expired
    fn get(&self, key: &str) -> Option<String>;

    /// Stores a payload for `ttl`
    fn set(&self, key: &str, payload: String, ttl: Duration) -> CacheResult<()>;
}

impl<S: CacheStore + ?Sized> CacheStore for Arc<S> {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }

    fn set(&self, key: &str, payload: String, ttl: Duration) -> CacheResult<()> {
        (**self).set(key, payload, ttl)
    }
}

/// One cached payload
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub payload: String,
    pub fetched_at: DateTime<Utc>,
    pub ttl: Duration,
}

impl CacheEntry {
    /// Returns true once `now` is past `fetched_at + ttl`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        chrono::Duration::from_std(self.ttl)
            .ok()
            .and_then(|ttl| self.fetched_at.checked_add_signed(ttl))
            .map_or(false, |expires_at| now >= expires_at)
    }
}

/// In-process cache store
pub struct MemoryCacheStore<C: Clock = SystemClock> {
    entries: RwLock<HashMap<String, CacheEntry>>,
    clock: C,
}

impl MemoryCacheStore<SystemClock> {
    /// Creates an empty store on the wall clock
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for MemoryCacheStore<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> MemoryCacheStore<C> {
    /// Creates an empty store on the given clock
    pub fn with_clock(clock: C) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Number of entries, including expired ones not yet swept
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if the store holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl<C: Clock> CacheStore for MemoryCacheStore<C> {
    fn get(&self, key: &str) -> Option<String> {
        let now = self.clock.now();
        let entries = self.entries.read();
        entries
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.payload.clone())
    }

    /// Also drops every entry that has expired by now.
    fn set(&self, key: &str, payload: String, ttl: Duration) -> CacheResult<()> {
        let now = self.clock.now();
        let entry = CacheEntry {
            payload,
            fetched_at: now,
            ttl,
        };
        let mut entries = self.entries.write();
        entries.retain(|_, e| !e.is_expired(now));
        entries.insert(key.to_string(), entry);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_get_within_ttl() {
        let clock = Arc::new(ManualClock::new(start()));
        let store = MemoryCacheStore::with_clock(clock.clone());
        store.set("k", "v".into(), Duration::from_secs(10)).unwrap();

        clock.advance(Duration::from_secs(9));
        assert_eq!(store.get("k"), Some("v".to_string()));
    }

    #[test]
    fn test_expired_entry_is_absent() {
        let clock = Arc::new(ManualClock::new(start()));
        let store = MemoryCacheStore::with_clock(clock.clone());
        store.set("k", "v".into(), Duration::from_secs(10)).unwrap();

        clock.advance(Duration::from_secs(10));
        assert_eq!(store.get("k"), None);
    }

    #[test]
    fn test_set_sweeps_expired_entries() {
        let clock = Arc::new(ManualClock::new(start()));
        let store = MemoryCacheStore::with_clock(clock.clone());
        store.set("old", "v".into(), Duration::from_secs(10)).unwrap();
        store.set("long", "v".into(), Duration::from_secs(60)).unwrap();

        clock.advance(Duration::from_secs(10));
        assert_eq!(store.len(), 2);

        store.set("new", "v".into(), Duration::from_secs(10)).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.get("old"), None);
        assert_eq!(store.get("long"), Some("v".to_string()));
    }

    #[test]
    fn test_set_replaces() {
        let store = MemoryCacheStore::new();
        store.set("k", "a".into(), Duration::from_secs(60)).unwrap();
        store.set("k", "b".into(), Duration::from_secs(60)).unwrap();
        assert_eq!(store.get("k"), Some("b".to_string()));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_concurrent_access() {
        let store = Arc::new(MemoryCacheStore::new());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for j in 0..50 {
                        let key = format!("{}_{}", i, j);
                        store.set(&key, key.clone(), Duration::from_secs(60)).unwrap();
                        assert_eq!(store.get(&key), Some(key));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.len(), 200);
    }
}
