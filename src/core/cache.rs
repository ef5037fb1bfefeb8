//! Explicit TTL cache
//!
//! Owned by whichever component needs it and passed in at construction;
//! there is no process-wide instance.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

type Clock = Box<dyn Fn() -> Instant + Send + Sync>;

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// Key/value cache whose entries expire after a time-to-live
pub struct TtlCache<K, V> {
    entries: HashMap<K, Entry<V>>,
    default_ttl: Duration,
    clock: Clock,
}

impl<K: Eq + Hash, V: Clone> TtlCache<K, V> {
    pub fn new(default_ttl: Duration) -> Self {
        Self::with_clock(default_ttl, Instant::now)
    }

    /// Cache driven by a custom clock
    pub fn with_clock(
        default_ttl: Duration,
        clock: impl Fn() -> Instant + Send + Sync + 'static,
    ) -> Self {
        Self {
            entries: HashMap::new(),
            default_ttl,
            clock: Box::new(clock),
        }
    }

    /// Live value for `key`; expired entries are dropped on access
    pub fn get(&mut self, key: &K) -> Option<V> {
        let now = (self.clock)();
        match self.entries.get(key) {
            Some(entry) if entry.expires_at > now => Some(entry.value.clone()),
            Some(_) => {
                self.entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&mut self, key: K, value: V) {
        let ttl = self.default_ttl;
        self.insert_with_ttl(key, value, ttl);
    }

    pub fn insert_with_ttl(&mut self, key: K, value: V, ttl: Duration) {
        let expires_at = (self.clock)() + ttl;
        self.entries.insert(key, Entry { value, expires_at });
    }

    pub fn invalidate(&mut self, key: &K) {
        self.entries.remove(key);
    }

}

impl<K, V> std::fmt::Debug for TtlCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlCache")
            .field("entries", &self.entries.len())
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    fn manual_clock() -> (Arc<AtomicU64>, impl Fn() -> Instant + Send + Sync + 'static) {
        let base = Instant::now();
        let offset = Arc::new(AtomicU64::new(0));
        let handle = Arc::clone(&offset);
        (offset, move || {
            base + Duration::from_secs(handle.load(Ordering::SeqCst))
        })
    }

    #[test]
    fn test_entry_expires() {
        let (offset, clock) = manual_clock();
        let mut cache = TtlCache::with_clock(Duration::from_secs(60), clock);
        cache.insert("token", "abc".to_string());

        offset.store(59, Ordering::SeqCst);
        assert_eq!(cache.get(&"token"), Some("abc".to_string()));

        offset.store(60, Ordering::SeqCst);
        assert_eq!(cache.get(&"token"), None);
        assert!(cache.entries.is_empty());
    }

    #[test]
    fn test_insert_with_ttl_overrides_default() {
        let (offset, clock) = manual_clock();
        let mut cache = TtlCache::with_clock(Duration::from_secs(5), clock);
        cache.insert_with_ttl(1, 10, Duration::from_secs(100));

        offset.store(50, Ordering::SeqCst);
        assert_eq!(cache.get(&1), Some(10));
    }

    #[test]
    fn test_invalidate() {
        let mut cache = TtlCache::new(Duration::from_secs(60));
        cache.insert("a", 1);
        cache.insert("b", 2);
        cache.invalidate(&"a");
        assert_eq!(cache.get(&"a"), None);
        assert_eq!(cache.get(&"b"), Some(2));
    }
}
