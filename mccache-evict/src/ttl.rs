use std::hash::Hash;
use std::time::{Duration, Instant};

use indexmap::IndexMap;

use crate::cache::EvictingCache;

/// Least Recently *Set* cache with a fixed per-cache time-to-live.
///
/// Every entry carries the same `ttl`, counted from the moment it was last
/// written (reads don't refresh it). `popitem` first sweeps anything whose
/// `ttl` has elapsed, then evicts the entry that's been sitting longest
/// since it was last written — mirroring the original `TTLCache`'s
/// expiry-ordered linked list.
pub struct TtlCache<K, V> {
    entries: IndexMap<K, (V, Instant)>,
    maxsize: usize,
    ttl: Duration,
}

impl<K: Eq + Hash + Clone, V> TtlCache<K, V> {
    pub fn new(maxsize: usize, ttl: Duration) -> Self {
        Self {
            entries: IndexMap::new(),
            maxsize,
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Removes every entry whose `ttl` has elapsed. Returns how many.
    pub fn expire(&mut self) -> usize {
        let now = Instant::now();
        let stale: Vec<K> = self
            .entries
            .iter()
            .take_while(|(_, (_, set_at))| now.duration_since(*set_at) >= self.ttl)
            .map(|(k, _)| k.clone())
            .collect();
        for key in &stale {
            self.entries.shift_remove(key);
        }
        stale.len()
    }

    fn is_live(&self, set_at: Instant) -> bool {
        Instant::now().duration_since(set_at) < self.ttl
    }
}

impl<K: Eq + Hash + Clone, V> EvictingCache<K, V> for TtlCache<K, V> {
    fn len(&self) -> usize {
        self.entries.len()
    }

    fn maxsize(&self) -> usize {
        self.maxsize
    }

    fn contains_key(&self, key: &K) -> bool {
        self.entries
            .get(key)
            .is_some_and(|(_, set_at)| self.is_live(*set_at))
    }

    fn get(&mut self, key: &K) -> Option<&V> {
        match self.entries.get(key) {
            Some((_, set_at)) if self.is_live(*set_at) => self.entries.get(key).map(|(v, _)| v),
            _ => None,
        }
    }

    fn peek(&self, key: &K) -> Option<&V> {
        self.entries
            .get(key)
            .filter(|(_, set_at)| self.is_live(*set_at))
            .map(|(v, _)| v)
    }

    fn insert(&mut self, key: K, value: V) -> Vec<(K, V)> {
        self.expire();
        let mut evicted = Vec::new();
        if !self.entries.contains_key(&key) {
            while self.entries.len() >= self.maxsize {
                match self.pop_evict() {
                    Some(entry) => evicted.push(entry),
                    None => break,
                }
            }
        } else {
            self.entries.shift_remove(&key);
        }
        self.entries.insert(key, (value, Instant::now()));
        evicted
    }

    fn remove(&mut self, key: &K) -> Option<V> {
        self.entries.shift_remove(key).map(|(v, _)| v)
    }

    fn pop_evict(&mut self) -> Option<(K, V)> {
        self.expire();
        self.entries.shift_remove_index(0).map(|(k, (v, _))| (k, v))
    }

    fn keys(&self) -> Vec<K> {
        self.entries.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expired_entries_read_as_absent() {
        let mut cache = TtlCache::new(4, Duration::from_millis(10));
        cache.insert("a", 1);
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(cache.get(&"a"), None);
    }

    #[test]
    fn fresh_entry_evicted_when_full_is_the_oldest_set() {
        let mut cache = TtlCache::new(2, Duration::from_secs(60));
        cache.insert("a", 1);
        cache.insert("b", 2);
        let evicted = cache.insert("c", 3);
        assert_eq!(evicted, vec![("a", 1)]);
    }
}
