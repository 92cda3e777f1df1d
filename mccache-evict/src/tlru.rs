use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::hash::Hash;
use std::time::Instant;

use crate::cache::EvictingCache;

/// Time aware Least Recently Used cache. Unlike [`crate::TtlCache`]'s fixed
/// per-cache TTL, each entry's expiry is computed by a `ttu` function of its
/// key, value, and the time it was set — the original `TLRUCache`'s
/// "time-to-use" callback. `popitem` evicts whichever live entry expires
/// soonest.
///
/// Stale heap entries are deleted lazily: a key's generation counter in
/// `entries` only matches the generation recorded in the heap entry that's
/// still current, so pops of superseded entries are silently skipped. This
/// mirrors the original's `removed` flag on its heap items.
pub struct TlruCache<K, V, F>
where
    F: Fn(&K, &V, Instant) -> Instant,
{
    entries: HashMap<K, (V, Instant, u64)>,
    heap: BinaryHeap<Reverse<(Instant, u64, K)>>,
    maxsize: usize,
    ttu: F,
    next_generation: u64,
}

impl<K: Eq + Hash + Clone + Ord, V, F> TlruCache<K, V, F>
where
    F: Fn(&K, &V, Instant) -> Instant,
{
    pub fn new(maxsize: usize, ttu: F) -> Self {
        Self {
            entries: HashMap::new(),
            heap: BinaryHeap::new(),
            maxsize,
            ttu,
            next_generation: 0,
        }
    }

    fn is_live(&self, set_at: Instant) -> bool {
        // Re-derived from `ttu` at read time would need the value again;
        // `set_at` here is already the precomputed expiry instant.
        Instant::now() < set_at
    }

    /// Drops heap entries that are stale (superseded generation) or expired.
    fn sweep_heap_head(&mut self) {
        while let Some(Reverse((expires, generation, key))) = self.heap.peek() {
            let current = self.entries.get(key).map(|(_, exp, gen)| (*exp, *gen));
            let is_current = current == Some((*expires, *generation));
            if !is_current {
                self.heap.pop();
                continue;
            }
            if Instant::now() >= *expires {
                self.entries.remove(key);
                self.heap.pop();
                continue;
            }
            break;
        }
    }
}

impl<K: Eq + Hash + Clone + Ord, V, F> EvictingCache<K, V> for TlruCache<K, V, F>
where
    F: Fn(&K, &V, Instant) -> Instant,
{
    fn len(&self) -> usize {
        self.entries.len()
    }

    fn maxsize(&self) -> usize {
        self.maxsize
    }

    fn contains_key(&self, key: &K) -> bool {
        self.entries
            .get(key)
            .is_some_and(|(_, expires, _)| self.is_live(*expires))
    }

    fn get(&mut self, key: &K) -> Option<&V> {
        match self.entries.get(key) {
            Some((_, expires, _)) if self.is_live(*expires) => self.entries.get(key).map(|(v, _, _)| v),
            _ => None,
        }
    }

    fn peek(&self, key: &K) -> Option<&V> {
        self.entries
            .get(key)
            .filter(|(_, expires, _)| self.is_live(*expires))
            .map(|(v, _, _)| v)
    }

    fn insert(&mut self, key: K, value: V) -> Vec<(K, V)> {
        let now = Instant::now();
        let expires = (self.ttu)(&key, &value, now);
        if expires <= now {
            // Already-expired items are silently dropped, matching the
            // original's "skip expired items" early return.
            return Vec::new();
        }

        self.sweep_heap_head();
        let mut evicted = Vec::new();
        if !self.entries.contains_key(&key) {
            while self.entries.len() >= self.maxsize {
                match self.pop_evict() {
                    Some(entry) => evicted.push(entry),
                    None => break,
                }
            }
        }

        let generation = self.next_generation;
        self.next_generation += 1;
        self.entries.insert(key.clone(), (value, expires, generation));
        self.heap.push(Reverse((expires, generation, key)));
        evicted
    }

    fn remove(&mut self, key: &K) -> Option<V> {
        self.entries.remove(key).map(|(v, _, _)| v)
    }

    fn pop_evict(&mut self) -> Option<(K, V)> {
        self.sweep_heap_head();
        let Reverse((_, _, key)) = self.heap.pop()?;
        let (value, _, _) = self.entries.remove(&key)?;
        Some((key, value))
    }

    fn keys(&self) -> Vec<K> {
        self.entries.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn evicts_the_soonest_to_expire_entry_first() {
        let mut cache = TlruCache::new(
            2,
            |_k: &&str, ttu_ms: &u64, now: Instant| now + Duration::from_millis(*ttu_ms),
        );
        cache.insert("a", 500);
        cache.insert("b", 10);
        let evicted = cache.insert("c", 500);
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].0, "b");
    }

    #[test]
    fn already_expired_ttu_is_not_stored() {
        let mut cache = TlruCache::new(2, |_k: &&str, _v: &i32, now: Instant| now - Duration::from_secs(1));
        let evicted = cache.insert("a", 1);
        assert!(evicted.is_empty());
        assert!(!cache.contains_key(&"a"));
    }
}
