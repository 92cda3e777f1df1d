use std::hash::Hash;

use indexmap::IndexMap;
use rand::Rng;

use crate::cache::EvictingCache;

/// Random Replacement. No access bookkeeping at all — `popitem` evicts a
/// uniformly random live key, matching the original `RRCache`'s
/// `random.choice`.
pub struct RrCache<K, V> {
    entries: IndexMap<K, V>,
    maxsize: usize,
}

impl<K: Eq + Hash + Clone, V> RrCache<K, V> {
    pub fn new(maxsize: usize) -> Self {
        Self {
            entries: IndexMap::new(),
            maxsize,
        }
    }
}

impl<K: Eq + Hash + Clone, V> EvictingCache<K, V> for RrCache<K, V> {
    fn len(&self) -> usize {
        self.entries.len()
    }

    fn maxsize(&self) -> usize {
        self.maxsize
    }

    fn contains_key(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    fn get(&mut self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    fn peek(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    fn insert(&mut self, key: K, value: V) -> Vec<(K, V)> {
        let mut evicted = Vec::new();
        if !self.entries.contains_key(&key) {
            while self.entries.len() >= self.maxsize {
                match self.pop_evict() {
                    Some(entry) => evicted.push(entry),
                    None => break,
                }
            }
        }
        self.entries.insert(key, value);
        evicted
    }

    fn remove(&mut self, key: &K) -> Option<V> {
        self.entries.shift_remove(key)
    }

    fn pop_evict(&mut self) -> Option<(K, V)> {
        if self.entries.is_empty() {
            return None;
        }
        let idx = rand::thread_rng().gen_range(0..self.entries.len());
        self.entries.shift_remove_index(idx)
    }

    fn keys(&self) -> Vec<K> {
        self.entries.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicting_an_empty_cache_returns_none() {
        let mut cache: RrCache<&str, i32> = RrCache::new(2);
        assert_eq!(cache.pop_evict(), None);
    }

    #[test]
    fn eviction_keeps_size_at_or_under_maxsize() {
        let mut cache = RrCache::new(2);
        cache.insert("a", 1);
        cache.insert("b", 2);
        cache.insert("c", 3);
        assert_eq!(cache.len(), 2);
    }
}
