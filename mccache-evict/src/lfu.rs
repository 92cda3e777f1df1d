use std::hash::Hash;

use indexmap::IndexMap;

use crate::cache::EvictingCache;

/// Least Frequently Used. Every read or write increments a per-key use
/// counter; `popitem` evicts whichever live key has the lowest counter,
/// breaking ties by insertion order (the first such key `IndexMap` iterates
/// to), the same tie-break `collections.Counter.most_common` gives the
/// original.
pub struct LfuCache<K, V> {
    entries: IndexMap<K, (V, u64)>,
    maxsize: usize,
}

impl<K: Eq + Hash + Clone, V> LfuCache<K, V> {
    pub fn new(maxsize: usize) -> Self {
        Self {
            entries: IndexMap::new(),
            maxsize,
        }
    }

    fn least_used_key(&self) -> Option<K> {
        self.entries
            .iter()
            .min_by_key(|(_, (_, count))| *count)
            .map(|(k, _)| k.clone())
    }
}

impl<K: Eq + Hash + Clone, V> EvictingCache<K, V> for LfuCache<K, V> {
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
        if let Some(entry) = self.entries.get_mut(key) {
            entry.1 += 1;
        }
        self.entries.get(key).map(|(v, _)| v)
    }

    fn peek(&self, key: &K) -> Option<&V> {
        self.entries.get(key).map(|(v, _)| v)
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
        let count = self.entries.get(&key).map(|(_, c)| *c + 1).unwrap_or(0);
        self.entries.insert(key, (value, count));
        evicted
    }

    fn remove(&mut self, key: &K) -> Option<V> {
        self.entries.shift_remove(key).map(|(v, _)| v)
    }

    fn pop_evict(&mut self) -> Option<(K, V)> {
        let key = self.least_used_key()?;
        self.entries.shift_remove(&key).map(|(v, _)| (key, v))
    }

    fn keys(&self) -> Vec<K> {
        self.entries.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_the_least_frequently_used_key() {
        let mut cache = LfuCache::new(2);
        cache.insert("a", 1);
        cache.insert("b", 2);
        cache.get(&"a");
        cache.get(&"a");
        let evicted = cache.insert("c", 3);
        assert_eq!(evicted, vec![("b", 2)]);
    }
}
