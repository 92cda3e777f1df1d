use std::hash::Hash;

use indexmap::IndexMap;

use crate::cache::EvictingCache;

/// First In First Out. Every write — insert or overwrite — moves the key to
/// the back of the queue, so `popitem` always evicts whichever key has gone
/// longest without being written, not whichever was written first overall.
/// This matches the original `FIFOCache`, whose `__setitem__` calls
/// `move_to_end` unconditionally.
pub struct FifoCache<K, V> {
    order: IndexMap<K, V>,
    maxsize: usize,
}

impl<K: Eq + Hash + Clone, V> FifoCache<K, V> {
    pub fn new(maxsize: usize) -> Self {
        Self {
            order: IndexMap::new(),
            maxsize,
        }
    }
}

impl<K: Eq + Hash + Clone, V> EvictingCache<K, V> for FifoCache<K, V> {
    fn len(&self) -> usize {
        self.order.len()
    }

    fn maxsize(&self) -> usize {
        self.maxsize
    }

    fn contains_key(&self, key: &K) -> bool {
        self.order.contains_key(key)
    }

    fn get(&mut self, key: &K) -> Option<&V> {
        self.order.get(key)
    }

    fn peek(&self, key: &K) -> Option<&V> {
        self.order.get(key)
    }

    fn insert(&mut self, key: K, value: V) -> Vec<(K, V)> {
        let mut evicted = Vec::new();
        let is_new = !self.order.contains_key(&key);
        if is_new {
            while self.order.len() >= self.maxsize {
                match self.pop_evict() {
                    Some(entry) => evicted.push(entry),
                    None => break,
                }
            }
            self.order.insert(key, value);
        } else {
            // Overwrite moves the key to the back, same as a fresh insert.
            self.order.shift_remove(&key);
            self.order.insert(key, value);
        }
        evicted
    }

    fn remove(&mut self, key: &K) -> Option<V> {
        self.order.shift_remove(key)
    }

    fn pop_evict(&mut self) -> Option<(K, V)> {
        self.order.shift_remove_index(0)
    }

    fn keys(&self) -> Vec<K> {
        self.order.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_the_oldest_written_key_first() {
        let mut cache = FifoCache::new(2);
        assert!(cache.insert("a", 1).is_empty());
        assert!(cache.insert("b", 2).is_empty());
        let evicted = cache.insert("c", 3);
        assert_eq!(evicted, vec![("a", 1)]);
        assert!(!cache.contains_key(&"a"));
        assert!(cache.contains_key(&"b"));
        assert!(cache.contains_key(&"c"));
    }

    #[test]
    fn overwriting_a_key_bumps_it_to_the_back_of_the_queue() {
        let mut cache = FifoCache::new(2);
        cache.insert("a", 1);
        cache.insert("b", 2);
        cache.insert("a", 10); // re-written, now youngest
        let evicted = cache.insert("c", 3);
        assert_eq!(evicted, vec![("b", 2)]);
    }
}
