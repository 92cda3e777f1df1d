use std::hash::Hash;

use indexmap::IndexMap;

use crate::cache::EvictingCache;

/// Most Recently Used. Reads and writes promote a key to the *front*, and
/// `popitem` evicts from the front too — so the entry you just touched is
/// the one most likely to be evicted next. Counter-intuitive by design
/// (useful when the most recent access is the least likely to repeat, e.g.
/// sequential scans); matches the original `MRUCache` exactly.
pub struct MruCache<K, V> {
    order: IndexMap<K, V>,
    maxsize: usize,
}

impl<K: Eq + Hash + Clone, V> MruCache<K, V> {
    pub fn new(maxsize: usize) -> Self {
        Self {
            order: IndexMap::new(),
            maxsize,
        }
    }

    fn touch(&mut self, key: &K) {
        if let Some(idx) = self.order.get_index_of(key) {
            self.order.move_index(idx, 0);
        }
    }
}

impl<K: Eq + Hash + Clone, V> EvictingCache<K, V> for MruCache<K, V> {
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
        if self.order.contains_key(key) {
            self.touch(key);
        }
        self.order.get(key)
    }

    fn peek(&self, key: &K) -> Option<&V> {
        self.order.get(key)
    }

    fn insert(&mut self, key: K, value: V) -> Vec<(K, V)> {
        let mut evicted = Vec::new();
        if !self.order.contains_key(&key) {
            while self.order.len() >= self.maxsize {
                match self.pop_evict() {
                    Some(entry) => evicted.push(entry),
                    None => break,
                }
            }
        }
        // shift_insert places a new key directly; an existing key is
        // removed first so the insert always lands at index 0.
        self.order.shift_remove(&key);
        self.order.shift_insert(0, key, value);
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
    fn the_just_written_key_is_evicted_first() {
        let mut cache = MruCache::new(2);
        cache.insert("a", 1);
        cache.insert("b", 2); // most recently written
        let evicted = cache.insert("c", 3);
        assert_eq!(evicted, vec![("b", 2)]);
        assert!(cache.contains_key(&"a"));
    }

    #[test]
    fn reading_a_key_also_marks_it_for_next_eviction() {
        let mut cache = MruCache::new(2);
        cache.insert("a", 1);
        cache.insert("b", 2);
        cache.get(&"a");
        let evicted = cache.insert("c", 3);
        assert_eq!(evicted, vec![("a", 1)]);
    }
}
