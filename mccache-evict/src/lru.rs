use std::hash::Hash;

use indexmap::IndexMap;

use crate::cache::EvictingCache;

/// Least Recently Used. Both reads and writes promote a key to the back;
/// `popitem` evicts from the front.
pub struct LruCache<K, V> {
    order: IndexMap<K, V>,
    maxsize: usize,
}

impl<K: Eq + Hash + Clone, V> LruCache<K, V> {
    pub fn new(maxsize: usize) -> Self {
        Self {
            order: IndexMap::new(),
            maxsize,
        }
    }

    fn touch(&mut self, key: &K) {
        if let Some(idx) = self.order.get_index_of(key) {
            self.order.move_index(idx, self.order.len() - 1);
        }
    }
}

impl<K: Eq + Hash + Clone, V> EvictingCache<K, V> for LruCache<K, V> {
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
        self.order.insert(key.clone(), value);
        self.touch(&key);
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
    fn reading_a_key_protects_it_from_the_next_eviction() {
        let mut cache = LruCache::new(2);
        cache.insert("a", 1);
        cache.insert("b", 2);
        cache.get(&"a"); // "a" is now the most recently used
        let evicted = cache.insert("c", 3);
        assert_eq!(evicted, vec![("b", 2)]);
        assert!(cache.contains_key(&"a"));
    }
}
