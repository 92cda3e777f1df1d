use std::time::{Duration, Instant};

use mccache_evict::{EvictingCache, FifoCache, LfuCache, LruCache, MruCache, RrCache, TlruCache, TtlCache};

/// The time-to-use closure a registry-created `Tlru` cache uses: every entry
/// gets the same fixed lease from the moment it's written, which is what
/// spec.md §4.3's "TLRU when posture is pessimistic" collapses to without a
/// per-entry policy of its own. Callers who want a real per-entry `ttu` can
/// still build a `TlruCache` directly and hand it to
/// [`crate::registry::CacheRegistry::get_cache_with`].
type FixedLeaseFn = Box<dyn Fn(&Vec<u8>, &Vec<u8>, Instant) -> Instant + Send>;

fn fixed_lease(ttl: Duration) -> FixedLeaseFn {
    Box::new(move |_key, _value, now| now + ttl)
}

/// The cache registry's caches are all keyed and valued by opaque,
/// pre-serialized bytes (spec.md §3: "a bounded mapping from opaque keys to
/// opaque values") — it's [`crate::registry::TypedCache`] that knows about a
/// caller's real `K`/`V` types, encoding and decoding at the boundary.
///
/// Every eviction policy in `mccache-evict` is an independent struct, not a
/// shared base with virtual hooks (spec.md §9 "tagged variants behind a
/// single interface"); this enum is that single interface, dispatching by
/// match rather than dynamic dispatch since the set of variants is closed.
pub enum CacheVariant {
    Fifo(FifoCache<Vec<u8>, Vec<u8>>),
    Lfu(LfuCache<Vec<u8>, Vec<u8>>),
    Lru(LruCache<Vec<u8>, Vec<u8>>),
    Mru(MruCache<Vec<u8>, Vec<u8>>),
    Rr(RrCache<Vec<u8>, Vec<u8>>),
    Ttl(TtlCache<Vec<u8>, Vec<u8>>),
    Tlru(TlruCache<Vec<u8>, Vec<u8>, FixedLeaseFn>),
}

impl CacheVariant {
    pub fn lru(maxsize: usize) -> Self {
        CacheVariant::Lru(LruCache::new(maxsize))
    }

    /// The pessimistic-posture default: a TLRU cache whose every entry
    /// expires `ttl` after it was last written (spec.md §4.3, §6
    /// `MCCACHE_TTL`).
    pub fn tlru(maxsize: usize, ttl: Duration) -> Self {
        CacheVariant::Tlru(TlruCache::new(maxsize, fixed_lease(ttl)))
    }

    pub fn fifo(maxsize: usize) -> Self {
        CacheVariant::Fifo(FifoCache::new(maxsize))
    }

    pub fn lfu(maxsize: usize) -> Self {
        CacheVariant::Lfu(LfuCache::new(maxsize))
    }

    pub fn mru(maxsize: usize) -> Self {
        CacheVariant::Mru(MruCache::new(maxsize))
    }

    pub fn rr(maxsize: usize) -> Self {
        CacheVariant::Rr(RrCache::new(maxsize))
    }

    pub fn ttl(maxsize: usize, ttl: Duration) -> Self {
        CacheVariant::Ttl(TtlCache::new(maxsize, ttl))
    }
}

impl EvictingCache<Vec<u8>, Vec<u8>> for CacheVariant {
    fn len(&self) -> usize {
        match self {
            CacheVariant::Fifo(c) => c.len(),
            CacheVariant::Lfu(c) => c.len(),
            CacheVariant::Lru(c) => c.len(),
            CacheVariant::Mru(c) => c.len(),
            CacheVariant::Rr(c) => c.len(),
            CacheVariant::Ttl(c) => c.len(),
            CacheVariant::Tlru(c) => c.len(),
        }
    }

    fn maxsize(&self) -> usize {
        match self {
            CacheVariant::Fifo(c) => c.maxsize(),
            CacheVariant::Lfu(c) => c.maxsize(),
            CacheVariant::Lru(c) => c.maxsize(),
            CacheVariant::Mru(c) => c.maxsize(),
            CacheVariant::Rr(c) => c.maxsize(),
            CacheVariant::Ttl(c) => c.maxsize(),
            CacheVariant::Tlru(c) => c.maxsize(),
        }
    }

    fn contains_key(&self, key: &Vec<u8>) -> bool {
        match self {
            CacheVariant::Fifo(c) => c.contains_key(key),
            CacheVariant::Lfu(c) => c.contains_key(key),
            CacheVariant::Lru(c) => c.contains_key(key),
            CacheVariant::Mru(c) => c.contains_key(key),
            CacheVariant::Rr(c) => c.contains_key(key),
            CacheVariant::Ttl(c) => c.contains_key(key),
            CacheVariant::Tlru(c) => c.contains_key(key),
        }
    }

    fn get(&mut self, key: &Vec<u8>) -> Option<&Vec<u8>> {
        match self {
            CacheVariant::Fifo(c) => c.get(key),
            CacheVariant::Lfu(c) => c.get(key),
            CacheVariant::Lru(c) => c.get(key),
            CacheVariant::Mru(c) => c.get(key),
            CacheVariant::Rr(c) => c.get(key),
            CacheVariant::Ttl(c) => c.get(key),
            CacheVariant::Tlru(c) => c.get(key),
        }
    }

    fn peek(&self, key: &Vec<u8>) -> Option<&Vec<u8>> {
        match self {
            CacheVariant::Fifo(c) => c.peek(key),
            CacheVariant::Lfu(c) => c.peek(key),
            CacheVariant::Lru(c) => c.peek(key),
            CacheVariant::Mru(c) => c.peek(key),
            CacheVariant::Rr(c) => c.peek(key),
            CacheVariant::Ttl(c) => c.peek(key),
            CacheVariant::Tlru(c) => c.peek(key),
        }
    }

    fn insert(&mut self, key: Vec<u8>, value: Vec<u8>) -> Vec<(Vec<u8>, Vec<u8>)> {
        match self {
            CacheVariant::Fifo(c) => c.insert(key, value),
            CacheVariant::Lfu(c) => c.insert(key, value),
            CacheVariant::Lru(c) => c.insert(key, value),
            CacheVariant::Mru(c) => c.insert(key, value),
            CacheVariant::Rr(c) => c.insert(key, value),
            CacheVariant::Ttl(c) => c.insert(key, value),
            CacheVariant::Tlru(c) => c.insert(key, value),
        }
    }

    fn remove(&mut self, key: &Vec<u8>) -> Option<Vec<u8>> {
        match self {
            CacheVariant::Fifo(c) => c.remove(key),
            CacheVariant::Lfu(c) => c.remove(key),
            CacheVariant::Lru(c) => c.remove(key),
            CacheVariant::Mru(c) => c.remove(key),
            CacheVariant::Rr(c) => c.remove(key),
            CacheVariant::Ttl(c) => c.remove(key),
            CacheVariant::Tlru(c) => c.remove(key),
        }
    }

    fn pop_evict(&mut self) -> Option<(Vec<u8>, Vec<u8>)> {
        match self {
            CacheVariant::Fifo(c) => c.pop_evict(),
            CacheVariant::Lfu(c) => c.pop_evict(),
            CacheVariant::Lru(c) => c.pop_evict(),
            CacheVariant::Mru(c) => c.pop_evict(),
            CacheVariant::Rr(c) => c.pop_evict(),
            CacheVariant::Ttl(c) => c.pop_evict(),
            CacheVariant::Tlru(c) => c.pop_evict(),
        }
    }

    fn keys(&self) -> Vec<Vec<u8>> {
        match self {
            CacheVariant::Fifo(c) => c.keys(),
            CacheVariant::Lfu(c) => c.keys(),
            CacheVariant::Lru(c) => c.keys(),
            CacheVariant::Mru(c) => c.keys(),
            CacheVariant::Rr(c) => c.keys(),
            CacheVariant::Ttl(c) => c.keys(),
            CacheVariant::Tlru(c) => c.keys(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lru_variant_evicts_through_the_shared_interface() {
        let mut cache = CacheVariant::lru(2);
        cache.insert(b"a".to_vec(), b"1".to_vec());
        cache.insert(b"b".to_vec(), b"2".to_vec());
        let evicted = cache.insert(b"c".to_vec(), b"3".to_vec());
        assert_eq!(evicted, vec![(b"a".to_vec(), b"1".to_vec())]);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn tlru_variant_expires_entries_after_the_fixed_lease() {
        let mut cache = CacheVariant::tlru(4, Duration::from_millis(10));
        cache.insert(b"a".to_vec(), b"1".to_vec());
        assert!(cache.contains_key(&b"a".to_vec()));
        std::thread::sleep(Duration::from_millis(25));
        assert!(!cache.contains_key(&b"a".to_vec()));
    }
}
