use std::cell::RefCell;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use mccache_admin::{CoherencePosture, Config};
use mccache_base::{err, Result};
use mccache_evict::EvictingCache;
use mccache_wire::{OpCode, OperationRecord};
use parking_lot::ReentrantMutex;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::clock::now_ns;
use crate::variant::CacheVariant;

/// Channel the registry drops outbound operation records onto; drained by
/// the outbound engine (spec.md §4.4). A plain `crossbeam_channel::Sender`
/// rather than a trait object — there is exactly one outbound worker per
/// process.
pub type OutboundSender = crossbeam_channel::Sender<OperationRecord>;

struct RegistryState {
    caches: HashMap<String, CacheVariant>,
}

struct RegistryInner {
    /// Re-entrant so a callback invoked while the lock is held (there are
    /// none today, but the inbound engine's dispatch does nest a `with_variant`
    /// call inside a `ensure_cache` in the create-on-demand path) can't
    /// deadlock against itself on the same thread — the direct Rust analogue
    /// of the original's `threading.RLock` (spec.md §5, SPEC_FULL.md §5).
    state: ReentrantMutex<RefCell<RegistryState>>,
    posture: CoherencePosture,
    default_maxsize: usize,
    ttl: std::time::Duration,
    outbound: OutboundSender,
}

/// Process-wide, name → cache mapping (spec.md §3 "Cache registry", C3).
///
/// Cheaply `Clone`-able — every clone shares the same underlying map and
/// outbound channel via `Arc`.
#[derive(Clone)]
pub struct CacheRegistry(Arc<RegistryInner>);

impl CacheRegistry {
    pub fn new(config: &Config, outbound: OutboundSender) -> Self {
        CacheRegistry(Arc::new(RegistryInner {
            state: ReentrantMutex::new(RefCell::new(RegistryState { caches: HashMap::new() })),
            posture: config.posture,
            default_maxsize: config.max_size,
            ttl: config.ttl,
            outbound,
        }))
    }

    pub fn posture(&self) -> CoherencePosture {
        self.0.posture
    }

    pub(crate) fn outbound(&self) -> &OutboundSender {
        &self.0.outbound
    }

    fn default_variant(&self) -> CacheVariant {
        if self.0.posture == CoherencePosture::Pessimistic {
            CacheVariant::tlru(self.0.default_maxsize, self.0.ttl)
        } else {
            CacheVariant::lru(self.0.default_maxsize)
        }
    }

    /// Creates `name`'s cache with the registry's default variant if it
    /// doesn't exist yet, emitting `INI` exactly once (spec.md §4.3 "The
    /// registry emits one `INI` on first creation of a named cache").
    /// Both the application-facing [`Self::get_cache`] and the inbound
    /// engine's auto-vivification of a peer-addressed namespace go through
    /// here, so "first creation" means process-wide, not per-caller.
    pub(crate) fn ensure_cache(&self, name: &str) {
        self.ensure_cache_with(name, None)
    }

    pub(crate) fn ensure_cache_with(&self, name: &str, variant: Option<CacheVariant>) {
        let guard = self.0.state.lock();
        let mut state = guard.borrow_mut();
        if state.caches.contains_key(name) {
            return;
        }
        state.caches.insert(name.to_string(), variant.unwrap_or_else(|| self.default_variant()));
        drop(state);
        drop(guard);
        let record = OperationRecord::new(OpCode::Ini, now_ns(), Some(name.to_string()), None, None);
        let _ = self.0.outbound.send(record);
    }

    pub(crate) fn with_variant<R>(&self, name: &str, f: impl FnOnce(&mut CacheVariant) -> R) -> R {
        self.ensure_cache(name);
        let guard = self.0.state.lock();
        let mut state = guard.borrow_mut();
        let cache = state.caches.get_mut(name).expect("ensure_cache just inserted this entry");
        f(cache)
    }

    /// Every registered cache name, for diagnostics (`INQ`, demo tooling).
    pub fn names(&self) -> Vec<String> {
        let guard = self.0.state.lock();
        guard.borrow().caches.keys().cloned().collect()
    }

    fn enqueue_set(&self, namespace: &str, key: Vec<u8>, value: Vec<u8>) {
        let opcode = self.0.posture.mutation_opcode();
        let value = if opcode == OpCode::Del { None } else { Some(value) };
        let record = OperationRecord::new(opcode, now_ns(), Some(namespace.to_string()), Some(key), value);
        let _ = self.0.outbound.send(record);
    }

    /// `delete`/`pop`/`clear` always broadcast `DEL` regardless of posture —
    /// unlike `set`, there's no value to ship under any posture, matching
    /// the original's unconditional `__delitem__` (SPEC_FULL.md §4.3;
    /// see DESIGN.md for why this departs from a literal reading of
    /// spec.md §4.3's per-posture table, which describes `set`'s branching).
    fn enqueue_delete(&self, namespace: &str, key: Vec<u8>) {
        let record = OperationRecord::new(OpCode::Del, now_ns(), Some(namespace.to_string()), Some(key), None);
        let _ = self.0.outbound.send(record);
    }

    /// Applies a peer's `PUT`/`UPD` to the named cache with propagation
    /// suppressed (spec.md §4.5). Creates the namespace on demand.
    pub(crate) fn apply_remote_put(&self, namespace: &str, key: Vec<u8>, value: Vec<u8>) {
        self.with_variant(namespace, |c| {
            c.insert(key, value);
        });
    }

    /// Applies a peer's `DEL` to the named cache with propagation
    /// suppressed. A key absent from the local cache is a no-op (spec.md §8
    /// round-trip property: "`DEL(k)` applied to a cache not containing `k`
    /// → no-op, no error").
    pub(crate) fn apply_remote_del(&self, namespace: &str, key: &[u8]) {
        self.with_variant(namespace, |c| {
            c.remove(&key.to_vec());
        });
    }

    /// A sorted `key -> crc` map for every live key in `namespace`, for an
    /// `INQ` diagnostic reply. Values never leave this function (spec.md
    /// §4.5, §8).
    pub(crate) fn crc_map(&self, namespace: &str) -> std::collections::BTreeMap<Vec<u8>, String> {
        self.with_variant(namespace, |c| {
            c.keys()
                .into_iter()
                .filter_map(|k| {
                    let v = c.peek(&k)?;
                    Some((k, mccache_wire::crc_of(v)))
                })
                .collect()
        })
    }

    pub(crate) fn crc_of_key(&self, namespace: &str, key: &[u8]) -> Option<String> {
        self.with_variant(namespace, |c| c.peek(&key.to_vec()).map(mccache_wire::crc_of))
    }

    /// A typed handle onto `name`'s cache (or `"default"` if `name` is
    /// absent), creating it if this is the first access (spec.md §4.3).
    /// An explicitly empty name is a configuration error, matching the
    /// original's rejection of a non-string/empty name.
    pub fn get_cache<K, V>(&self, name: Option<&str>) -> Result<TypedCache<K, V>>
    where
        K: Serialize + DeserializeOwned + Clone,
        V: Serialize + DeserializeOwned + Clone,
    {
        let name = match name {
            Some("") => return Err(err("cache name must not be empty")),
            Some(n) => n.to_string(),
            None => "default".to_string(),
        };
        self.ensure_cache(&name);
        Ok(TypedCache {
            name,
            registry: self.clone(),
            _marker: PhantomData,
        })
    }

    /// Like [`Self::get_cache`], but installs `variant` as the cache's
    /// initial backing store if `name` doesn't exist yet — the "caller may
    /// supply a preconstructed instance of a different variant" clause of
    /// spec.md §4.3.
    pub fn get_cache_with<K, V>(&self, name: Option<&str>, variant: CacheVariant) -> Result<TypedCache<K, V>>
    where
        K: Serialize + DeserializeOwned + Clone,
        V: Serialize + DeserializeOwned + Clone,
    {
        let name = match name {
            Some("") => return Err(err("cache name must not be empty")),
            Some(n) => n.to_string(),
            None => "default".to_string(),
        };
        self.ensure_cache_with(&name, Some(variant));
        Ok(TypedCache {
            name,
            registry: self.clone(),
            _marker: PhantomData,
        })
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(rmp_serde::to_vec(value)?)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(rmp_serde::from_slice(bytes)?)
}

/// A named cache, typed at the K/V the caller actually stores — the public
/// surface of spec.md §6's cache contract. The registry underneath stores
/// every cache as opaque `Vec<u8>` keys/values; this is the boundary where
/// a caller's real types are encoded and decoded (`rmp_serde`, the same
/// wire encoding `mccache-wire` uses, so a CRC computed here matches one
/// computed from a received `PUT`/`UPD`'s value).
pub struct TypedCache<K, V> {
    name: String,
    registry: CacheRegistry,
    _marker: PhantomData<(K, V)>,
}

impl<K, V> TypedCache<K, V>
where
    K: Serialize + DeserializeOwned + Clone,
    V: Serialize + DeserializeOwned + Clone,
{
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn maxsize(&self) -> usize {
        self.registry.with_variant(&self.name, |c| c.maxsize())
    }

    /// Every entry counts as size 1 (spec.md §3 supplemental, SPEC_FULL.md
    /// §3) so `currsize` and entry count coincide.
    pub fn currsize(&self) -> usize {
        self.registry.with_variant(&self.name, |c| c.len())
    }

    pub fn len(&self) -> usize {
        self.currsize()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &K) -> Result<bool> {
        let kb = encode(key)?;
        Ok(self.registry.with_variant(&self.name, |c| c.contains_key(&kb)))
    }

    pub fn get(&self, key: &K) -> Result<Option<V>> {
        let kb = encode(key)?;
        let raw = self.registry.with_variant(&self.name, |c| c.get(&kb).cloned());
        raw.map(|bytes| decode(&bytes)).transpose()
    }

    /// `get(key, default)` from spec.md §6.
    pub fn get_or(&self, key: &K, default: V) -> Result<V> {
        Ok(self.get(key)?.unwrap_or(default))
    }

    /// Inserts or overwrites `key`. Fails synchronously, without mutating
    /// the cache or enqueuing anything, if the cache has no capacity at all
    /// (spec.md §7 kind 4) — every entry is size 1, so this is the only way
    /// a value can be "too large".
    pub fn set(&self, key: K, value: V, propagate: bool) -> Result<()> {
        if self.maxsize() == 0 {
            return Err(err("cache has zero capacity, value cannot be inserted"));
        }
        let kb = encode(&key)?;
        let vb = encode(&value)?;
        self.registry.with_variant(&self.name, |c| {
            c.insert(kb.clone(), vb.clone());
        });
        if propagate {
            self.registry.enqueue_set(&self.name, kb, vb);
        }
        Ok(())
    }

    pub fn delete(&self, key: &K, propagate: bool) -> Result<Option<V>> {
        let kb = encode(key)?;
        let removed = self.registry.with_variant(&self.name, |c| c.remove(&kb));
        if propagate {
            self.registry.enqueue_delete(&self.name, kb);
        }
        removed.map(|b| decode(&b)).transpose()
    }

    pub fn pop(&self, key: &K, propagate: bool) -> Result<Option<V>> {
        self.delete(key, propagate)
    }

    /// `pop(key, default)` from spec.md §6.
    pub fn pop_or(&self, key: &K, default: V, propagate: bool) -> Result<V> {
        Ok(self.pop(key, propagate)?.unwrap_or(default))
    }

    pub fn setdefault(&self, key: K, default: V, propagate: bool) -> Result<V> {
        if let Some(existing) = self.get(&key)? {
            return Ok(existing);
        }
        self.set(key, default.clone(), propagate)?;
        Ok(default)
    }

    /// Removes every entry in the cache. Each removed key is reported as a
    /// `DEL` if `propagate` (see [`Self::delete`] for why this posture is
    /// unconditional).
    pub fn clear(&self, propagate: bool) -> Result<()> {
        let keys = self.registry.with_variant(&self.name, |c| c.keys());
        for kb in keys {
            self.registry.with_variant(&self.name, |c| {
                c.remove(&kb);
            });
            if propagate {
                self.registry.enqueue_delete(&self.name, kb);
            }
        }
        Ok(())
    }

    /// Evicts one entry per the cache's replacement policy and returns it,
    /// reported as a `DEL` if `propagate` — the original's `popitem()`
    /// always multicasts (its `pop()` default), so this rendition's default
    /// call site (the registry's own capacity-eviction path) never calls
    /// this directly; this is the caller-invoked diagnostic/maintenance
    /// form.
    pub fn pop_item(&self, propagate: bool) -> Result<Option<(K, V)>> {
        let evicted = self.registry.with_variant(&self.name, |c| c.pop_evict());
        let Some((kb, vb)) = evicted else { return Ok(None) };
        if propagate {
            self.registry.enqueue_delete(&self.name, kb.clone());
        }
        Ok(Some((decode(&kb)?, decode(&vb)?)))
    }

    pub fn keys(&self) -> Result<Vec<K>> {
        let raw = self.registry.with_variant(&self.name, |c| c.keys());
        raw.iter().map(|kb| decode(kb)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(config: Config) -> (CacheRegistry, crossbeam_channel::Receiver<OperationRecord>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (CacheRegistry::new(&config, tx), rx)
    }

    #[test]
    fn first_access_creates_the_cache_and_announces_ini() {
        let (registry, rx) = registry(Config::default());
        let cache: TypedCache<String, i32> = registry.get_cache(Some("orders")).unwrap();
        assert_eq!(cache.name(), "orders");
        let record = rx.try_recv().unwrap();
        assert_eq!(record.opcode, OpCode::Ini);
        assert_eq!(record.namespace.as_deref(), Some("orders"));

        // A second access does not announce again.
        let _cache2: TypedCache<String, i32> = registry.get_cache(Some("orders")).unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn empty_name_is_rejected() {
        let (registry, _rx) = registry(Config::default());
        let result: Result<TypedCache<String, i32>> = registry.get_cache(Some(""));
        assert!(result.is_err());
    }

    #[test]
    fn absent_name_defaults_to_default() {
        let (registry, _rx) = registry(Config::default());
        let cache: TypedCache<String, i32> = registry.get_cache(None).unwrap();
        assert_eq!(cache.name(), "default");
    }

    #[test]
    fn set_with_propagate_enqueues_the_postures_opcode() {
        let mut config = Config::default();
        config.posture = CoherencePosture::Neutral;
        let (registry, rx) = registry(config);
        let cache: TypedCache<String, i32> = registry.get_cache(Some("ns")).unwrap();
        let _ = rx.try_recv(); // drain INI

        cache.set("x".to_string(), 42, true).unwrap();
        let record = rx.try_recv().unwrap();
        assert_eq!(record.opcode, OpCode::Upd);
        assert!(record.value.is_some());

        assert_eq!(cache.get(&"x".to_string()).unwrap(), Some(42));
    }

    #[test]
    fn set_without_propagate_does_not_enqueue() {
        let (registry, rx) = registry(Config::default());
        let cache: TypedCache<String, i32> = registry.get_cache(Some("ns")).unwrap();
        let _ = rx.try_recv(); // drain INI
        cache.set("x".to_string(), 1, false).unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn delete_always_sends_del_regardless_of_posture() {
        let mut config = Config::default();
        config.posture = CoherencePosture::Optimistic;
        let (registry, rx) = registry(config);
        let cache: TypedCache<String, i32> = registry.get_cache(Some("ns")).unwrap();
        let _ = rx.try_recv(); // drain INI
        cache.set("x".to_string(), 1, false).unwrap();
        cache.delete(&"x".to_string(), true).unwrap();
        let record = rx.try_recv().unwrap();
        assert_eq!(record.opcode, OpCode::Del);
        assert!(record.value.is_none());
    }

    #[test]
    fn setdefault_only_sets_when_key_absent() {
        let (registry, _rx) = registry(Config::default());
        let cache: TypedCache<String, i32> = registry.get_cache(Some("ns")).unwrap();
        assert_eq!(cache.setdefault("x".to_string(), 7, false).unwrap(), 7);
        assert_eq!(cache.setdefault("x".to_string(), 99, false).unwrap(), 7);
    }

    #[test]
    fn delete_of_missing_key_is_a_noop() {
        let (registry, _rx) = registry(Config::default());
        let cache: TypedCache<String, i32> = registry.get_cache(Some("ns")).unwrap();
        assert_eq!(cache.delete(&"missing".to_string(), false).unwrap(), None);
    }

    #[test]
    fn zero_capacity_cache_rejects_every_set() {
        let mut config = Config::default();
        config.max_size = 0;
        let (registry, _rx) = registry(config);
        let cache: TypedCache<String, i32> = registry.get_cache(Some("ns")).unwrap();
        assert!(cache.set("x".to_string(), 1, false).is_err());
        assert_eq!(cache.len(), 0);
    }
}
