//! Bounded eviction cache variants (spec.md §4.3).
//!
//! Each variant is an independent implementation of [`EvictingCache`], not a
//! shared base class with virtual hooks — the original's `cachetools`-style
//! inheritance tree collapses naturally into one trait plus one struct per
//! policy once Python's duck-typed `popitem` override becomes a typed trait
//! method.

mod cache;
mod fifo;
mod lfu;
mod lru;
mod mru;
mod rr;
mod tlru;
mod ttl;

pub use cache::EvictingCache;
pub use fifo::FifoCache;
pub use lfu::LfuCache;
pub use lru::LruCache;
pub use mru::MruCache;
pub use rr::RrCache;
pub use tlru::TlruCache;
pub use ttl::TtlCache;
