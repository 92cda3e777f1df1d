//! Cache registry, outbound/inbound engines, membership, and housekeeper
//! (spec.md §4, components C3–C6).
//!
//! [`Coordinator`] is the process-level owner spec.md §9 asks for: it joins
//! the multicast group, builds the shared registry/membership/pending
//! tables, and spawns the three background workers. Everything else in this
//! crate is a collaborator it wires together; `mccache-demo` (or any other
//! embedding application) only ever touches a `Coordinator`.

mod clock;
mod housekeeper;
mod inbound;
mod membership;
mod outbound;
mod pending;
mod registry;
mod variant;

pub use clock::now_ns;
pub use housekeeper::Housekeeper;
pub use inbound::InboundEngine;
pub use membership::{Member, MembershipTable};
pub use outbound::OutboundEngine;
pub use pending::{PeerAckState, PendingAck, PendingAckTable, PendingKey, DEFAULT_RETRY_BUDGET};
pub use registry::{CacheRegistry, OutboundSender, TypedCache};
pub use variant::CacheVariant;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use mccache_admin::Config;
use mccache_base::Result;
use mccache_transport::MulticastTransport;
use mccache_wire::{OpCode, OperationRecord};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;

/// How long the shutdown path sleeps after enqueuing `BYE`, giving the
/// outbound worker a chance to drain it onto the wire before the process
/// exits (spec.md §4.6 "sleeps briefly (≈300 ms)").
const SHUTDOWN_DRAIN: Duration = Duration::from_millis(300);

/// A joined cluster member: the registry application code reads and writes
/// through, plus the three background workers that keep it coherent with
/// its peers (spec.md §9 "a process-level coordinator created during
/// start-up and torn down via an exit hook").
///
/// Dropping the last `Coordinator` runs the same shutdown sequence an
/// explicit [`Coordinator::shutdown`] call does — the original's `atexit`
/// hook, reproduced as `Drop` rather than a process-exit callback so it also
/// fires correctly for a `Coordinator` that's discarded mid-test.
pub struct Coordinator {
    registry: CacheRegistry,
    membership: MembershipTable,
    pending: PendingAckTable,
    outbound_tx: OutboundSender,
    shutdown: Arc<AtomicBool>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    torn_down: AtomicBool,
}

impl Coordinator {
    /// Joins the multicast group described by `config` and starts the
    /// outbound (C4), inbound (C5), and housekeeper (C6) workers. Returns an
    /// `Arc` since every worker thread and every [`TypedCache`] handed out
    /// by [`Self::get_cache`] needs to outlive the call that created them.
    pub fn start(config: &Config) -> Result<Arc<Self>> {
        let transport = Arc::new(MulticastTransport::join(config.mc_group, config.mc_port, config.mc_hops)?);
        let (tx, rx) = crossbeam_channel::unbounded();
        let registry = CacheRegistry::new(config, tx.clone());
        let membership = MembershipTable::new();
        let pending = PendingAckTable::new();
        let shutdown = Arc::new(AtomicBool::new(false));

        let outbound = OutboundEngine::new(
            rx,
            transport.clone(),
            membership.clone(),
            pending.clone(),
            config.posture,
            config.mtu,
            shutdown.clone(),
        );
        let outbound_handle = thread::Builder::new()
            .name("mccache-outbound".into())
            .spawn(move || outbound.run())
            .map_err(mccache_base::Error::new)?;

        let inbound = InboundEngine::new(
            transport.clone(),
            registry.clone(),
            membership.clone(),
            pending.clone(),
            tx.clone(),
            config.mtu,
            shutdown.clone(),
        );
        let reassembler = inbound.reassembler_handle();
        let inbound_handle = thread::Builder::new()
            .name("mccache-inbound".into())
            .spawn(move || inbound.run())
            .map_err(mccache_base::Error::new)?;

        let slots = if config.house_keeping_slots.is_empty() {
            mccache_admin::DEFAULT_SLOTS_SECS.iter().copied().map(Duration::from_secs).collect()
        } else {
            config.house_keeping_slots.clone()
        };
        let housekeeper = Housekeeper::new(transport, pending.clone(), membership.clone(), reassembler, slots, shutdown.clone());
        let housekeeper_handle = thread::Builder::new()
            .name("mccache-housekeeper".into())
            .spawn(move || housekeeper.run())
            .map_err(mccache_base::Error::new)?;

        info!(target: "mccache", posture = ?config.posture, group = %config.mc_group, port = config.mc_port, "mccache coordinator started");

        Ok(Arc::new(Coordinator {
            registry,
            membership,
            pending,
            outbound_tx: tx,
            shutdown,
            workers: Mutex::new(vec![outbound_handle, inbound_handle, housekeeper_handle]),
            torn_down: AtomicBool::new(false),
        }))
    }

    /// A typed handle onto `name`'s cache (spec.md §6 cache contract),
    /// creating it with this process's default eviction variant if it's the
    /// first access. `name: None` resolves to `"default"`.
    pub fn get_cache<K, V>(&self, name: Option<&str>) -> Result<TypedCache<K, V>>
    where
        K: Serialize + DeserializeOwned + Clone,
        V: Serialize + DeserializeOwned + Clone,
    {
        self.registry.get_cache(name)
    }

    /// Like [`Self::get_cache`], but installs `variant` as the cache's
    /// initial backing store if this is the first access (spec.md §4.3's
    /// "caller may supply a preconstructed instance of a different
    /// variant").
    pub fn get_cache_with<K, V>(&self, name: Option<&str>, variant: CacheVariant) -> Result<TypedCache<K, V>>
    where
        K: Serialize + DeserializeOwned + Clone,
        V: Serialize + DeserializeOwned + Clone,
    {
        self.registry.get_cache_with(name, variant)
    }

    /// Every registered cache name on this process, for diagnostics.
    pub fn cache_names(&self) -> Vec<String> {
        self.registry.names()
    }

    /// The live peer set this process has observed (spec.md §3 "membership
    /// table").
    pub fn peers(&self) -> Vec<std::net::SocketAddr> {
        self.membership.peers()
    }

    pub fn peer_count(&self) -> usize {
        self.membership.len()
    }

    /// Mutations still awaiting acknowledgement from at least one peer —
    /// always empty outside pessimistic posture.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Announces this process to the group (`NEW`). Not required for
    /// correctness — membership is inferred from any received traffic — but
    /// lets a freshly joined, otherwise-silent member be discovered
    /// immediately instead of waiting for its first mutation.
    pub fn announce(&self) {
        let record = OperationRecord::new(OpCode::New, now_ns(), None, None, None);
        let _ = self.outbound_tx.send(record);
    }

    /// Runs the shutdown sequence: enqueues `BYE`, gives the outbound
    /// worker [`SHUTDOWN_DRAIN`] to flush it onto the wire, then signals and
    /// joins every worker thread. Idempotent — safe to call explicitly and
    /// then let `Drop` run again, or to call from multiple threads.
    pub fn shutdown(&self) {
        if self.torn_down.swap(true, Ordering::AcqRel) {
            return;
        }
        let record = OperationRecord::new(OpCode::Bye, now_ns(), None, None, None);
        let _ = self.outbound_tx.send(record);
        thread::sleep(SHUTDOWN_DRAIN);

        self.shutdown.store(true, Ordering::Release);
        let mut workers = self.workers.lock().expect("worker list mutex poisoned");
        for handle in workers.drain(..) {
            let _ = handle.join();
        }
        info!(target: "mccache", "mccache coordinator shut down");
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn free_config() -> Config {
        let mut config = Config::default();
        // Port 0 lets each test bind an independent ephemeral port rather
        // than contending over 4000, mirroring the pattern already used in
        // mccache-transport's own socket tests.
        config.mc_port = 0;
        config
    }

    #[test]
    fn start_joins_and_shuts_down_cleanly() {
        let coordinator = Coordinator::start(&free_config()).expect("coordinator starts");
        assert_eq!(coordinator.peer_count(), 0);
        assert_eq!(coordinator.pending_count(), 0);
        coordinator.shutdown();
        // A second call must not panic or double-join.
        coordinator.shutdown();
    }

    #[test]
    fn get_cache_round_trips_a_value_locally() {
        let coordinator = Coordinator::start(&free_config()).expect("coordinator starts");
        let cache: TypedCache<String, i32> = coordinator.get_cache(Some("orders")).expect("cache handle");
        cache.set("a".to_string(), 1, false).expect("set");
        assert_eq!(cache.get(&"a".to_string()).unwrap(), Some(1));
        assert_eq!(coordinator.cache_names(), vec!["orders".to_string()]);
        coordinator.shutdown();
    }
}
