use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use mccache_transport::MulticastTransport;
use mccache_wire::{Reassembler, DEFAULT_REASSEMBLY_TTL};
use tracing::{info, warn};

use crate::clock::now_ns;
use crate::membership::MembershipTable;
use crate::outbound::OutboundEngine;
use crate::pending::PendingAckTable;

/// Age past which an unacknowledged send is due for a retry (one second,
/// matching the interval the original's retry sweep — left unfinished there
/// — was designed around).
const RETRY_AGE: Duration = Duration::from_nanos(1_000_000_000);

/// C6: periodically retries or gives up on unacknowledged sends, sweeps
/// stalled fragment reassembly buffers, and reports a liveness heartbeat.
///
/// The wake cadence is drawn from `house_keeping_slots` (spec.md §4.6, §6
/// `MCCACHE_SLOTS`) by a coarse backoff: the housekeeper wakes on the
/// fastest slot, and on any tick that finds nothing to retry or sweep it
/// steps to the next (slower) slot, capped at the last one configured. A
/// tick that does find work to do resets it back to the fastest slot, since
/// an active cluster benefits from tighter ack latency. Spec.md §9(a) notes
/// the original's retry sweep was left unfinished and treats this schedule
/// as advisory — this is this rendition's resolution, exercised by
/// `backoff_advances_on_idle_ticks_and_resets_on_activity` below.
pub struct Housekeeper {
    transport: Arc<MulticastTransport>,
    pending: PendingAckTable,
    membership: MembershipTable,
    /// Shared with [`crate::inbound::InboundEngine`] (see
    /// [`crate::inbound::InboundEngine::reassembler_handle`]), which feeds
    /// it on its own thread; this lock is only ever held briefly here, for
    /// one sweep at a time.
    reassembly_sweep: Arc<Mutex<Reassembler>>,
    /// Cadence slots, fastest first. Never empty — [`crate::Coordinator`]
    /// falls back to [`mccache_admin::DEFAULT_SLOTS_SECS`] if configuration
    /// somehow produced an empty list.
    slots: Vec<Duration>,
    shutdown: Arc<AtomicBool>,
}

impl Housekeeper {
    pub fn new(
        transport: Arc<MulticastTransport>,
        pending: PendingAckTable,
        membership: MembershipTable,
        reassembly_sweep: Arc<Mutex<Reassembler>>,
        slots: Vec<Duration>,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            transport,
            pending,
            membership,
            reassembly_sweep,
            slots,
            shutdown,
        }
    }

    fn slot(&self, idx: usize) -> Duration {
        self.slots[idx.min(self.slots.len() - 1)]
    }

    /// Runs until the shutdown flag is set. Spawn this on its own thread
    /// (see [`crate::Coordinator::start`]).
    pub fn run(self) {
        info!(target: "mccache", slots = ?self.slots, "housekeeper is ready");
        let mut idx = 0usize;
        while !self.shutdown.load(Ordering::Acquire) {
            std::thread::sleep(self.slot(idx));
            if self.shutdown.load(Ordering::Acquire) {
                break;
            }
            let did_pending_work = self.sweep_pending();
            let did_reassembly_work = self.sweep_reassembly();
            idx = if did_pending_work || did_reassembly_work { 0 } else { idx + 1 };
        }
    }

    /// Returns whether any pending-ack entry was due for a retry this tick.
    fn sweep_pending(&self) -> bool {
        let now = now_ns();
        let due = self.pending.due_for_retry(RETRY_AGE.as_nanos() as i64, now);
        let did_work = !due.is_empty();
        for (key, ack) in due {
            let (resend_to, exhausted) = self.pending.retry(&key, now);
            if !resend_to.is_empty() {
                OutboundEngine::resend(&self.transport, &ack.fragments);
            }
            for peer in exhausted {
                warn!(
                    target: "mccache",
                    namespace = %key.namespace,
                    %peer,
                    "giving up on acknowledgement after exhausting retries"
                );
                self.membership.remove(&peer);
            }
        }
        did_work
    }

    /// Returns whether any stalled reassembly buffer was actually swept.
    fn sweep_reassembly(&self) -> bool {
        let mut reassembler = self.reassembly_sweep.lock().expect("reassembly mutex poisoned");
        let swept = reassembler.sweep(DEFAULT_REASSEMBLY_TTL);
        if swept > 0 {
            warn!(target: "mccache", count = swept, "swept stalled fragment reassembly buffers");
        }
        swept > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pending::PendingKey;
    use std::net::SocketAddr;

    #[test]
    fn retry_age_is_one_second() {
        assert_eq!(RETRY_AGE, Duration::from_secs(1));
    }

    fn addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{port}").parse().unwrap()
    }

    fn housekeeper(slots: Vec<Duration>) -> (Housekeeper, PendingAckTable, MembershipTable) {
        let transport = Arc::new(
            MulticastTransport::join("224.0.0.3".parse().unwrap(), 0, 1).expect("loopback join for test"),
        );
        let pending = PendingAckTable::new();
        let membership = MembershipTable::new();
        let reassembler = Arc::new(Mutex::new(Reassembler::new()));
        let shutdown = Arc::new(AtomicBool::new(false));
        let hk = Housekeeper::new(transport, pending.clone(), membership.clone(), reassembler, slots, shutdown);
        (hk, pending, membership)
    }

    #[test]
    fn slot_index_is_clamped_to_the_last_configured_slot() {
        let (hk, _pending, _membership) = housekeeper(vec![Duration::from_millis(1), Duration::from_millis(2)]);
        assert_eq!(hk.slot(0), Duration::from_millis(1));
        assert_eq!(hk.slot(1), Duration::from_millis(2));
        assert_eq!(hk.slot(5), Duration::from_millis(2));
    }

    #[test]
    fn backoff_advances_on_idle_ticks_and_resets_on_activity() {
        let (hk, pending, _membership) = housekeeper(vec![Duration::from_millis(1)]);
        assert!(!hk.sweep_pending());
        pending.track(PendingKey { namespace: "ns".into(), key: b"k".to_vec(), timestamp_ns: 0 }, vec![], &[addr(1)], 0);
        assert!(hk.sweep_pending());
        assert!(!hk.sweep_pending());
    }
}
