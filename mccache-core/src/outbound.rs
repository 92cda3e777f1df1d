use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use mccache_admin::CoherencePosture;
use mccache_transport::MulticastTransport;
use mccache_wire::{crc_of, encode_message, OpCode, OperationRecord, WireMessage};
use tracing::{debug, warn};

use crate::clock::now_ns;
use crate::membership::MembershipTable;
use crate::pending::{PendingAckTable, PendingKey};

/// How often the outbound loop's blocking receive times out to re-check the
/// shutdown flag when the queue is otherwise idle.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// C4: drains the outbound queue, turns each [`OperationRecord`] into wire
/// fragments, and sends them per the coherence posture's redundancy
/// schedule (spec.md §4.4).
pub struct OutboundEngine {
    queue: Receiver<OperationRecord>,
    transport: Arc<MulticastTransport>,
    membership: MembershipTable,
    pending: PendingAckTable,
    posture: CoherencePosture,
    mtu: usize,
    shutdown: Arc<AtomicBool>,
}

impl OutboundEngine {
    pub fn new(
        queue: Receiver<OperationRecord>,
        transport: Arc<MulticastTransport>,
        membership: MembershipTable,
        pending: PendingAckTable,
        posture: CoherencePosture,
        mtu: usize,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            queue,
            transport,
            membership,
            pending,
            posture,
            mtu,
            shutdown,
        }
    }

    /// Runs until the shutdown flag is set and the queue is drained. Spawn
    /// this on its own thread (see `crate::coordinator`).
    pub fn run(self) {
        loop {
            match self.queue.recv_timeout(POLL_INTERVAL) {
                Ok(record) => self.handle(record),
                Err(RecvTimeoutError::Timeout) => {
                    if self.shutdown.load(Ordering::Acquire) {
                        break;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        // Drain whatever was enqueued (e.g. a trailing BYE) before exiting.
        while let Ok(record) = self.queue.try_recv() {
            self.handle(record);
        }
    }

    fn handle(&self, record: OperationRecord) {
        let carries_value = self.posture.carries_value() && record.value.is_some();
        let crc = if carries_value { record.value.as_deref().map(crc_of) } else { None };
        let value = if carries_value { record.value.clone() } else { None };

        let pending_key = PendingKey {
            namespace: record.namespace.clone().unwrap_or_default(),
            key: record.key.clone().unwrap_or_default(),
            timestamp_ns: record.timestamp_ns,
        };
        // An `ACK` is never itself acknowledged — matching the original's
        // `opc != OpCode.ACK` exclusion — otherwise every acknowledgement
        // would demand one of its own.
        let requires_ack = self.posture.requires_ack() && record.key.is_some() && record.opcode != OpCode::Ack;

        let message = WireMessage::from_record(record, crc, value);
        let fragments = match encode_message(&message, self.mtu) {
            Ok(fragments) => fragments,
            Err(error) => {
                warn!(target: "mccache", ?error, "failed to encode outbound message, dropping");
                return;
            }
        };

        if requires_ack {
            self.pending.track(pending_key, fragments.clone(), &self.membership.peers(), now_ns());
        }

        self.transmit(&fragments);
        for delay in self.posture.send_delays() {
            thread::sleep(*delay);
            self.transmit(&fragments);
        }
    }

    fn transmit(&self, fragments: &[Vec<u8>]) {
        for datagram in fragments {
            if let Err(error) = self.transport.send(datagram) {
                warn!(target: "mccache", ?error, "failed to send datagram");
            }
        }
    }

    /// Resends a pending mutation's fragments once more, for the
    /// housekeeper's retry sweep — the fragments were already built, so
    /// this skips straight to the wire rather than re-running `handle`.
    pub fn resend(transport: &MulticastTransport, fragments: &[Vec<u8>]) {
        for datagram in fragments {
            if let Err(error) = transport.send(datagram) {
                debug!(target: "mccache", ?error, "retry send failed");
            }
        }
    }
}
