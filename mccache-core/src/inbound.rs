use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use mccache_transport::MulticastTransport;
use mccache_wire::{decode_message, FragmentHeader, InquiryReply, OpCode, OperationRecord, Reassembler, ReassemblyKey};
use tracing::{debug, trace, warn};

use crate::clock::now_ns;
use crate::membership::MembershipTable;
use crate::pending::{PendingAckTable, PendingKey};
use crate::registry::{CacheRegistry, OutboundSender};

/// How often `recv` is allowed to block before re-checking the shutdown
/// flag (spec.md §5).
const RECV_POLL: Duration = Duration::from_millis(200);

/// C5: receives datagrams, reassembles them into [`mccache_wire::WireMessage`]s,
/// and applies or answers them per spec.md §4.5's opcode table.
pub struct InboundEngine {
    transport: Arc<MulticastTransport>,
    registry: CacheRegistry,
    membership: MembershipTable,
    pending: PendingAckTable,
    outbound: OutboundSender,
    mtu: usize,
    self_addr: Option<SocketAddr>,
    shutdown: Arc<AtomicBool>,
    /// Shared with [`crate::housekeeper::Housekeeper`], which periodically
    /// sweeps stalled buffers out of it — this engine only ever feeds it.
    reassembler: Arc<Mutex<Reassembler>>,
}

impl InboundEngine {
    pub fn new(
        transport: Arc<MulticastTransport>,
        registry: CacheRegistry,
        membership: MembershipTable,
        pending: PendingAckTable,
        outbound: OutboundSender,
        mtu: usize,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        let self_addr = transport.local_addr().ok();
        transport.set_recv_timeout(Some(RECV_POLL)).ok();
        Self {
            transport,
            registry,
            membership,
            pending,
            outbound,
            mtu,
            self_addr,
            shutdown,
            reassembler: Arc::new(Mutex::new(Reassembler::new())),
        }
    }

    /// Runs until the shutdown flag is set. Spawn this on its own thread
    /// (see `crate::coordinator`).
    pub fn run(mut self) {
        while !self.shutdown.load(Ordering::Acquire) {
            match self.transport.recv(self.mtu) {
                Ok((datagram, sender)) => self.handle_datagram(&datagram, sender),
                Err(error) => {
                    // A read timeout surfaces as an I/O error on most
                    // platforms; there's no way to distinguish "nothing
                    // arrived" from a real transport failure here beyond
                    // logging and looping back to re-check shutdown.
                    trace!(target: "mccache", ?error, "recv returned without a datagram");
                }
            }
        }
    }

    fn handle_datagram(&mut self, datagram: &[u8], sender: SocketAddr) {
        if self.self_addr == Some(sender) {
            return;
        }

        let Some((header, payload)) = FragmentHeader::parse(datagram) else {
            debug!(target: "mccache", %sender, "dropping datagram that isn't a McCache fragment");
            return;
        };

        // The fragment header carries no namespace/key/timestamp of its own
        // — those live inside the encoded payload, unavailable until
        // reassembly completes — so this keys purely on the sender's IP.
        // That's only safe because one sender has at most one fragmented
        // message in flight at a time (the outbound engine sends one
        // record's fragments to completion before dequeuing the next), so
        // there's nothing for a second in-flight message to collide with.
        let partial_key = ReassemblyKey {
            sender: sender.ip(),
            namespace: None,
            key: None,
            timestamp_ns: 0,
        };
        let Some(assembled) = self.reassembler.lock().expect("reassembler mutex poisoned").feed(partial_key, header, payload) else {
            return;
        };

        let message = match decode_message(&assembled) {
            Ok(message) => message,
            Err(error) => {
                warn!(target: "mccache", ?error, %sender, "failed to decode reassembled message");
                return;
            }
        };

        let is_new_peer = self.membership.observe(sender, now_ns());
        if is_new_peer {
            debug!(target: "mccache", %sender, "new member observed");
        }

        match message.opcode {
            OpCode::Put | OpCode::Upd => {
                let (Some(namespace), Some(key), Some(value)) = (&message.namespace, &message.key, &message.value)
                else {
                    return;
                };
                self.registry.apply_remote_put(namespace, key.clone(), value.clone());
                self.ack(namespace.clone(), key.clone(), message.timestamp_ns);
            }
            OpCode::Del => {
                let (Some(namespace), Some(key)) = (&message.namespace, &message.key) else { return };
                self.registry.apply_remote_del(namespace, key);
                self.ack(namespace.clone(), key.clone(), message.timestamp_ns);
            }
            OpCode::Ack => {
                if let (Some(namespace), Some(key)) = (&message.namespace, &message.key) {
                    let pending_key =
                        PendingKey { namespace: namespace.clone(), key: key.clone(), timestamp_ns: message.timestamp_ns };
                    self.pending.acknowledge(&pending_key, sender);
                }
            }
            OpCode::Bye => {
                self.membership.remove(&sender);
            }
            OpCode::New => {
                // Membership was already updated above; nothing else to do.
            }
            OpCode::Ini => {
                if let Some(namespace) = &message.namespace {
                    self.registry.ensure_cache(namespace);
                }
            }
            OpCode::Inq => {
                // A local diagnostic dump, never a network reply — mirrors
                // the original's debug-only log of key/crc state.
                let Some(namespace) = &message.namespace else { return };
                let reply = match &message.key {
                    Some(key) => self.registry.crc_of_key(namespace, key).map(|crc| InquiryReply::One { key: key.clone(), crc }),
                    None => Some(InquiryReply::All { crcs: self.registry.crc_map(namespace) }),
                };
                debug!(target: "mccache", %sender, %namespace, ?reply, "received INQ");
            }
            OpCode::Req | OpCode::Nak => {
                // A peer is asking for a fragment or key to be resent.
                // Without the original fragments cached outside the
                // pending-ack table there's nothing to resend for a
                // non-pessimistic posture; pessimistic-posture resends are
                // driven by the housekeeper's own retry sweep instead.
                trace!(target: "mccache", %sender, opcode = ?message.opcode, "received retransmission request");
            }
            OpCode::Err | OpCode::Nop | OpCode::Qry | OpCode::Rst => {
                trace!(target: "mccache", %sender, opcode = ?message.opcode, "received opcode with no local effect");
            }
        }
    }

    /// Acknowledges a received `PUT`/`UPD`/`DEL`, unconditionally and
    /// regardless of this process's own posture — every member acks every
    /// mutation it applies, matching the original's `_decode_message`.
    fn ack(&self, namespace: String, key: Vec<u8>, timestamp_ns: i64) {
        let record = OperationRecord::new(OpCode::Ack, timestamp_ns, Some(namespace), Some(key), None);
        let _ = self.outbound.send(record);
    }

    /// A clone of the handle this engine feeds fragments into — the
    /// housekeeper locks the same [`Reassembler`] periodically to sweep
    /// buffers stalled by a peer that died mid-send (spec.md §4.6).
    pub fn reassembler_handle(&self) -> Arc<Mutex<Reassembler>> {
        self.reassembler.clone()
    }
}
