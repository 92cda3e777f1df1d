use std::collections::HashMap;
use std::net::IpAddr;
use std::time::{Duration, Instant};

/// First byte of every datagram. Anything that doesn't start with this byte
/// is not a McCache fragment and is dropped before any other interpretation
/// is attempted (spec.md §4.1).
pub const MAGIC_BYTE: u8 = 246;

/// Fragment header wire version. A mismatch here means a peer is speaking a
/// protocol revision this build doesn't understand; such fragments are
/// logged and dropped rather than guessed at.
pub const VERSION: u8 = 1;

/// `magic(1) + version(1) + index(1) + total(1)`, prepended to every
/// datagram ahead of its slice of the encoded payload.
pub const FRAGMENT_HEADER_LEN: usize = 4;

/// The 4-byte header every UDP datagram carries ahead of its payload slice.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FragmentHeader {
    pub magic: u8,
    pub version: u8,
    /// 0-based index of this fragment within the message.
    pub index: u8,
    /// Total number of fragments the message was split into.
    pub total: u8,
}

impl FragmentHeader {
    pub fn new(index: u8, total: u8) -> Self {
        Self {
            magic: MAGIC_BYTE,
            version: VERSION,
            index,
            total,
        }
    }

    pub fn to_bytes(self) -> [u8; FRAGMENT_HEADER_LEN] {
        [self.magic, self.version, self.index, self.total]
    }

    /// Parses the leading 4 bytes of a datagram. Returns `None` if the
    /// datagram is too short, doesn't start with [`MAGIC_BYTE`], or carries
    /// an unsupported [`VERSION`] — all three are silently-ignorable per
    /// spec.md §4.1, the caller decides whether to log.
    pub fn parse(datagram: &[u8]) -> Option<(Self, &[u8])> {
        if datagram.len() < FRAGMENT_HEADER_LEN {
            return None;
        }
        let header = Self {
            magic: datagram[0],
            version: datagram[1],
            index: datagram[2],
            total: datagram[3],
        };
        if header.magic != MAGIC_BYTE || header.version != VERSION {
            return None;
        }
        Some((header, &datagram[FRAGMENT_HEADER_LEN..]))
    }
}

/// Identifies the message a fragment belongs to. The sender's address is
/// part of the key because two members may independently pick the same
/// `(namespace, key, timestamp_ns)` tuple only in the pathological case of
/// clock collision — including the sender rules that out in practice.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct ReassemblyKey {
    pub sender: IpAddr,
    pub namespace: Option<String>,
    pub key: Option<Vec<u8>>,
    pub timestamp_ns: i64,
}

struct PartialMessage {
    total: u8,
    slots: Vec<Option<Vec<u8>>>,
    received: usize,
    first_seen: Instant,
}

impl PartialMessage {
    fn new(total: u8) -> Self {
        Self {
            total,
            slots: vec![None; total as usize],
            received: 0,
            first_seen: Instant::now(),
        }
    }

    fn is_complete(&self) -> bool {
        self.received == self.total as usize
    }

    fn assemble(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for slot in &self.slots {
            if let Some(bytes) = slot {
                out.extend_from_slice(bytes);
            }
        }
        out
    }
}

/// Default age past which a stalled reassembly buffer is swept away.
///
/// The original implementation never reaped these; a long-running member
/// that drops one fragment of a message leaks that buffer for its lifetime.
/// This is small enough in practice to not matter over a process lifetime,
/// but `mccache-core`'s housekeeper sweeps it anyway since it already walks
/// periodically for unrelated reasons.
pub const DEFAULT_REASSEMBLY_TTL: Duration = Duration::from_secs(30);

/// Accumulates datagram fragments into complete payloads.
///
/// One `Reassembler` is owned by the inbound engine (C5) and fed every
/// datagram that parses as a McCache fragment. A message that arrives in a
/// single fragment (`total == 1`) completes immediately without ever
/// occupying a slot in `partial`.
#[derive(Default)]
pub struct Reassembler {
    partial: HashMap<ReassemblyKey, PartialMessage>,
}

impl Reassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one fragment's payload slice for `key`. Returns the assembled
    /// message once every fragment `0..total` has arrived.
    ///
    /// A fragment whose `total` disagrees with an in-flight buffer for the
    /// same key invalidates that buffer and restarts reassembly from this
    /// fragment — the previous sender presumably died mid-send and a new
    /// message reused the same key (spec.md §4.1).
    pub fn feed(&mut self, key: ReassemblyKey, header: FragmentHeader, payload: &[u8]) -> Option<Vec<u8>> {
        if header.total == 1 {
            return Some(payload.to_vec());
        }
        if header.index >= header.total {
            return None;
        }

        let entry = self
            .partial
            .entry(key.clone())
            .and_modify(|msg| {
                if msg.total != header.total {
                    *msg = PartialMessage::new(header.total);
                }
            })
            .or_insert_with(|| PartialMessage::new(header.total));

        let slot = &mut entry.slots[header.index as usize];
        if slot.is_none() {
            entry.received += 1;
        }
        *slot = Some(payload.to_vec());

        if entry.is_complete() {
            let assembled = entry.assemble();
            self.partial.remove(&key);
            Some(assembled)
        } else {
            None
        }
    }

    /// Drops in-flight buffers older than `ttl`. Returns how many were swept.
    pub fn sweep(&mut self, ttl: Duration) -> usize {
        let before = self.partial.len();
        self.partial.retain(|_, msg| msg.first_seen.elapsed() < ttl);
        before - self.partial.len()
    }

    /// Number of messages currently awaiting more fragments.
    pub fn pending_len(&self) -> usize {
        self.partial.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn key() -> ReassemblyKey {
        ReassemblyKey {
            sender: IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            namespace: Some("ns".into()),
            key: Some(b"k".to_vec()),
            timestamp_ns: 42,
        }
    }

    #[test]
    fn header_round_trips_through_bytes() {
        let header = FragmentHeader::new(2, 5);
        let bytes = header.to_bytes();
        let (parsed, rest) = FragmentHeader::parse(&bytes).unwrap();
        assert_eq!(parsed, header);
        assert!(rest.is_empty());
    }

    #[test]
    fn parse_rejects_wrong_magic() {
        let mut bytes = FragmentHeader::new(0, 1).to_bytes();
        bytes[0] = 0;
        assert!(FragmentHeader::parse(&bytes).is_none());
    }

    #[test]
    fn parse_rejects_wrong_version() {
        let mut bytes = FragmentHeader::new(0, 1).to_bytes();
        bytes[1] = VERSION + 1;
        assert!(FragmentHeader::parse(&bytes).is_none());
    }

    #[test]
    fn parse_rejects_short_datagram() {
        assert!(FragmentHeader::parse(&[MAGIC_BYTE, VERSION]).is_none());
    }

    #[test]
    fn single_fragment_message_completes_immediately() {
        let mut reassembler = Reassembler::new();
        let header = FragmentHeader::new(0, 1);
        let out = reassembler.feed(key(), header, b"whole payload");
        assert_eq!(out, Some(b"whole payload".to_vec()));
        assert_eq!(reassembler.pending_len(), 0);
    }

    #[test]
    fn multi_fragment_message_assembles_in_order_regardless_of_arrival_order() {
        let mut reassembler = Reassembler::new();
        let k = key();
        assert_eq!(reassembler.feed(k.clone(), FragmentHeader::new(1, 3), b"BBB"), None);
        assert_eq!(reassembler.pending_len(), 1);
        assert_eq!(reassembler.feed(k.clone(), FragmentHeader::new(2, 3), b"CCC"), None);
        let done = reassembler.feed(k, FragmentHeader::new(0, 3), b"AAA");
        assert_eq!(done, Some(b"AAABBBCCC".to_vec()));
        assert_eq!(reassembler.pending_len(), 0);
    }

    #[test]
    fn mismatched_total_invalidates_the_in_flight_buffer() {
        let mut reassembler = Reassembler::new();
        let k = key();
        reassembler.feed(k.clone(), FragmentHeader::new(0, 3), b"AAA");
        assert_eq!(reassembler.pending_len(), 1);
        // A fresh message under the same key, claiming only 2 fragments,
        // restarts reassembly rather than merging with the stale one.
        let done = reassembler.feed(k.clone(), FragmentHeader::new(0, 2), b"XX");
        assert_eq!(done, None);
        let done = reassembler.feed(k, FragmentHeader::new(1, 2), b"YY");
        assert_eq!(done, Some(b"XXYY".to_vec()));
    }

    #[test]
    fn sweep_evicts_buffers_older_than_ttl() {
        let mut reassembler = Reassembler::new();
        reassembler.feed(key(), FragmentHeader::new(0, 2), b"AAA");
        assert_eq!(reassembler.pending_len(), 1);
        let swept = reassembler.sweep(Duration::from_secs(0));
        assert_eq!(swept, 1);
        assert_eq!(reassembler.pending_len(), 0);
    }
}
