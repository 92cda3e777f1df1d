use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::Mutex;

/// One mutation awaiting acknowledgement from every known peer, under
/// pessimistic posture (spec.md §4.4, §4.6).
#[derive(Clone, Debug)]
pub struct PendingAck {
    /// The fragments that made up the original send, kept so a `NAK` or a
    /// retry can be answered by resending rather than re-encoding.
    pub fragments: Vec<Vec<u8>>,
    /// Installed at creation; bumped on every retry.
    pub last_sent_ns: i64,
    /// Per-peer outstanding acknowledgement state.
    pub peers: HashMap<SocketAddr, PeerAckState>,
}

#[derive(Clone, Copy, Debug)]
pub struct PeerAckState {
    pub acked: bool,
    /// Retries left beyond the original send (spec.md §4.6: "two retries
    /// beyond the original send before giving up").
    pub tries_remaining: u32,
}

pub const DEFAULT_RETRY_BUDGET: u32 = 2;

/// Key identifying one pending mutation: the namespace it targets, the
/// key it mutates, and the timestamp it was recorded under (spec.md §3's
/// "(namespace, key, timestamp_ns)" pending-ack identity — the same
/// timestamp that's on the wire, so an incoming `ACK` can be matched back
/// to the send it acknowledges without any extra correlation id).
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct PendingKey {
    pub namespace: String,
    pub key: Vec<u8>,
    pub timestamp_ns: i64,
}

/// Mutations sent under pessimistic posture, awaiting peer acknowledgement
/// (spec.md §3 "pending-ack table", §4.4, §4.6).
#[derive(Clone, Default)]
pub struct PendingAckTable(Arc<Mutex<HashMap<PendingKey, PendingAck>>>);

impl PendingAckTable {
    pub fn new() -> Self {
        PendingAckTable(Arc::new(Mutex::new(HashMap::new())))
    }

    /// Registers a freshly sent mutation as awaiting acknowledgement from
    /// `peers` (the membership table's snapshot at send time).
    pub fn track(&self, key: PendingKey, fragments: Vec<Vec<u8>>, peers: &[SocketAddr], now_ns: i64) {
        let peer_states = peers
            .iter()
            .map(|p| (*p, PeerAckState { acked: false, tries_remaining: DEFAULT_RETRY_BUDGET }))
            .collect();
        self.0.lock().insert(key, PendingAck { fragments, last_sent_ns: now_ns, peers: peer_states });
    }

    /// Marks `peer` as having acknowledged `key`. Returns `true` if every
    /// peer has now acknowledged (the entry should be dropped).
    pub fn acknowledge(&self, key: &PendingKey, peer: SocketAddr) -> bool {
        let mut table = self.0.lock();
        let Some(entry) = table.get_mut(key) else { return false };
        if let Some(state) = entry.peers.get_mut(&peer) {
            state.acked = true;
        }
        let fully_acked = entry.peers.values().all(|s| s.acked);
        if fully_acked {
            table.remove(key);
        }
        fully_acked
    }

    /// A new peer joined after this mutation was sent; it also needs to
    /// acknowledge it.
    pub fn add_peer(&self, key: &PendingKey, peer: SocketAddr) {
        let mut table = self.0.lock();
        if let Some(entry) = table.get_mut(key) {
            entry.peers.entry(peer).or_insert(PeerAckState { acked: false, tries_remaining: DEFAULT_RETRY_BUDGET });
        }
    }

    pub fn remove(&self, key: &PendingKey) {
        self.0.lock().remove(key);
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every entry whose `last_sent_ns` is older than `max_age_ns` — due for
    /// the housekeeper's retry-or-expire sweep (spec.md §4.6). For each,
    /// unacked peers with retries remaining should be resent to and have
    /// their `tries_remaining` decremented; unacked peers with no retries
    /// left should be dropped from membership.
    pub fn due_for_retry(&self, max_age_ns: i64, now_ns: i64) -> Vec<(PendingKey, PendingAck)> {
        self.0
            .lock()
            .iter()
            .filter(|(_, ack)| now_ns.saturating_sub(ack.last_sent_ns) >= max_age_ns)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Decrements every unacked peer's retry budget for `key` and bumps
    /// `last_sent_ns`, returning the peers that still have retries left
    /// (the ones to actually resend to) and the peers whose budget just ran
    /// out (to evict from membership).
    pub fn retry(&self, key: &PendingKey, now_ns: i64) -> (Vec<SocketAddr>, Vec<SocketAddr>) {
        let mut table = self.0.lock();
        let Some(entry) = table.get_mut(key) else { return (Vec::new(), Vec::new()) };
        entry.last_sent_ns = now_ns;
        let mut to_resend = Vec::new();
        let mut exhausted = Vec::new();
        for (peer, state) in entry.peers.iter_mut() {
            if state.acked {
                continue;
            }
            if state.tries_remaining == 0 {
                exhausted.push(*peer);
                continue;
            }
            state.tries_remaining -= 1;
            to_resend.push(*peer);
        }
        for peer in &exhausted {
            entry.peers.remove(peer);
        }
        if entry.peers.is_empty() {
            table.remove(key);
        }
        (to_resend, exhausted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{port}").parse().unwrap()
    }

    fn key() -> PendingKey {
        PendingKey { namespace: "ns".into(), key: b"k".to_vec(), timestamp_ns: 1 }
    }

    #[test]
    fn fully_acknowledged_entry_is_dropped() {
        let table = PendingAckTable::new();
        table.track(key(), vec![b"frag".to_vec()], &[addr(1), addr(2)], 0);
        assert!(!table.acknowledge(&key(), addr(1)));
        assert_eq!(table.len(), 1);
        assert!(table.acknowledge(&key(), addr(2)));
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn retry_decrements_budget_and_exhausts_eventually() {
        let table = PendingAckTable::new();
        table.track(key(), vec![], &[addr(1)], 0);
        let (resend, exhausted) = table.retry(&key(), 1);
        assert_eq!(resend, vec![addr(1)]);
        assert!(exhausted.is_empty());
        let (resend, exhausted) = table.retry(&key(), 2);
        assert_eq!(resend, vec![addr(1)]);
        assert!(exhausted.is_empty());
        let (resend, exhausted) = table.retry(&key(), 3);
        assert!(resend.is_empty());
        assert_eq!(exhausted, vec![addr(1)]);
    }

    #[test]
    fn entry_is_dropped_once_every_peer_is_exhausted() {
        let table = PendingAckTable::new();
        table.track(key(), vec![], &[addr(1)], 0);
        table.retry(&key(), 1);
        table.retry(&key(), 2);
        assert_eq!(table.len(), 1);
        let (resend, exhausted) = table.retry(&key(), 3);
        assert!(resend.is_empty());
        assert_eq!(exhausted, vec![addr(1)]);
        assert_eq!(table.len(), 0, "entry with no peers left should be removed, not kept as empty pending work");
    }

    #[test]
    fn due_for_retry_respects_max_age() {
        let table = PendingAckTable::new();
        table.track(key(), vec![], &[addr(1)], 0);
        assert!(table.due_for_retry(1_000, 500).is_empty());
        assert_eq!(table.due_for_retry(1_000, 1_000).len(), 1);
    }
}
