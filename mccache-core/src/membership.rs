use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::Mutex;

/// What's known about one peer.
#[derive(Clone, Debug)]
pub struct Member {
    /// Wall-clock nanoseconds (see [`crate::clock::now_ns`]) this peer was
    /// first observed.
    pub first_seen_ns: i64,
    /// Wall-clock nanoseconds this peer was last heard from (any opcode).
    pub last_seen_ns: i64,
}

/// The live set of peers this process has heard from, keyed by the sending
/// socket's full address (spec.md §3 "membership table").
///
/// The original keys membership by sender IP alone, which collapses every
/// process on one host to a single entry — harmless on a real LAN cluster
/// (one process per host) but wrong for same-host multi-process testing,
/// where it makes every process after the first look like a re-announcement
/// of the one peer already seen. This rendition keys by the full
/// `SocketAddr` (IP and the sender's ephemeral source port) instead, which
/// generalizes cleanly to both deployments and is the `SocketAddr` a
/// `recv_from` already hands back — see DESIGN.md.
#[derive(Clone, Default)]
pub struct MembershipTable(Arc<Mutex<HashMap<SocketAddr, Member>>>);

impl MembershipTable {
    pub fn new() -> Self {
        MembershipTable(Arc::new(Mutex::new(HashMap::new())))
    }

    /// Records that `peer` was just heard from, creating a new entry (with
    /// `first_seen_ns == last_seen_ns == now_ns`) the first time. Returns
    /// `true` if this is a newly observed peer.
    pub fn observe(&self, peer: SocketAddr, now_ns: i64) -> bool {
        let mut table = self.0.lock();
        match table.get_mut(&peer) {
            Some(member) => {
                member.last_seen_ns = now_ns;
                false
            }
            None => {
                table.insert(peer, Member { first_seen_ns: now_ns, last_seen_ns: now_ns });
                true
            }
        }
    }

    /// Drops a peer that announced `BYE` or whose retries have been
    /// exhausted by the housekeeper.
    pub fn remove(&self, peer: &SocketAddr) -> bool {
        self.0.lock().remove(peer).is_some()
    }

    pub fn contains(&self, peer: &SocketAddr) -> bool {
        self.0.lock().contains_key(peer)
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A snapshot of every known peer, for the outbound engine's per-peer
    /// redundancy fan-out and the housekeeper's idle-peer sweep.
    pub fn peers(&self) -> Vec<SocketAddr> {
        self.0.lock().keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{port}").parse().unwrap()
    }

    #[test]
    fn first_observation_is_reported_as_new() {
        let table = MembershipTable::new();
        assert!(table.observe(addr(9000), 1));
        assert!(!table.observe(addr(9000), 2));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn distinct_ports_on_the_same_host_are_distinct_members() {
        let table = MembershipTable::new();
        table.observe(addr(9000), 1);
        table.observe(addr(9001), 1);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn remove_drops_the_member() {
        let table = MembershipTable::new();
        table.observe(addr(9000), 1);
        assert!(table.remove(&addr(9000)));
        assert!(!table.contains(&addr(9000)));
        assert!(!table.remove(&addr(9000)));
    }
}
