//! Multicast socket layer (spec.md §4.2).
//!
//! Owns the only two sockets a member needs: one to fan fragments out to the
//! group, one bound to the group to receive them. Knows nothing about
//! framing, retries, or cache content — `mccache-wire` encodes the bytes,
//! `mccache-core` decides when to send them.

mod socket;
mod whitelist;

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use mccache_base::Result;
pub use whitelist::{is_whitelisted, validate_or_fallback, DEFAULT_MULTICAST_IP};

/// A joined multicast group, ready to send fragments into and receive them
/// from.
pub struct MulticastTransport {
    sender: socket2::Socket,
    listener: socket2::Socket,
    group: SocketAddr,
}

impl MulticastTransport {
    /// Opens the sender and listener sockets and joins `group:port` on the
    /// listener. `hops` is the multicast TTL (IPv4) / hop limit (IPv6),
    /// `MCCACHE_MULTICAST_HOPS` in spec.md §6.
    pub fn join(group: IpAddr, port: u16, hops: u32) -> Result<Self> {
        let sender = socket::open_sender(hops, group.is_ipv6())?;
        let listener = socket::open_listener(group, port)?;
        Ok(Self {
            sender,
            listener,
            group: SocketAddr::new(group, port),
        })
    }

    /// Sends one datagram into the group. Callers (the outbound engine) are
    /// responsible for the redundant-send schedule spec.md §4.4 describes —
    /// this is a single fire-and-forget send.
    pub fn send(&self, datagram: &[u8]) -> Result<usize> {
        Ok(self.sender.send_to(datagram, &self.group.into())?)
    }

    /// Blocks until a datagram arrives, returning its bytes and the sender's
    /// address. `mtu` bounds the read buffer; a datagram larger than that
    /// is truncated by the kernel, which is the same failure mode as a
    /// genuinely oversized fragment and is handled the same way downstream
    /// (the fragment header won't parse, or the reassembled length won't
    /// match, and the datagram is dropped).
    pub fn recv(&self, mtu: usize) -> Result<(Vec<u8>, SocketAddr)> {
        let mut buf = vec![std::mem::MaybeUninit::new(0u8); mtu];
        let (n, sender) = self.listener.recv_from(&mut buf)?;
        let bytes: Vec<u8> = buf[..n].iter().map(|b| unsafe { b.assume_init() }).collect();
        let sender = sender
            .as_socket()
            .ok_or_else(|| mccache_base::err("received datagram from a non-IP socket address"))?;
        Ok((bytes, sender))
    }

    /// Sets the listener's receive timeout so the inbound engine's loop can
    /// wake periodically to check a shutdown flag rather than blocking
    /// forever (spec.md §5, graceful shutdown).
    pub fn set_recv_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        Ok(self.listener.set_read_timeout(timeout)?)
    }

    /// The sender socket's local address, as it appears to peers in
    /// `recv_from`. Valid as soon as the transport is joined — `open_sender`
    /// binds the sender to an ephemeral port eagerly rather than leaving the
    /// OS to assign one on first `sendto`. Used by the inbound engine to
    /// recognize and discard this process's own broadcasts.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.sender
            .local_addr()?
            .as_socket()
            .ok_or_else(|| mccache_base::err("sender socket has no IP local address"))
    }
}
