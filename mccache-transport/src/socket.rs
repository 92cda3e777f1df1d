use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use mccache_base::{err, Result};
use socket2::{Domain, Protocol, Socket, Type};

/// A socket used only to send fragments into the group — never joined to the
/// multicast group, configured with the posture's hop limit.
///
/// Bound to an ephemeral port (`:0`) on the unspecified address immediately,
/// rather than leaving the bind to happen implicitly on the first `sendto` —
/// a UDP socket's local port isn't assigned until it's bound to *something*,
/// and an explicit eager bind means `Socket::local_addr` is already correct
/// the moment this returns, which the inbound engine relies on to recognize
/// its own broadcasts (see `MulticastTransport::local_addr`).
pub fn open_sender(hops: u32, is_ipv6: bool) -> Result<Socket> {
    let (domain, proto) = if is_ipv6 {
        (Domain::IPV6, Protocol::UDPV6)
    } else {
        (Domain::IPV4, Protocol::UDP)
    };
    let socket = Socket::new(domain, Type::DGRAM, Some(proto))?;
    if is_ipv6 {
        socket.set_multicast_hops_v6(hops)?;
    } else {
        socket.set_multicast_ttl_v4(hops)?;
    }
    let bind_addr: SocketAddr = if is_ipv6 {
        SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0)
    } else {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0)
    };
    socket.bind(&bind_addr.into())?;
    Ok(socket)
}

/// A socket bound to the multicast port and joined to the group, ready to
/// `recv_from`. `SO_REUSEADDR` is set so multiple members on the same host
/// (demos, tests) can bind the same port.
pub fn open_listener(group: IpAddr, port: u16) -> Result<Socket> {
    match group {
        IpAddr::V4(group) => open_listener_v4(group, port),
        IpAddr::V6(group) => open_listener_v6(group, port),
    }
}

fn open_listener_v4(group: Ipv4Addr, port: u16) -> Result<Socket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    let bind_addr: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port);
    socket.bind(&bind_addr.into())?;
    socket
        .join_multicast_v4(&group, &Ipv4Addr::UNSPECIFIED)
        .map_err(|e| err(format!("joining multicast group {group}: {e}")))?;
    Ok(socket)
}

fn open_listener_v6(group: Ipv6Addr, port: u16) -> Result<Socket> {
    let socket = Socket::new(Domain::IPV6, Type::DGRAM, Some(Protocol::UDPV6))?;
    socket.set_reuse_address(true)?;
    let bind_addr: SocketAddr = SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), port);
    socket.bind(&bind_addr.into())?;
    socket
        .join_multicast_v6(&group, 0)
        .map_err(|e| err(format!("joining multicast group {group}: {e}")))?;
    Ok(socket)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn sender_socket_opens_for_ipv4_and_ipv6() {
        assert!(open_sender(1, false).is_ok());
        assert!(open_sender(1, true).is_ok());
    }

    #[test_log::test]
    fn listener_socket_joins_a_whitelisted_group() {
        let group: Ipv4Addr = "224.0.0.3".parse().unwrap();
        // Port 0 lets the OS pick a free one; this only exercises
        // construction + join, not round-trip delivery, which is covered
        // in mccache-core's integration tests over loopback.
        let socket = open_listener(IpAddr::V4(group), 0);
        assert!(socket.is_ok());
    }
}
