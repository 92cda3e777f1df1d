use mccache_base::{err, Result};

use crate::fragment::{FragmentHeader, FRAGMENT_HEADER_LEN};
use crate::message::WireMessage;

/// Serializes a [`WireMessage`] with `rmp_serde` and splits the result into
/// fragments no larger than `mtu - 4` bytes, each prefixed with its
/// [`FragmentHeader`] and ready to hand to the transport layer as-is
/// (spec.md §4.1).
///
/// `mtu` must leave room for the header; callers pass the configured
/// datagram MTU (`MCCACHE_MTU`, default 1472) straight through.
pub fn encode_message(message: &WireMessage, mtu: usize) -> Result<Vec<Vec<u8>>> {
    let payload_cap = mtu
        .checked_sub(FRAGMENT_HEADER_LEN)
        .filter(|cap| *cap > 0)
        .ok_or_else(|| err(format!("mtu {mtu} too small to carry a fragment header")))?;

    let encoded = rmp_serde::to_vec(message)?;
    let chunks: Vec<&[u8]> = if encoded.is_empty() {
        vec![&encoded[..]]
    } else {
        encoded.chunks(payload_cap).collect()
    };

    let total = u8::try_from(chunks.len())
        .map_err(|_| err(format!("message needs {} fragments, more than 255 fit in a u8 total", chunks.len())))?;

    let mut datagrams = Vec::with_capacity(chunks.len());
    for (index, chunk) in chunks.into_iter().enumerate() {
        let header = FragmentHeader::new(index as u8, total);
        let mut datagram = Vec::with_capacity(FRAGMENT_HEADER_LEN + chunk.len());
        datagram.extend_from_slice(&header.to_bytes());
        datagram.extend_from_slice(chunk);
        datagrams.push(datagram);
    }
    Ok(datagrams)
}

/// Deserializes a fully-reassembled payload (the concatenation of every
/// fragment's slice, in order — see [`crate::Reassembler`]) back into a
/// [`WireMessage`].
pub fn decode_message(payload: &[u8]) -> Result<WireMessage> {
    Ok(rmp_serde::from_slice(payload)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragment::Reassembler;
    use crate::opcode::OpCode;
    use std::net::{IpAddr, Ipv4Addr};

    fn sample() -> WireMessage {
        WireMessage {
            opcode: OpCode::Put,
            timestamp_ns: 1234,
            namespace: Some("orders".into()),
            key: Some(b"order-1".to_vec()),
            crc: Some("crc".into()),
            value: Some(vec![0u8; 4000]),
        }
    }

    #[test]
    fn round_trips_a_message_that_fits_in_one_fragment() {
        let message = WireMessage {
            value: None,
            ..sample()
        };
        let datagrams = encode_message(&message, 1472).unwrap();
        assert_eq!(datagrams.len(), 1);
        let (header, payload) = FragmentHeader::parse(&datagrams[0]).unwrap();
        assert_eq!(header.total, 1);
        let decoded = decode_message(payload).unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn large_value_splits_across_fragments_and_reassembles() {
        let message = sample();
        let datagrams = encode_message(&message, 200).unwrap();
        assert!(datagrams.len() > 1);

        let mut reassembler = Reassembler::new();
        let key = crate::fragment::ReassemblyKey {
            sender: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)),
            namespace: message.namespace.clone(),
            key: message.key.clone(),
            timestamp_ns: message.timestamp_ns,
        };

        let mut assembled = None;
        for datagram in &datagrams {
            let (header, payload) = FragmentHeader::parse(datagram).unwrap();
            assembled = reassembler.feed(key.clone(), header, payload);
        }
        let decoded = decode_message(&assembled.unwrap()).unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn mtu_too_small_for_a_header_is_rejected() {
        assert!(encode_message(&sample(), 2).is_err());
    }
}
