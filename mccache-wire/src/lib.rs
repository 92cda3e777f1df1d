//! Operation codec, wire message framing and fragmentation.
//!
//! This crate owns the parts of the coherence protocol that are pure data:
//! the operation tuple a cache mutation turns into, the wire message an
//! [`OperationRecord`] is serialized down to, the 4-byte fragment header
//! every datagram is prefixed with, and the CRC used to detect stale values
//! under neutral/optimistic posture. It knows nothing about sockets,
//! membership, or policy — those live in `mccache-transport` and
//! `mccache-core`.

mod codec;
mod crc;
mod fragment;
mod message;
mod opcode;

pub use codec::{decode_message, encode_message};
pub use crc::crc_of;
pub use fragment::{
    FragmentHeader, Reassembler, ReassemblyKey, DEFAULT_REASSEMBLY_TTL, FRAGMENT_HEADER_LEN, MAGIC_BYTE, VERSION,
};
pub use message::{InquiryReply, OperationRecord, WireMessage};
pub use opcode::OpCode;
