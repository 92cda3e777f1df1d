use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::opcode::OpCode;

/// The in-queue tuple a local mutation (or housekeeper action) is recorded
/// as before it reaches the outbound engine: `(opcode, timestamp_ns,
/// namespace, key, value_or_none)` from spec.md §3.
///
/// `key`/`value` are carried pre-encoded (the bytes the cache registry's
/// own `rmp_serde` encoding of the caller's key/value types produced) so
/// this crate stays generic-free; `mccache-core` owns the K/V <-> bytes
/// boundary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationRecord {
    pub opcode: OpCode,
    pub timestamp_ns: i64,
    pub namespace: Option<String>,
    pub key: Option<Vec<u8>>,
    pub value: Option<Vec<u8>>,
}

impl OperationRecord {
    pub fn new(
        opcode: OpCode,
        timestamp_ns: i64,
        namespace: Option<String>,
        key: Option<Vec<u8>>,
        value: Option<Vec<u8>>,
    ) -> Self {
        Self {
            opcode,
            timestamp_ns,
            namespace,
            key,
            value,
        }
    }
}

/// The post-codec wire tuple: `(opcode, timestamp_ns, namespace, key, crc,
/// value)` from spec.md §3. Under pessimistic posture `value` is stripped
/// before send; under neutral/optimistic posture `crc` accompanies a
/// present `value`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireMessage {
    pub opcode: OpCode,
    pub timestamp_ns: i64,
    pub namespace: Option<String>,
    pub key: Option<Vec<u8>>,
    pub crc: Option<String>,
    pub value: Option<Vec<u8>>,
}

impl WireMessage {
    pub fn from_record(record: OperationRecord, crc: Option<String>, value: Option<Vec<u8>>) -> Self {
        Self {
            opcode: record.opcode,
            timestamp_ns: record.timestamp_ns,
            namespace: record.namespace,
            key: record.key,
            crc,
            value,
        }
    }
}

/// An `INQ` diagnostic reply. Values never leave the process — only a key
/// (for a single-key inquiry) or a sorted `key -> crc` map (for a whole-cache
/// inquiry) is returned, per spec.md §4.5.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum InquiryReply {
    One { key: Vec<u8>, crc: String },
    All { crcs: BTreeMap<Vec<u8>, String> },
}
