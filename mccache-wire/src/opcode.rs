use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// The fixed 3-character operation code carried by every wire message.
///
/// `REQ` is the "please re-acknowledge this key" opcode named in spec.md
/// §4.5/§4.6; the original Python source aliases its `OpCode.REQ` enum
/// member to the string `'RAK'`, which is an inconsistency in that source,
/// not a semantic this rendition reproduces — the wire value matches the
/// name everywhere else in this workspace.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum OpCode {
    /// Acknowledgement of a received request.
    Ack,
    /// Member announcing it is leaving the group.
    Bye,
    /// Member requesting the group evict a cache entry.
    Del,
    /// Member announcing an error to the group.
    Err,
    /// Member announcing its initialization (named-cache creation) to the group.
    Ini,
    /// Member inquiring about a cache entry's CRC from the group.
    Inq,
    /// New member announcement to join the group.
    New,
    /// Negative acknowledgement — a fragment is missing.
    Nak,
    /// No operation.
    Nop,
    /// Member announcing a new cache entry was put into its local cache.
    Put,
    /// Request re-acknowledgement for a specific key.
    Req,
    /// Query the cache. Reserved, no defined semantics.
    Qry,
    /// Reset the cache. Reserved, no defined semantics.
    Rst,
    /// Update an existing cache entry.
    Upd,
}

impl OpCode {
    /// The fixed 3-character code this opcode is carried as on the wire.
    pub const fn code(self) -> &'static str {
        match self {
            OpCode::Ack => "ACK",
            OpCode::Bye => "BYE",
            OpCode::Del => "DEL",
            OpCode::Err => "ERR",
            OpCode::Ini => "INI",
            OpCode::Inq => "INQ",
            OpCode::New => "NEW",
            OpCode::Nak => "NAK",
            OpCode::Nop => "NOP",
            OpCode::Put => "PUT",
            OpCode::Req => "REQ",
            OpCode::Qry => "QRY",
            OpCode::Rst => "RST",
            OpCode::Upd => "UPD",
        }
    }

    fn from_code(code: &str) -> Option<Self> {
        Some(match code {
            "ACK" => OpCode::Ack,
            "BYE" => OpCode::Bye,
            "DEL" => OpCode::Del,
            "ERR" => OpCode::Err,
            "INI" => OpCode::Ini,
            "INQ" => OpCode::Inq,
            "NEW" => OpCode::New,
            "NAK" => OpCode::Nak,
            "NOP" => OpCode::Nop,
            "PUT" => OpCode::Put,
            "REQ" => OpCode::Req,
            "QRY" => OpCode::Qry,
            "RST" => OpCode::Rst,
            "UPD" => OpCode::Upd,
            _ => return None,
        })
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl Serialize for OpCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

struct OpCodeVisitor;

impl<'de> Visitor<'de> for OpCodeVisitor {
    type Value = OpCode;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a 3-character McCache opcode")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<OpCode, E> {
        OpCode::from_code(v).ok_or_else(|| de::Error::custom(format!("unknown opcode {v:?}")))
    }
}

impl<'de> Deserialize<'de> for OpCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_str(OpCodeVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_opcode_round_trips_through_its_code() {
        let all = [
            OpCode::Ack,
            OpCode::Bye,
            OpCode::Del,
            OpCode::Err,
            OpCode::Ini,
            OpCode::Inq,
            OpCode::New,
            OpCode::Nak,
            OpCode::Nop,
            OpCode::Put,
            OpCode::Req,
            OpCode::Qry,
            OpCode::Rst,
            OpCode::Upd,
        ];
        for op in all {
            assert_eq!(op.code().len(), 3);
            assert_eq!(OpCode::from_code(op.code()), Some(op));
        }
    }

    #[test]
    fn unknown_code_fails_to_parse() {
        assert_eq!(OpCode::from_code("XYZ"), None);
    }
}
