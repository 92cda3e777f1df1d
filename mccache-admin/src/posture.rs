use std::time::Duration;

use mccache_wire::OpCode;

/// Process-wide coherence posture (spec.md §3, §4.3, §4.4). Fixed at start —
/// nothing in this workspace re-reads it after [`crate::Config`] is built.
///
/// The numeric values match the original implementation's `McCacheLevel`
/// (3/5/7 for pessimistic/neutral/optimistic, `MCCACHE_LEVEL`); unlike the
/// original, every comparison here is a real `CoherencePosture == CoherencePosture`
/// value comparison (spec.md §9(b), REDESIGN FLAG (b) in SPEC_FULL.md — the
/// original compares an `int` against an `Enum` and the branch never takes).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(u8)]
pub enum CoherencePosture {
    Pessimistic = 3,
    Neutral = 5,
    Optimistic = 7,
}

/// Cumulative extra-send delays layered onto the always-sent first copy.
/// `Optimistic` uses a 1-element slice (one extra send, immediately);
/// `Neutral` a 2-element slice; `Pessimistic` the full 3 (spec.md §4.4's
/// redundancy schedule table).
const SEND_SCHEDULE: [Duration; 3] = [Duration::ZERO, Duration::from_millis(1), Duration::from_millis(3)];

impl CoherencePosture {
    pub fn from_level(level: i32) -> Option<Self> {
        Some(match level {
            3 => CoherencePosture::Pessimistic,
            5 => CoherencePosture::Neutral,
            7 => CoherencePosture::Optimistic,
            _ => return None,
        })
    }

    pub const fn level(self) -> i32 {
        self as i32
    }

    /// Posture-implied cache size default, applied only when `MCCACHE_MAXSIZE`
    /// is absent (spec.md §6).
    pub const fn default_max_size(self) -> usize {
        match self {
            CoherencePosture::Pessimistic => 1024,
            CoherencePosture::Neutral => 2048,
            CoherencePosture::Optimistic => 4096,
        }
    }

    /// Whether a local mutation's peer message carries the value, or is
    /// stripped so peers must refetch from authoritative storage.
    pub const fn carries_value(self) -> bool {
        !matches!(self, CoherencePosture::Pessimistic)
    }

    /// Whether outbound sends under this posture require tracked, resent
    /// acknowledgement (spec.md §4.4: "pessimistic posture only").
    pub const fn requires_ack(self) -> bool {
        matches!(self, CoherencePosture::Pessimistic)
    }

    /// The opcode a local `set`/`delete`/... mutation turns into under this
    /// posture (spec.md §4.3).
    pub const fn mutation_opcode(self) -> OpCode {
        match self {
            CoherencePosture::Optimistic => OpCode::Put,
            CoherencePosture::Neutral => OpCode::Upd,
            CoherencePosture::Pessimistic => OpCode::Del,
        }
    }

    /// Extra-send delays after the always-sent first copy (spec.md §4.4).
    /// Total datagrams transmitted is `send_delays().len() + 1`.
    pub fn send_delays(self) -> &'static [Duration] {
        match self {
            CoherencePosture::Optimistic => &SEND_SCHEDULE[..1],
            CoherencePosture::Neutral => &SEND_SCHEDULE[..2],
            CoherencePosture::Pessimistic => &SEND_SCHEDULE[..3],
        }
    }
}

impl Default for CoherencePosture {
    fn default() -> Self {
        CoherencePosture::Neutral
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_round_trip() {
        for p in [CoherencePosture::Pessimistic, CoherencePosture::Neutral, CoherencePosture::Optimistic] {
            assert_eq!(CoherencePosture::from_level(p.level()), Some(p));
        }
    }

    #[test]
    fn unrecognised_level_is_none() {
        assert_eq!(CoherencePosture::from_level(4), None);
    }

    #[test]
    fn redundancy_schedule_matches_spec_table() {
        assert_eq!(CoherencePosture::Optimistic.send_delays().len() + 1, 2);
        assert_eq!(CoherencePosture::Neutral.send_delays().len() + 1, 3);
        assert_eq!(CoherencePosture::Pessimistic.send_delays().len() + 1, 4);
    }

    #[test]
    fn only_pessimistic_requires_ack_and_strips_value() {
        assert!(CoherencePosture::Pessimistic.requires_ack());
        assert!(!CoherencePosture::Pessimistic.carries_value());
        assert!(!CoherencePosture::Neutral.requires_ack());
        assert!(CoherencePosture::Neutral.carries_value());
        assert!(!CoherencePosture::Optimistic.requires_ack());
        assert!(CoherencePosture::Optimistic.carries_value());
    }
}
