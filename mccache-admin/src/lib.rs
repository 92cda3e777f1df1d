//! Configuration, coherence posture, and logging setup for McCache.
//!
//! Everything a member process needs before it joins the group: the parsed
//! `MCCACHE_*` environment (`config`), the fixed-at-start coherence posture
//! that drives the redundancy schedule and ack behaviour (`posture`), and
//! the `tracing` subscriber wiring the original's bespoke `ipv4`/pid-tagged
//! log formatter is reproduced as (`logging`).

mod config;
mod logging;
mod posture;

pub use config::{Config, LogFormat, DEFAULT_SLOTS_SECS};
pub use logging::init_logging;
pub use posture::CoherencePosture;
