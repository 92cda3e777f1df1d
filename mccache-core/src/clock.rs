use std::time::{SystemTime, UNIX_EPOCH};

/// Wall-clock nanoseconds since the Unix epoch — the original's
/// `time.time_ns()`. Spec.md §3 calls this field "the monotonic nanosecond
/// wall clock"; it is used as a per-`(namespace, key)` tie-breaker and
/// pending-ack identifier, not as a measure of elapsed duration, so wall
/// clock (not [`std::time::Instant`], which isn't comparable across
/// processes) is the correct primitive here.
pub fn now_ns() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0)
}
