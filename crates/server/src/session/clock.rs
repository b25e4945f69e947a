//! Per-move clock arithmetic. Clocks are whole seconds; elapsed time arrives in
//! milliseconds from the mover's client.

/// New remaining time for the side that just moved:
/// `max(0, remaining - floor(elapsed_ms / 1000) + increment)`.
pub fn apply_elapsed(remaining: u32, elapsed_ms: u64, increment: u32) -> u32 {
    let elapsed_secs = (elapsed_ms / 1000).min(i64::MAX as u64) as i64;
    let next = remaining as i64 - elapsed_secs + increment as i64;
    next.clamp(0, u32::MAX as i64) as u32
}
