//! Monotonic microsecond source shared by the edge and polling contexts.

/// Wrapping 32-bit microsecond timestamp, as latched by the capture hardware.
pub type TimestampMicros = u32;

/// Trait implemented by platform clocks that timestamp tooth edges.
///
/// Implementations must be readable from interrupt context and wrap at
/// `u32::MAX`; every consumer uses wrapping subtraction.
pub trait ToothClock {
    /// Returns the current time in microseconds.
    fn now_micros(&self) -> TimestampMicros;
}

/// Returns `later - earlier`, or `None` when `later` was sampled before `earlier`.
///
/// Intervals longer than half the counter range are indistinguishable from a
/// clock read that raced a newer edge, so they are reported as `None`.
#[must_use]
pub const fn elapsed_since(later: TimestampMicros, earlier: TimestampMicros) -> Option<u32> {
    let delta = later.wrapping_sub(earlier);
    if delta > i32::MAX as u32 {
        None
    } else {
        Some(delta)
    }
}
