//! Stall detection driven from the polling tick.

use crate::clock::{TimestampMicros, elapsed_since};
use crate::state::DecoderState;

/// Longest time a crank turning at `min_rpm` needs to cover `angle_millidegrees`.
///
/// One milli-degree at `rpm` takes `60e6 / (rpm * 360_000)` = `500 / (3 * rpm)` µs.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub const fn stall_interval_micros(angle_millidegrees: u32, min_rpm: u16) -> u32 {
    if min_rpm == 0 {
        return u32::MAX;
    }
    let micros = angle_millidegrees as u64 * 500 / (3 * min_rpm as u64);
    if micros > u32::MAX as u64 {
        u32::MAX
    } else {
        micros as u32
    }
}

/// Stateless check run once per polling iteration.
#[derive(Copy, Clone, Debug, Default)]
pub struct StallMonitor;

impl StallMonitor {
    /// Returns `true` when no tooth arrived within the stall interval.
    ///
    /// A decoder that has never seen a tooth cannot stall, and a `now` sampled
    /// before the latest edge is never a stall.
    #[must_use]
    pub fn is_stalled(state: &DecoderState, now: TimestampMicros) -> bool {
        if !state.history.has_tooth() {
            return false;
        }
        match elapsed_since(now, state.history.last_tooth_time) {
            Some(elapsed) => elapsed > state.max_stall_interval_micros,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thirty_degrees_at_fifty_rpm() {
        assert_eq!(stall_interval_micros(30_000, 50), 100_000);
        assert_eq!(stall_interval_micros(60_000, 50), 200_000);
    }

    #[test]
    fn fresh_state_never_stalls() {
        let state = DecoderState::new();
        assert!(!StallMonitor::is_stalled(&state, u32::MAX / 4));
    }

    #[test]
    fn stall_requires_exceeding_the_interval() {
        let mut state = DecoderState::new();
        state.history.record_tooth(1_000);
        state.max_stall_interval_micros = 100_000;
        assert!(!StallMonitor::is_stalled(&state, 101_000));
        assert!(StallMonitor::is_stalled(&state, 101_001));
        assert!(!StallMonitor::is_stalled(&state, 999));
    }
}
