//! Speed and crank-angle derivation for the polling context.
//!
//! The calculator never touches the live decoder: it works on a
//! [`DecoderSnapshot`] copied out under a critical section, so an edge landing
//! mid-computation can only make the answer stale, never torn.

use crate::clock::{TimestampMicros, elapsed_since};
use crate::config::{MILLIDEGREES_PER_REVOLUTION, MaxCrankAngle, TriggerConfig};
use crate::state::{CyclePhase, DecoderState, SyncStatus};

const MICROS_PER_MINUTE: u32 = 60_000_000;

/// Converts a revolution time into RPM, `0` when no revolution time is known.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub const fn rpm_from_revolution_time(revolution_time_micros: u32) -> u16 {
    if revolution_time_micros == 0 {
        return 0;
    }
    let rpm = MICROS_PER_MINUTE / revolution_time_micros;
    if rpm > u16::MAX as u32 {
        u16::MAX
    } else {
        rpm as u16
    }
}

/// Revolution time extrapolated from one interval spanning `angle_millidegrees`.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub const fn revolution_time_from_interval(interval: u32, angle_millidegrees: u32) -> u32 {
    if angle_millidegrees == 0 {
        return 0;
    }
    let micros =
        interval as u64 * MILLIDEGREES_PER_REVOLUTION as u64 / angle_millidegrees as u64;
    if micros > u32::MAX as u64 {
        u32::MAX
    } else {
        micros as u32
    }
}

/// Consistent copy of the decoder state plus the configuration the calculator needs.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DecoderSnapshot {
    pub state: DecoderState,
    pub angle_offset_millidegrees: i32,
    pub max_crank_angle: MaxCrankAngle,
}

impl DecoderSnapshot {
    #[must_use]
    pub const fn new(state: DecoderState, config: &TriggerConfig) -> Self {
        Self {
            state,
            angle_offset_millidegrees: config.trigger_angle_offset_millidegrees,
            max_crank_angle: config.max_crank_angle,
        }
    }

    #[must_use]
    pub const fn sync_status(&self) -> SyncStatus {
        self.state.sync_status
    }

    /// Engine speed derived from the last revolution time.
    #[must_use]
    pub const fn rpm(&self) -> u16 {
        rpm_from_revolution_time(self.state.revolution_time_micros)
    }

    /// Range reported angles wrap in: 720° only with full sync in sequential mode.
    #[must_use]
    pub const fn cycle_millidegrees(&self) -> u32 {
        match (self.state.sync_status, self.max_crank_angle) {
            (SyncStatus::FullSync, MaxCrankAngle::Degrees720) => {
                MaxCrankAngle::Degrees720.millidegrees()
            }
            _ => MILLIDEGREES_PER_REVOLUTION,
        }
    }

    /// Crank angle at `now` in milli-degrees, within `[0, cycle)`.
    ///
    /// Interpolates from the last tooth at the rate of the last interval.
    /// Reports `0` while unsynced.
    #[must_use]
    pub fn crank_angle(&self, now: TimestampMicros) -> i32 {
        let state = &self.state;
        if !state.sync_status.is_synced() {
            return 0;
        }

        let elapsed = elapsed_since(now, state.history.last_tooth_time).unwrap_or(0);
        let interpolated = match state.history.last_interval() {
            Some(interval) if interval > 0 => {
                u64::from(elapsed) * u64::from(state.current_tooth_angle) / u64::from(interval)
            }
            _ => 0,
        };

        let cycle = self.cycle_millidegrees();
        let mut angle =
            i64::from(state.last_tooth_angle) + i64::try_from(interpolated).unwrap_or(i64::MAX);
        if cycle > MILLIDEGREES_PER_REVOLUTION && state.cycle_phase == CyclePhase::Second {
            angle += i64::from(MILLIDEGREES_PER_REVOLUTION);
        }
        angle += i64::from(self.angle_offset_millidegrees);

        // The remainder is below `cycle`, which fits in an i32.
        i32::try_from(angle.rem_euclid(i64::from(cycle))).unwrap_or(0)
    }
}
