//! Decoder state shared between the edge and polling contexts.
//!
//! [`DecoderState`] is `Copy` so the polling side can take a consistent
//! snapshot inside a short critical section and do its arithmetic outside it.
//! Fields are only written by the transition functions in
//! [`decoder`](crate::decoder); everything else reads through accessors.

use crate::clock::TimestampMicros;
use crate::history::ToothHistory;

/// Synchronization level reached by the decoder.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SyncStatus {
    #[default]
    Unsynced,
    /// 360° precision; in sequential mode the cycle half is unknown.
    HalfSync,
    FullSync,
}

impl SyncStatus {
    /// Returns `true` for both half and full sync.
    #[must_use]
    pub const fn is_synced(self) -> bool {
        !matches!(self, SyncStatus::Unsynced)
    }
}

/// Which revolution of a 720° cycle the crank is in.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CyclePhase {
    #[default]
    First,
    Second,
}

impl CyclePhase {
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            CyclePhase::First => CyclePhase::Second,
            CyclePhase::Second => CyclePhase::First,
        }
    }
}

/// The single mutable aggregate owned by a decoder.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DecoderState {
    pub(crate) sync_status: SyncStatus,
    pub(crate) sync_loss_count: u16,
    pub(crate) revolution_count: u32,
    pub(crate) history: ToothHistory,
    pub(crate) current_tooth_angle: u32,
    pub(crate) tooth_angle_is_corrected: bool,
    pub(crate) revolution_time_micros: u32,
    pub(crate) max_stall_interval_micros: u32,
    /// 1-based index of the last tooth, `0` while the position is unknown.
    pub(crate) tooth_index: u16,
    /// Reference angle of the last tooth.
    pub(crate) last_tooth_angle: u32,
    /// Last interval divided by the pitches it covered.
    pub(crate) tooth_width_micros: u32,
    /// Per-tooth width in force before the last edge, when that edge was a
    /// regular tooth; `0` otherwise.
    pub(crate) width_before_last_tooth: u32,
    pub(crate) consecutive_anomalies: u8,
    /// No anomaly since the last gap.
    pub(crate) clean_revolution: bool,
    pub(crate) cycle_phase: CyclePhase,
    pub(crate) revolutions_since_cam: u8,
    pub(crate) last_secondary_time: Option<TimestampMicros>,
    pub(crate) rpm: u16,
}

impl DecoderState {
    /// Power-up state.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            sync_status: SyncStatus::Unsynced,
            sync_loss_count: 0,
            revolution_count: 0,
            history: ToothHistory::new(),
            current_tooth_angle: 0,
            tooth_angle_is_corrected: false,
            revolution_time_micros: 0,
            max_stall_interval_micros: 0,
            tooth_index: 0,
            last_tooth_angle: 0,
            tooth_width_micros: 0,
            width_before_last_tooth: 0,
            consecutive_anomalies: 0,
            clean_revolution: false,
            cycle_phase: CyclePhase::First,
            revolutions_since_cam: 0,
            last_secondary_time: None,
            rpm: 0,
        }
    }

    /// Clears everything except the sync-loss counter.
    pub(crate) fn clear_transient(&mut self) {
        *self = Self {
            sync_loss_count: self.sync_loss_count,
            ..Self::new()
        };
    }

    pub(crate) fn count_sync_loss(&mut self) {
        self.sync_loss_count = self.sync_loss_count.wrapping_add(1);
    }

    #[must_use]
    pub const fn sync_status(&self) -> SyncStatus {
        self.sync_status
    }

    /// Degradations observed since power-up; wraps, never resets.
    #[must_use]
    pub const fn sync_loss_count(&self) -> u16 {
        self.sync_loss_count
    }

    /// Completed revolutions since sync was gained.
    #[must_use]
    pub const fn revolution_count(&self) -> u32 {
        self.revolution_count
    }

    #[must_use]
    pub const fn last_tooth_time(&self) -> TimestampMicros {
        self.history.last_tooth_time
    }

    #[must_use]
    pub const fn last_tooth_time_minus_one(&self) -> TimestampMicros {
        self.history.last_tooth_time_minus_one
    }

    #[must_use]
    pub const fn tooth_one_time(&self) -> TimestampMicros {
        self.history.tooth_one_time
    }

    #[must_use]
    pub const fn tooth_one_time_minus_one(&self) -> TimestampMicros {
        self.history.tooth_one_time_minus_one
    }

    /// Angular width attributed to the interval just measured.
    #[must_use]
    pub const fn current_tooth_angle_millidegrees(&self) -> u32 {
        self.current_tooth_angle
    }

    /// `false` until the wheel position is known, and after an anomaly.
    #[must_use]
    pub const fn tooth_angle_is_corrected(&self) -> bool {
        self.tooth_angle_is_corrected
    }

    #[must_use]
    pub const fn revolution_time_micros(&self) -> u32 {
        self.revolution_time_micros
    }

    #[must_use]
    pub const fn max_stall_interval_micros(&self) -> u32 {
        self.max_stall_interval_micros
    }

    /// 1-based index of the last tooth, `0` while unsynced.
    #[must_use]
    pub const fn tooth_index(&self) -> u16 {
        self.tooth_index
    }

    #[must_use]
    pub const fn last_tooth_angle_millidegrees(&self) -> u32 {
        self.last_tooth_angle
    }

    #[must_use]
    pub const fn cycle_phase(&self) -> CyclePhase {
        self.cycle_phase
    }

    #[must_use]
    pub const fn history(&self) -> &ToothHistory {
        &self.history
    }
}
