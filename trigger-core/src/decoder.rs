//! Tooth-edge state machine.
//!
//! [`Decoder`] owns the [`DecoderState`] and is the only place it changes.
//! Edge handlers run in interrupt context: they do a bounded amount of integer
//! work, never allocate, and leave logging of the resulting events to the
//! polling side through the telemetry ring.

use crate::calc::{DecoderSnapshot, revolution_time_from_interval, rpm_from_revolution_time};
use crate::classifier::ToothVerdict;
use crate::clock::TimestampMicros;
use crate::config::{ConfigError, TriggerConfig};
use crate::pattern::{MissingToothPattern, TriggerPattern};
use crate::stall::{StallMonitor, stall_interval_micros};
use crate::state::{CyclePhase, DecoderState, SyncStatus};
use crate::telemetry::{DecoderEvent, DecoderTelemetry};

/// Cam edges expected at least once per this many reference teeth in sequential mode.
const MAX_REVOLUTIONS_WITHOUT_CAM: u8 = 2;

/// What the decoder did with an edge.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ToothOutcome {
    /// Dropped by the noise filter; no state changed.
    Filtered,
    /// Primary edge accepted with the given classification.
    Accepted(ToothVerdict),
    /// Secondary (cam) edge accepted.
    CamReference,
}

/// Trigger decoder for one wheel pattern.
pub struct Decoder<P> {
    config: TriggerConfig,
    pattern: P,
    state: DecoderState,
    telemetry: DecoderTelemetry,
}

/// Decoder for `N-M` missing-tooth wheels.
pub type MissingToothDecoder = Decoder<MissingToothPattern>;

impl Decoder<MissingToothPattern> {
    /// Builds a missing-tooth decoder.
    ///
    /// # Errors
    ///
    /// Returns the violated invariant when `config` describes an impossible wheel.
    pub fn new(config: TriggerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::from_parts(config, MissingToothPattern::new(&config)))
    }
}

impl<P: TriggerPattern> Decoder<P> {
    /// Builds a decoder around a custom pattern.
    ///
    /// # Errors
    ///
    /// Returns the violated invariant when `config` is invalid.
    pub fn with_pattern(config: TriggerConfig, pattern: P) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::from_parts(config, pattern))
    }

    const fn from_parts(config: TriggerConfig, pattern: P) -> Self {
        Self {
            config,
            pattern,
            state: DecoderState::new(),
            telemetry: DecoderTelemetry::new(),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &TriggerConfig {
        &self.config
    }

    #[must_use]
    pub const fn pattern(&self) -> &P {
        &self.pattern
    }

    #[must_use]
    pub const fn state(&self) -> &DecoderState {
        &self.state
    }

    #[must_use]
    pub const fn telemetry(&self) -> &DecoderTelemetry {
        &self.telemetry
    }

    /// Copies the state together with the calculator settings.
    #[must_use]
    pub const fn snapshot(&self) -> DecoderSnapshot {
        DecoderSnapshot::new(self.state, &self.config)
    }

    #[must_use]
    pub const fn sync_status(&self) -> SyncStatus {
        self.state.sync_status
    }

    #[must_use]
    pub const fn sync_loss_count(&self) -> u16 {
        self.state.sync_loss_count
    }

    #[must_use]
    pub const fn revolution_count(&self) -> u32 {
        self.state.revolution_count
    }

    #[must_use]
    pub const fn rpm(&self) -> u16 {
        rpm_from_revolution_time(self.state.revolution_time_micros)
    }

    #[must_use]
    pub fn crank_angle(&self, now: TimestampMicros) -> i32 {
        self.snapshot().crank_angle(now)
    }

    /// Handles one primary (crank) edge.
    pub fn on_tooth_edge(&mut self, timestamp: TimestampMicros) -> ToothOutcome {
        if !self.state.history.has_tooth() {
            self.state.history.record_tooth(timestamp);
            self.update_stall_interval();
            return ToothOutcome::Accepted(ToothVerdict::Tooth);
        }

        let interval = timestamp.wrapping_sub(self.state.history.last_tooth_time);
        let Some(verdict) =
            self.pattern
                .classify(interval, self.state.tooth_width_micros, self.state.tooth_index)
        else {
            return ToothOutcome::Filtered;
        };

        if self.completes_early_tooth(interval) {
            self.merge_early_tooth(timestamp);
            self.update_stall_interval();
            return ToothOutcome::Accepted(ToothVerdict::Anomaly);
        }

        if verdict == ToothVerdict::Anomaly
            && self.state.sync_status.is_synced()
            && self.pattern.is_early_edge(
                interval,
                self.state.tooth_width_micros,
                self.state.tooth_index,
            )
        {
            // Extra pulse: the last real tooth stays the timing reference.
            self.on_extra_pulse(timestamp);
            return ToothOutcome::Accepted(verdict);
        }

        self.state.history.record_tooth(timestamp);
        self.state.width_before_last_tooth = 0;
        match verdict {
            ToothVerdict::Tooth => self.on_regular_tooth(interval),
            ToothVerdict::MissingToothGap => self.on_gap(interval, timestamp),
            ToothVerdict::Anomaly => self.on_anomaly(interval, timestamp),
        }

        if self.state.sync_status.is_synced() {
            self.update_revolution_time(interval);
        }
        self.update_stall_interval();
        ToothOutcome::Accepted(verdict)
    }

    /// Handles one secondary (cam) edge.
    ///
    /// In sequential mode the edge marks the first revolution of the cycle and
    /// promotes half sync to full sync.
    pub fn on_secondary_tooth_edge(&mut self, timestamp: TimestampMicros) -> ToothOutcome {
        if let Some(previous) = self.state.last_secondary_time
            && timestamp.wrapping_sub(previous) < self.config.noise_filter_ticks
        {
            return ToothOutcome::Filtered;
        }
        self.state.last_secondary_time = Some(timestamp);

        if !self.config.max_crank_angle.is_sequential() || !self.state.sync_status.is_synced() {
            return ToothOutcome::CamReference;
        }

        self.state.cycle_phase = CyclePhase::First;
        self.state.revolutions_since_cam = 0;
        if self.state.sync_status == SyncStatus::HalfSync {
            self.state.sync_status = SyncStatus::FullSync;
            self.telemetry
                .record(DecoderEvent::SyncPromoted, timestamp);
        }
        ToothOutcome::CamReference
    }

    /// Polling-side stall check; resets the decoder when the crank stopped.
    pub fn tick(&mut self, now: TimestampMicros) -> Option<DecoderEvent> {
        if !StallMonitor::is_stalled(&self.state, now) {
            return None;
        }

        let previous = self.state.sync_status;
        warn!(
            "trigger: stall after {}us without a tooth",
            now.wrapping_sub(self.state.history.last_tooth_time)
        );
        self.force_reset();
        let event = DecoderEvent::Stalled { previous };
        self.telemetry.record(event, now);
        Some(event)
    }

    /// Caller-initiated reset (engine stopped); same effect as a stall.
    pub fn reset_decoder(&mut self, now: TimestampMicros) {
        self.force_reset();
        self.telemetry.record(DecoderEvent::Reset, now);
    }

    fn force_reset(&mut self) {
        let was_synced = self.state.sync_status.is_synced();
        self.state.clear_transient();
        if was_synced {
            self.state.count_sync_loss();
        }
    }

    fn on_regular_tooth(&mut self, interval: u32) {
        let state = &mut self.state;
        state.consecutive_anomalies = 0;
        state.width_before_last_tooth = state.tooth_width_micros;
        state.tooth_width_micros = interval;
        if state.sync_status.is_synced() {
            let index = self.pattern.next_tooth(state.tooth_index);
            self.enter_tooth(index);
        }
    }

    fn on_gap(&mut self, interval: u32, timestamp: TimestampMicros) {
        let state = &mut self.state;
        state.consecutive_anomalies = 0;
        state.tooth_width_micros = interval / self.pattern.interval_pitches(1);
        state.history.record_tooth_one(timestamp);

        let sequential = self.config.max_crank_angle.is_sequential();
        match state.sync_status {
            SyncStatus::Unsynced => {
                state.sync_status = SyncStatus::HalfSync;
                state.revolution_count = 0;
                state.cycle_phase = CyclePhase::First;
                state.revolutions_since_cam = 0;
                self.telemetry
                    .record(DecoderEvent::SyncAcquired, timestamp);
            }
            SyncStatus::HalfSync => {
                state.revolution_count = state.revolution_count.wrapping_add(1);
                state.cycle_phase = state.cycle_phase.toggled();
                state.revolutions_since_cam = state.revolutions_since_cam.saturating_add(1);
                if !sequential && state.clean_revolution {
                    state.sync_status = SyncStatus::FullSync;
                    self.telemetry
                        .record(DecoderEvent::SyncPromoted, timestamp);
                }
            }
            SyncStatus::FullSync => {
                state.revolution_count = state.revolution_count.wrapping_add(1);
                state.cycle_phase = state.cycle_phase.toggled();
                state.revolutions_since_cam = state.revolutions_since_cam.saturating_add(1);
                if sequential && state.revolutions_since_cam > MAX_REVOLUTIONS_WITHOUT_CAM {
                    state.sync_status = SyncStatus::HalfSync;
                    state.count_sync_loss();
                    let sync_loss_count = state.sync_loss_count;
                    self.telemetry
                        .record(DecoderEvent::PhaseLost { sync_loss_count }, timestamp);
                }
            }
        }

        self.state.clean_revolution = true;
        self.enter_tooth(1);
    }

    /// Counts a synced anomaly. Returns `false` when it exceeded the
    /// consecutive limit and sync was dropped.
    fn count_anomaly(&mut self, timestamp: TimestampMicros) -> bool {
        let state = &mut self.state;
        state.count_sync_loss();
        state.consecutive_anomalies = state.consecutive_anomalies.saturating_add(1);
        state.clean_revolution = false;
        state.width_before_last_tooth = 0;
        let sync_loss_count = state.sync_loss_count;
        self.telemetry
            .record(DecoderEvent::PatternAnomaly { sync_loss_count }, timestamp);

        if state.consecutive_anomalies > self.config.max_consecutive_anomalies {
            state.clear_transient();
            state.history.record_tooth(timestamp);
            self.telemetry
                .record(DecoderEvent::SyncDropped { sync_loss_count }, timestamp);
            return false;
        }
        true
    }

    fn on_anomaly(&mut self, interval: u32, timestamp: TimestampMicros) {
        if !self.state.sync_status.is_synced() {
            // Nothing to lose yet; follow the new speed so acquisition can proceed.
            self.state.tooth_width_micros = interval;
            return;
        }
        if !self.count_anomaly(timestamp) {
            return;
        }

        // Missing pulse: skip the slots the interval spans, rounded to whole
        // pitches. Crossing the end of the wheel continues from tooth one; a
        // landing inside the gap is pinned to the last tooth.
        let state = &mut self.state;
        let width = u64::from(state.tooth_width_micros.max(1));
        let pitches = ((2 * u64::from(interval) + width) / (2 * width)).max(1);
        let teeth_present = self.pattern.teeth_present();
        let slots = u64::from(teeth_present) + u64::from(self.pattern.interval_pitches(1)) - 1;
        let target = u64::from(state.tooth_index) + pitches;
        let target = if target > slots { target - slots } else { target };
        let index = u16::try_from(target).map_or(teeth_present, |index| index.min(teeth_present));
        let pitches = u32::try_from(pitches).unwrap_or(u32::MAX);
        state.tooth_index = index;
        state.last_tooth_angle = self.pattern.tooth_angle(index);
        state.current_tooth_angle = self.pattern.pitch_angle().saturating_mul(pitches);
        state.tooth_angle_is_corrected = false;
    }

    fn on_extra_pulse(&mut self, timestamp: TimestampMicros) {
        if self.count_anomaly(timestamp) {
            self.state.tooth_angle_is_corrected = false;
        } else {
            self.update_stall_interval();
        }
    }

    /// Returns `true` when `interval` and the regular tooth before it add up
    /// to one pitch at the width in force before that tooth, which means the
    /// previous edge was an extra pulse landing late in the pitch.
    fn completes_early_tooth(&self, interval: u32) -> bool {
        let state = &self.state;
        let reference = u64::from(state.width_before_last_tooth);
        if reference == 0 || !state.sync_status.is_synced() {
            return false;
        }
        let Some(early) = state.history.last_interval() else {
            return false;
        };
        let early = u64::from(early);
        let combined = early + u64::from(interval);
        8 * early < 7 * reference && 8 * combined.abs_diff(reference) <= reference
    }

    /// Replaces the early edge with `timestamp` as the real tooth at the same index.
    fn merge_early_tooth(&mut self, timestamp: TimestampMicros) {
        if !self.count_anomaly(timestamp) {
            return;
        }
        let state = &mut self.state;
        state.history.replace_last_tooth(timestamp);
        let combined = state.history.last_interval().unwrap_or(0);
        state.tooth_width_micros = combined / self.pattern.interval_pitches(state.tooth_index);
        let index = state.tooth_index;
        self.enter_tooth(index);
        self.update_revolution_time(combined);
    }

    fn enter_tooth(&mut self, index: u16) {
        let state = &mut self.state;
        state.tooth_index = index;
        state.last_tooth_angle = self.pattern.tooth_angle(index);
        state.current_tooth_angle = self.pattern.interval_angle(index);
        state.tooth_angle_is_corrected = true;
    }

    fn update_revolution_time(&mut self, interval: u32) {
        let state = &mut self.state;
        let per_tooth = revolution_time_from_interval(interval, state.current_tooth_angle);
        state.revolution_time_micros = match state.history.tooth_one_interval() {
            Some(revolution) if state.rpm >= self.config.cranking_rpm => revolution,
            _ => per_tooth,
        };
        state.rpm = rpm_from_revolution_time(state.revolution_time_micros);
    }

    fn update_stall_interval(&mut self) {
        let state = &mut self.state;
        let angle = if state.sync_status.is_synced() {
            let upcoming = self
                .pattern
                .interval_angle(self.pattern.next_tooth(state.tooth_index));
            upcoming.max(state.current_tooth_angle)
        } else {
            self.pattern.widest_interval_angle()
        };
        state.max_stall_interval_micros =
            stall_interval_micros(angle, self.config.min_cranking_rpm_for_stall);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decoder() -> MissingToothDecoder {
        MissingToothDecoder::new(TriggerConfig::missing_tooth(12, 1)).expect("valid wheel")
    }

    /// Feeds teeth 1..=11 of a 12-1 wheel starting at `start` with `pitch` µs spacing
    /// and returns the time of the last tooth.
    fn feed_revolution(decoder: &mut MissingToothDecoder, start: u32, pitch: u32) -> u32 {
        let mut now = start;
        decoder.on_tooth_edge(now);
        for _ in 1..11 {
            now = now.wrapping_add(pitch);
            decoder.on_tooth_edge(now);
        }
        now
    }

    #[test]
    fn invalid_config_is_refused() {
        assert!(matches!(
            MissingToothDecoder::new(TriggerConfig::missing_tooth(12, 0)),
            Err(ConfigError::NoMissingTeeth)
        ));
    }

    #[test]
    fn first_gap_gives_half_sync_and_tooth_one() {
        let mut decoder = decoder();
        let last = feed_revolution(&mut decoder, 1_000, 1_000);
        assert_eq!(decoder.sync_status(), SyncStatus::Unsynced);

        let outcome = decoder.on_tooth_edge(last + 2_000);
        assert_eq!(
            outcome,
            ToothOutcome::Accepted(ToothVerdict::MissingToothGap)
        );
        assert_eq!(decoder.sync_status(), SyncStatus::HalfSync);
        assert_eq!(decoder.state().tooth_index(), 1);
        assert_eq!(decoder.state().current_tooth_angle_millidegrees(), 60_000);
        assert!(decoder.state().tooth_angle_is_corrected());
        assert_eq!(decoder.state().revolution_time_micros(), 12_000);
        assert_eq!(decoder.rpm(), 5_000);
        assert_eq!(decoder.revolution_count(), 0);
    }

    #[test]
    fn single_anomaly_keeps_sync() {
        let mut decoder = decoder();
        let last = feed_revolution(&mut decoder, 1_000, 1_000);
        let mut now = last + 2_000;
        decoder.on_tooth_edge(now);
        now += 1_000;
        decoder.on_tooth_edge(now);

        // Dropped tooth mid-revolution: twice the pitch where a tooth was due.
        now += 2_000;
        let outcome = decoder.on_tooth_edge(now);
        assert_eq!(outcome, ToothOutcome::Accepted(ToothVerdict::Anomaly));
        assert_eq!(decoder.sync_status(), SyncStatus::HalfSync);
        assert_eq!(decoder.sync_loss_count(), 1);
        assert!(!decoder.state().tooth_angle_is_corrected());
        assert!(matches!(
            decoder.telemetry().latest().map(|record| record.event),
            Some(DecoderEvent::PatternAnomaly { sync_loss_count: 1 })
        ));
    }

    #[test]
    fn repeated_anomalies_drop_sync() {
        let config = TriggerConfig::missing_tooth(12, 1).with_max_consecutive_anomalies(1);
        let mut decoder = MissingToothDecoder::new(config).expect("valid wheel");
        let last = feed_revolution(&mut decoder, 1_000, 1_000);
        let mut now = last + 2_000;
        decoder.on_tooth_edge(now);

        now += 3_000;
        decoder.on_tooth_edge(now);
        assert_eq!(decoder.sync_status(), SyncStatus::HalfSync);
        now += 3_000;
        decoder.on_tooth_edge(now);
        assert_eq!(decoder.sync_status(), SyncStatus::Unsynced);
        assert_eq!(decoder.sync_loss_count(), 2);
        assert_eq!(decoder.state().last_tooth_time(), now);
        assert_eq!(decoder.state().revolution_time_micros(), 0);
    }

    #[test]
    fn unsynced_anomalies_are_not_counted() {
        let mut decoder = decoder();
        decoder.on_tooth_edge(1_000);
        decoder.on_tooth_edge(2_000);
        decoder.on_tooth_edge(2_200);
        decoder.on_tooth_edge(9_000);
        assert_eq!(decoder.sync_status(), SyncStatus::Unsynced);
        assert_eq!(decoder.sync_loss_count(), 0);
    }

    #[test]
    fn secondary_edge_is_ignored_in_wasted_spark_mode() {
        let mut decoder = decoder();
        let last = feed_revolution(&mut decoder, 1_000, 1_000);
        decoder.on_tooth_edge(last + 2_000);
        assert_eq!(
            decoder.on_secondary_tooth_edge(last + 2_500),
            ToothOutcome::CamReference
        );
        assert_eq!(decoder.sync_status(), SyncStatus::HalfSync);
    }

    #[test]
    fn reset_clears_everything_but_sync_losses() {
        let mut decoder = decoder();
        let last = feed_revolution(&mut decoder, 1_000, 1_000);
        decoder.on_tooth_edge(last + 2_000);
        decoder.reset_decoder(last + 2_750);
        assert_eq!(decoder.sync_status(), SyncStatus::Unsynced);
        assert_eq!(decoder.sync_loss_count(), 1);
        assert_eq!(decoder.state().last_tooth_time(), 0);
        assert_eq!(decoder.rpm(), 0);
        let latest = decoder.telemetry().latest().copied();
        assert_eq!(latest.map(|record| record.event), Some(DecoderEvent::Reset));
        assert_eq!(latest.map(|record| record.timestamp), Some(last + 2_750));
    }
}
