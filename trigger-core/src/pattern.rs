//! Wheel topologies understood by the decoder.
//!
//! The sync state machine and the speed/angle calculator only talk to a wheel
//! through [`TriggerPattern`], so adding another topology means implementing
//! this trait; the missing-tooth wheel is the one provided here.

use crate::classifier::{PatternClassifier, ToothVerdict};
use crate::config::TriggerConfig;

/// Geometry and interval classification for one trigger wheel.
pub trait TriggerPattern {
    /// Classifies an interval, returning `None` for noise.
    ///
    /// `tooth_index` is the 1-based index of the tooth that opened the
    /// interval, or `0` while the wheel position is unknown.
    fn classify(
        &self,
        interval: u32,
        previous_interval: u32,
        tooth_index: u16,
    ) -> Option<ToothVerdict>;

    /// Physical teeth per revolution.
    fn teeth_present(&self) -> u16;

    /// Crank angle of the tooth at `tooth_index`, in milli-degrees.
    fn tooth_angle(&self, tooth_index: u16) -> u32;

    /// Nominal pitches covered by the interval that ends at `tooth_index`.
    fn interval_pitches(&self, tooth_index: u16) -> u32;

    /// Angular width of one pitch, in milli-degrees.
    fn pitch_angle(&self) -> u32;

    /// Widest interval the wheel can produce, in milli-degrees.
    fn widest_interval_angle(&self) -> u32;

    /// Angular width of the interval ending at `tooth_index`.
    fn interval_angle(&self, tooth_index: u16) -> u32 {
        self.pitch_angle() * self.interval_pitches(tooth_index)
    }

    /// Index of the tooth that follows `tooth_index`.
    fn next_tooth(&self, tooth_index: u16) -> u16 {
        if tooth_index >= self.teeth_present() {
            1
        } else {
            tooth_index + 1
        }
    }

    /// Returns `true` when an edge ending `interval` arrived before the next
    /// physical tooth could have, given the index of the tooth that opened it.
    fn is_early_edge(&self, interval: u32, previous_interval: u32, tooth_index: u16) -> bool;
}

/// `N-M` wheel: `N` evenly spaced positions with `M` consecutive teeth removed.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct MissingToothPattern {
    classifier: PatternClassifier,
    teeth_present: u16,
    missing_teeth: u16,
    pitch_angle: u32,
}

impl MissingToothPattern {
    /// Builds the pattern for an already validated configuration.
    #[must_use]
    pub const fn new(config: &TriggerConfig) -> Self {
        Self {
            classifier: PatternClassifier::new(config),
            teeth_present: config.teeth_per_revolution - config.missing_teeth,
            missing_teeth: config.missing_teeth,
            pitch_angle: config.angle_per_tooth_millidegrees(),
        }
    }

    /// Angular width of the gap interval.
    #[must_use]
    pub const fn gap_angle(&self) -> u32 {
        self.pitch_angle * (self.missing_teeth as u32 + 1)
    }
}

impl TriggerPattern for MissingToothPattern {
    fn classify(
        &self,
        interval: u32,
        previous_interval: u32,
        tooth_index: u16,
    ) -> Option<ToothVerdict> {
        self.classifier
            .classify(interval, previous_interval, tooth_index)
    }

    fn teeth_present(&self) -> u16 {
        self.teeth_present
    }

    fn tooth_angle(&self, tooth_index: u16) -> u32 {
        self.pitch_angle * u32::from(tooth_index.saturating_sub(1))
    }

    fn interval_pitches(&self, tooth_index: u16) -> u32 {
        if tooth_index == 1 {
            u32::from(self.missing_teeth) + 1
        } else {
            1
        }
    }

    fn pitch_angle(&self) -> u32 {
        self.pitch_angle
    }

    fn widest_interval_angle(&self) -> u32 {
        self.gap_angle()
    }

    fn is_early_edge(&self, interval: u32, previous_interval: u32, tooth_index: u16) -> bool {
        self.classifier
            .is_early(interval, previous_interval, tooth_index)
    }
}
