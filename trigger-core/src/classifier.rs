//! Interval classification for evenly spaced wheels with one gap.
//!
//! Ratios are compared in half-steps so the edge path never touches floating
//! point: the tooth band is `[0.5, 1.5)` of the previous per-tooth interval and
//! the gap band is `[M + 0.5, M + 1.5]` for `M` missing teeth.

use crate::config::TriggerConfig;

/// Verdict for an interval that passed the noise filter.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ToothVerdict {
    /// Regular tooth pitch.
    Tooth,
    /// The deliberate gap; the edge that closed it is tooth one.
    MissingToothGap,
    /// Neither a tooth nor the gap where one was expected.
    Anomaly,
}

/// Ratio band an interval falls into, ignoring wheel position.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Band {
    Short,
    Tooth,
    Gap,
    Long,
}

/// Classifier configured for one missing-tooth wheel.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PatternClassifier {
    missing_teeth: u16,
    teeth_present: u16,
    noise_filter_ticks: u32,
    filter_percent: u32,
}

impl PatternClassifier {
    #[must_use]
    pub const fn new(config: &TriggerConfig) -> Self {
        Self {
            missing_teeth: config.missing_teeth,
            teeth_present: config.teeth_per_revolution - config.missing_teeth,
            noise_filter_ticks: config.noise_filter_ticks,
            filter_percent: config.filter_level.percent(),
        }
    }

    /// Shortest interval accepted after a tooth of `previous_interval` width.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn noise_threshold(&self, previous_interval: u32) -> u32 {
        let ratio = (previous_interval as u64 * self.filter_percent as u64 / 100) as u32;
        if ratio > self.noise_filter_ticks {
            ratio
        } else {
            self.noise_filter_ticks
        }
    }

    /// Classifies `interval` given the previous per-tooth interval and the index
    /// of the tooth that opened it (`0` while the wheel position is unknown).
    ///
    /// Returns `None` when the edge is noise and must be dropped.
    #[must_use]
    pub fn classify(
        &self,
        interval: u32,
        previous_interval: u32,
        tooth_index: u16,
    ) -> Option<ToothVerdict> {
        if interval < self.noise_threshold(previous_interval) {
            return None;
        }
        if previous_interval == 0 {
            return Some(ToothVerdict::Tooth);
        }

        let band = self.band(interval, previous_interval);
        let verdict = if tooth_index == 0 {
            match band {
                Band::Tooth => ToothVerdict::Tooth,
                Band::Gap => ToothVerdict::MissingToothGap,
                Band::Short | Band::Long => ToothVerdict::Anomaly,
            }
        } else if tooth_index >= self.teeth_present {
            match band {
                Band::Gap => ToothVerdict::MissingToothGap,
                _ => ToothVerdict::Anomaly,
            }
        } else {
            match band {
                Band::Tooth => ToothVerdict::Tooth,
                _ => ToothVerdict::Anomaly,
            }
        };
        Some(verdict)
    }

    /// Returns `true` when an edge ending `interval` came too early to be the
    /// next physical tooth: inside the first half of a pitch, or anywhere short
    /// of the gap band while the gap is due.
    #[must_use]
    pub fn is_early(&self, interval: u32, previous_interval: u32, tooth_index: u16) -> bool {
        if previous_interval == 0 {
            return false;
        }
        match self.band(interval, previous_interval) {
            Band::Short => true,
            Band::Tooth => tooth_index >= self.teeth_present,
            Band::Long => {
                tooth_index >= self.teeth_present
                    && u64::from(interval) * 2
                        < u64::from(previous_interval) * (2 * u64::from(self.missing_teeth) + 1)
            }
            Band::Gap => false,
        }
    }

    fn band(&self, interval: u32, previous_interval: u32) -> Band {
        let doubled = u64::from(interval) * 2;
        let previous = u64::from(previous_interval);
        let gap_low = previous * (2 * u64::from(self.missing_teeth) + 1);
        let gap_high = previous * (2 * u64::from(self.missing_teeth) + 3);

        if doubled < previous {
            Band::Short
        } else if doubled < previous * 3 {
            Band::Tooth
        } else if (gap_low..=gap_high).contains(&doubled) {
            Band::Gap
        } else {
            // Includes the stretch between one pitch and the gap on wheels with
            // several missing teeth.
            Band::Long
        }
    }
}
