//! Timestamps of the most recent teeth and reference teeth.

use crate::clock::TimestampMicros;

/// Last two accepted tooth edges and the last two reference ("tooth one") edges.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ToothHistory {
    pub last_tooth_time: TimestampMicros,
    pub last_tooth_time_minus_one: TimestampMicros,
    pub tooth_one_time: TimestampMicros,
    pub tooth_one_time_minus_one: TimestampMicros,
    teeth_seen: u8,
    tooth_ones_seen: u8,
}

impl ToothHistory {
    /// Empty history, as after power-up or a reset.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            last_tooth_time: 0,
            last_tooth_time_minus_one: 0,
            tooth_one_time: 0,
            tooth_one_time_minus_one: 0,
            teeth_seen: 0,
            tooth_ones_seen: 0,
        }
    }

    /// Shifts in a newly accepted tooth edge.
    pub fn record_tooth(&mut self, timestamp: TimestampMicros) {
        self.last_tooth_time_minus_one = self.last_tooth_time;
        self.last_tooth_time = timestamp;
        self.teeth_seen = self.teeth_seen.saturating_add(1);
    }

    /// Moves the last tooth edge to `timestamp`, keeping the one before it.
    ///
    /// Used when the last accepted edge turns out to have been an extra pulse
    /// and `timestamp` is the real tooth it stood in for.
    pub fn replace_last_tooth(&mut self, timestamp: TimestampMicros) {
        self.last_tooth_time = timestamp;
    }

    /// Shifts in a reference tooth edge (call after [`record_tooth`](Self::record_tooth)).
    pub fn record_tooth_one(&mut self, timestamp: TimestampMicros) {
        self.tooth_one_time_minus_one = self.tooth_one_time;
        self.tooth_one_time = timestamp;
        self.tooth_ones_seen = self.tooth_ones_seen.saturating_add(1);
    }

    /// Returns `true` once any edge has been recorded.
    #[must_use]
    pub const fn has_tooth(&self) -> bool {
        self.teeth_seen > 0
    }

    /// Interval between the last two teeth, once two have been seen.
    #[must_use]
    pub const fn last_interval(&self) -> Option<u32> {
        if self.teeth_seen >= 2 {
            Some(
                self.last_tooth_time
                    .wrapping_sub(self.last_tooth_time_minus_one),
            )
        } else {
            None
        }
    }

    /// Time for one revolution measured between consecutive reference teeth.
    #[must_use]
    pub const fn tooth_one_interval(&self) -> Option<u32> {
        if self.tooth_ones_seen >= 2 {
            Some(
                self.tooth_one_time
                    .wrapping_sub(self.tooth_one_time_minus_one),
            )
        } else {
            None
        }
    }

    /// Number of reference teeth seen since the last reset (saturating).
    #[must_use]
    pub const fn tooth_ones_seen(&self) -> u8 {
        self.tooth_ones_seen
    }

    /// Forgets every edge.
    pub fn clear(&mut self) {
        *self = Self::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intervals_need_two_samples() {
        let mut history = ToothHistory::new();
        assert!(!history.has_tooth());
        history.record_tooth(1_000);
        assert_eq!(history.last_interval(), None);
        history.record_tooth(2_000);
        assert_eq!(history.last_interval(), Some(1_000));
        assert_eq!(history.last_tooth_time_minus_one, 1_000);
    }

    #[test]
    fn replacing_the_last_tooth_keeps_the_one_before() {
        let mut history = ToothHistory::new();
        history.record_tooth(1_000);
        history.record_tooth(1_600);
        history.replace_last_tooth(2_000);
        assert_eq!(history.last_interval(), Some(1_000));
        assert_eq!(history.last_tooth_time_minus_one, 1_000);
    }

    #[test]
    fn tooth_one_interval_survives_wrap() {
        let mut history = ToothHistory::new();
        history.record_tooth(u32::MAX - 499);
        history.record_tooth_one(u32::MAX - 499);
        assert_eq!(history.tooth_one_interval(), None);
        history.record_tooth(12_000 - 500);
        history.record_tooth_one(12_000 - 500);
        assert_eq!(history.tooth_one_interval(), Some(12_000));
        assert_eq!(history.tooth_ones_seen(), 2);
    }
}
