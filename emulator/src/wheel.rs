//! Synthetic crank and cam signal source.
//!
//! Produces the edge train of an `N-M` wheel turning at a fixed speed, with
//! optional glitches, so the decoder can be exercised without hardware.
//! Simulated time is kept as a 64-bit offset; timestamps handed to the decoder
//! are that offset added (wrapping) to a 32-bit clock base, which is how a
//! free-running capture timer behaves.

use trigger_core::clock::TimestampMicros;

const MICROS_PER_MINUTE: u64 = 60_000_000;

/// One edge emitted by the simulator.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum WheelEdge {
    Crank(TimestampMicros),
    Cam(TimestampMicros),
}

/// Glitch applied to the next present tooth.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Glitch {
    /// Swallow the tooth.
    Drop,
    /// Emit a spurious pulse this many percent of a pitch after the tooth.
    Extra { percent: u8 },
}

pub struct WheelSimulator {
    teeth: u16,
    missing: u16,
    rpm: u32,
    cam_enabled: bool,
    clock_base: u32,
    elapsed: u64,
    /// Simulated time of the next tooth slot, if the wheel is turning.
    next_slot_at: Option<u64>,
    /// Slot reached at `next_slot_at`; slot 0 is tooth one.
    next_slot: u16,
    revolution: u64,
    pending_glitch: Option<Glitch>,
    pending_extra_at: Option<u64>,
    pending_cam_at: Option<u64>,
}

#[derive(Copy, Clone, Debug)]
enum Scheduled {
    Extra,
    Cam,
    Slot,
}

impl WheelSimulator {
    #[must_use]
    pub fn new(teeth: u16, missing: u16) -> Self {
        Self {
            teeth,
            missing,
            rpm: 0,
            cam_enabled: false,
            clock_base: 0,
            elapsed: 0,
            next_slot_at: None,
            next_slot: 0,
            revolution: 0,
            pending_glitch: None,
            pending_extra_at: None,
            pending_cam_at: None,
        }
    }

    #[must_use]
    pub fn rpm(&self) -> u32 {
        self.rpm
    }

    #[must_use]
    pub fn cam_enabled(&self) -> bool {
        self.cam_enabled
    }

    /// Current timestamp as the decoder sees it.
    #[must_use]
    pub fn now(&self) -> TimestampMicros {
        self.timestamp(self.elapsed)
    }

    /// Simulated time since the session started.
    #[must_use]
    pub fn elapsed_micros(&self) -> u64 {
        self.elapsed
    }

    /// Time for one tooth pitch at the current speed.
    #[must_use]
    pub fn pitch_micros(&self) -> Option<u64> {
        if self.rpm == 0 {
            None
        } else {
            Some(MICROS_PER_MINUTE / (u64::from(self.rpm) * u64::from(self.teeth)))
        }
    }

    #[must_use]
    pub fn revolution_micros(&self) -> Option<u64> {
        self.pitch_micros().map(|pitch| pitch * u64::from(self.teeth))
    }

    /// Changes speed. `0` stops the wheel where it is.
    pub fn set_rpm(&mut self, rpm: u32) {
        self.rpm = rpm;
        self.next_slot_at = self
            .pitch_micros()
            .map(|pitch| self.elapsed + pitch);
    }

    pub fn set_cam(&mut self, enabled: bool) {
        self.cam_enabled = enabled;
    }

    pub fn inject(&mut self, glitch: Glitch) {
        self.pending_glitch = Some(glitch);
    }

    /// Moves the clock base so the timestamp counter wraps `micros_before` from now.
    pub fn wrap_clock_in(&mut self, micros_before: u32) {
        let target = u32::MAX - micros_before;
        let offset = self.now();
        self.clock_base = self.clock_base.wrapping_add(target.wrapping_sub(offset));
    }

    /// Advances simulated time by `micros`, reporting every edge on the way.
    pub fn advance(&mut self, micros: u64, mut sink: impl FnMut(WheelEdge)) {
        let until = self.elapsed + micros;
        while let Some((at, kind)) = self.next_event(until) {
            self.elapsed = at;
            match kind {
                Scheduled::Extra => {
                    self.pending_extra_at = None;
                    sink(WheelEdge::Crank(self.timestamp(at)));
                }
                Scheduled::Cam => {
                    self.pending_cam_at = None;
                    sink(WheelEdge::Cam(self.timestamp(at)));
                }
                Scheduled::Slot => self.step_slot(at, &mut sink),
            }
        }
        self.elapsed = until;
    }

    /// Earliest scheduled event no later than `until`. Ties go to glitches and
    /// cam edges before the tooth slot.
    fn next_event(&self, until: u64) -> Option<(u64, Scheduled)> {
        [
            (self.pending_extra_at, Scheduled::Extra),
            (self.pending_cam_at, Scheduled::Cam),
            (self.next_slot_at, Scheduled::Slot),
        ]
        .into_iter()
        .filter_map(|(at, kind)| at.filter(|at| *at <= until).map(|at| (at, kind)))
        .min_by_key(|(at, _)| *at)
    }

    fn step_slot(&mut self, at: u64, sink: &mut impl FnMut(WheelEdge)) {
        let Some(pitch) = self.pitch_micros() else {
            self.next_slot_at = None;
            return;
        };
        let slot = self.next_slot;

        if slot < self.teeth - self.missing {
            match self.pending_glitch.take() {
                Some(Glitch::Drop) => {}
                Some(Glitch::Extra { percent }) => {
                    sink(WheelEdge::Crank(self.timestamp(at)));
                    self.pending_extra_at = Some(at + pitch * u64::from(percent) / 100);
                }
                None => sink(WheelEdge::Crank(self.timestamp(at))),
            }
        }

        // One cam tooth per 720°, half a pitch after tooth one of even revolutions.
        if slot == 0 && self.cam_enabled && self.revolution % 2 == 0 {
            self.pending_cam_at = Some(at + pitch / 2);
        }

        self.next_slot = (slot + 1) % self.teeth;
        if self.next_slot == 0 {
            self.revolution += 1;
        }
        self.next_slot_at = Some(at + pitch);
    }

    fn timestamp(&self, elapsed: u64) -> TimestampMicros {
        #[allow(clippy::cast_possible_truncation)]
        let low = elapsed as u32;
        self.clock_base.wrapping_add(low)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(wheel: &mut WheelSimulator, micros: u64) -> Vec<WheelEdge> {
        let mut edges = Vec::new();
        wheel.advance(micros, |edge| edges.push(edge));
        edges
    }

    #[test]
    fn twelve_minus_one_at_five_thousand_rpm() {
        let mut wheel = WheelSimulator::new(12, 1);
        wheel.set_rpm(5_000);
        assert_eq!(wheel.pitch_micros(), Some(1_000));

        let edges = collect(&mut wheel, 12_000);
        assert_eq!(edges.len(), 11);
        assert_eq!(edges[0], WheelEdge::Crank(1_000));
        assert_eq!(edges[10], WheelEdge::Crank(11_000));

        // The slot at 12_000 is missing; tooth one follows at 13_000.
        let edges = collect(&mut wheel, 1_000);
        assert_eq!(edges, vec![WheelEdge::Crank(13_000)]);
    }

    #[test]
    fn glitches_affect_one_tooth() {
        let mut wheel = WheelSimulator::new(12, 1);
        wheel.set_rpm(5_000);
        wheel.inject(Glitch::Drop);
        let edges = collect(&mut wheel, 2_000);
        assert_eq!(edges, vec![WheelEdge::Crank(2_000)]);

        wheel.inject(Glitch::Extra { percent: 30 });
        let edges = collect(&mut wheel, 1_500);
        assert_eq!(edges, vec![WheelEdge::Crank(3_000), WheelEdge::Crank(3_300)]);

        wheel.inject(Glitch::Extra { percent: 60 });
        let edges = collect(&mut wheel, 1_000);
        assert_eq!(edges, vec![WheelEdge::Crank(4_000), WheelEdge::Crank(4_600)]);
    }

    #[test]
    fn cam_fires_every_other_revolution() {
        let mut wheel = WheelSimulator::new(12, 1);
        wheel.set_rpm(5_000);
        wheel.set_cam(true);
        let cams = collect(&mut wheel, 48_000)
            .into_iter()
            .filter(|edge| matches!(edge, WheelEdge::Cam(_)))
            .count();
        assert_eq!(cams, 2);
    }

    #[test]
    fn stopped_wheel_emits_nothing() {
        let mut wheel = WheelSimulator::new(36, 1);
        assert!(collect(&mut wheel, 1_000_000).is_empty());
        assert_eq!(wheel.elapsed_micros(), 1_000_000);
    }

    #[test]
    fn clock_wrap_is_applied_to_timestamps() {
        let mut wheel = WheelSimulator::new(12, 1);
        wheel.wrap_clock_in(500);
        assert_eq!(wheel.now(), u32::MAX - 500);
        wheel.set_rpm(5_000);
        let edges = collect(&mut wheel, 1_000);
        assert_eq!(edges, vec![WheelEdge::Crank(499)]);
    }
}
