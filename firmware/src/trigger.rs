#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Trigger wheel wiring for the board.
//!
//! Crank sensor on PA0 (EXTI0), cam sensor on PA1 (EXTI1), both served by
//! the `EXTI0_1` interrupt. Edges are timestamped from the embassy time
//! driver, which runs at 1 MHz on TIM1.

use trigger_core::{FilterLevel, MaxCrankAngle, TriggerConfig};

/// 36-1 crank wheel with a once-per-cycle cam tooth; tooth one sits 90° after TDC.
pub const BOARD_TRIGGER: TriggerConfig = TriggerConfig::missing_tooth(36, 1)
    .with_angle_offset(90_000)
    .with_noise_filter(20, FilterLevel::Lite)
    .with_max_crank_angle(MaxCrankAngle::Degrees720);

const _: () = assert!(BOARD_TRIGGER.validate().is_ok());

/// EXTI line of the crank sensor (PA0).
pub const CRANK_LINE: usize = 0;

/// EXTI line of the cam sensor (PA1).
pub const CAM_LINE: usize = 1;

/// Period of the stall check and status publication.
pub const POLL_PERIOD_MILLIS: u64 = 10;

/// Status is logged once every this many polls.
pub const REPORT_EVERY_POLLS: u32 = 100;

#[cfg(target_os = "none")]
pub use clock::EmbassyClock;

#[cfg(target_os = "none")]
mod clock {
    use embassy_time::Instant;
    use trigger_core::ToothClock;
    use trigger_core::clock::TimestampMicros;

    /// Tooth clock backed by the embassy time driver.
    #[derive(Copy, Clone, Default)]
    pub struct EmbassyClock;

    impl ToothClock for EmbassyClock {
        #[allow(clippy::cast_possible_truncation)]
        fn now_micros(&self) -> TimestampMicros {
            // Timestamps wrap at 32 bits.
            (Instant::now().as_micros() & u64::from(u32::MAX)) as u32
        }
    }
}
