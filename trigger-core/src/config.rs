//! Trigger wheel configuration supplied once per session.
//!
//! The values arrive already parsed from the tuning layer; this module only
//! checks the invariants the decoder relies on so a bad wheel description is
//! refused up front instead of surfacing as a divide-by-zero in the edge path.

use core::fmt;

/// Milli-degrees in one crank revolution.
pub const MILLIDEGREES_PER_REVOLUTION: u32 = 360_000;

/// Largest crank angle the decoder reports before wrapping.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MaxCrankAngle {
    /// Wasted-spark / paired operation: one revolution is a full cycle.
    Degrees360,
    /// Sequential operation: the cycle spans two revolutions and needs a cam reference.
    Degrees720,
}

impl MaxCrankAngle {
    /// Cycle length in milli-degrees.
    #[must_use]
    pub const fn millidegrees(self) -> u32 {
        match self {
            MaxCrankAngle::Degrees360 => MILLIDEGREES_PER_REVOLUTION,
            MaxCrankAngle::Degrees720 => 2 * MILLIDEGREES_PER_REVOLUTION,
        }
    }

    /// Returns `true` when a secondary (cam) reference is required for full sync.
    #[must_use]
    pub const fn is_sequential(self) -> bool {
        matches!(self, MaxCrankAngle::Degrees720)
    }
}

/// Ratio filter applied on top of the fixed tick filter.
///
/// An edge arriving sooner than the given share of the last tooth width is
/// treated as a spurious duplicate.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FilterLevel {
    #[default]
    Off,
    Lite,
    Medium,
    Aggressive,
}

impl FilterLevel {
    /// Share of the last tooth width, in percent.
    #[must_use]
    pub const fn percent(self) -> u32 {
        match self {
            FilterLevel::Off => 0,
            FilterLevel::Lite => 25,
            FilterLevel::Medium => 50,
            FilterLevel::Aggressive => 75,
        }
    }
}

/// Reasons a [`TriggerConfig`] is refused.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// The wheel needs at least two tooth positions.
    TooFewTeeth { teeth: u16 },
    /// Without a gap there is no reference tooth to sync on.
    NoMissingTeeth,
    /// At least one physical tooth has to remain on the wheel.
    TooManyMissingTeeth { teeth: u16, missing: u16 },
    /// Stall detection needs a non-zero minimum cranking speed.
    ZeroStallRpm,
    /// Offset must stay within one cycle in either direction.
    OffsetOutOfRange { offset_millidegrees: i32 },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::TooFewTeeth { teeth } => {
                write!(f, "trigger wheel needs more than one tooth (got {teeth})")
            }
            ConfigError::NoMissingTeeth => f.write_str("trigger wheel has no missing teeth"),
            ConfigError::TooManyMissingTeeth { teeth, missing } => write!(
                f,
                "{missing} missing teeth leave no physical tooth on a {teeth}-tooth wheel"
            ),
            ConfigError::ZeroStallRpm => f.write_str("minimum cranking rpm for stall must be > 0"),
            ConfigError::OffsetOutOfRange {
                offset_millidegrees,
            } => write!(
                f,
                "trigger angle offset {offset_millidegrees} mdeg exceeds the crank cycle"
            ),
        }
    }
}

impl core::error::Error for ConfigError {}

/// Immutable wheel description for one decoding session.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TriggerConfig {
    /// Tooth positions per crank revolution, missing ones included.
    pub teeth_per_revolution: u16,
    /// Consecutive teeth removed to form the reference gap.
    pub missing_teeth: u16,
    /// Angle added to every reported crank angle.
    pub trigger_angle_offset_millidegrees: i32,
    /// Intervals shorter than this many microseconds are dropped as noise.
    pub noise_filter_ticks: u32,
    pub filter_level: FilterLevel,
    pub max_crank_angle: MaxCrankAngle,
    /// Engine speed below which a missing edge counts as a stall.
    pub min_cranking_rpm_for_stall: u16,
    /// Below this speed revolution time follows the last tooth instead of tooth one.
    pub cranking_rpm: u16,
    /// Anomalies tolerated in a row before sync is dropped.
    pub max_consecutive_anomalies: u8,
}

impl TriggerConfig {
    pub const DEFAULT_MIN_CRANKING_RPM_FOR_STALL: u16 = 50;
    pub const DEFAULT_CRANKING_RPM: u16 = 400;
    pub const DEFAULT_MAX_CONSECUTIVE_ANOMALIES: u8 = 3;

    /// Builds a configuration for an `N-M` missing-tooth wheel with default tuning.
    #[must_use]
    pub const fn missing_tooth(teeth_per_revolution: u16, missing_teeth: u16) -> Self {
        Self {
            teeth_per_revolution,
            missing_teeth,
            trigger_angle_offset_millidegrees: 0,
            noise_filter_ticks: 0,
            filter_level: FilterLevel::Off,
            max_crank_angle: MaxCrankAngle::Degrees360,
            min_cranking_rpm_for_stall: Self::DEFAULT_MIN_CRANKING_RPM_FOR_STALL,
            cranking_rpm: Self::DEFAULT_CRANKING_RPM,
            max_consecutive_anomalies: Self::DEFAULT_MAX_CONSECUTIVE_ANOMALIES,
        }
    }

    #[must_use]
    pub const fn with_angle_offset(mut self, offset_millidegrees: i32) -> Self {
        self.trigger_angle_offset_millidegrees = offset_millidegrees;
        self
    }

    #[must_use]
    pub const fn with_noise_filter(mut self, ticks: u32, level: FilterLevel) -> Self {
        self.noise_filter_ticks = ticks;
        self.filter_level = level;
        self
    }

    #[must_use]
    pub const fn with_max_crank_angle(mut self, max_crank_angle: MaxCrankAngle) -> Self {
        self.max_crank_angle = max_crank_angle;
        self
    }

    #[must_use]
    pub const fn with_stall_rpm(mut self, rpm: u16) -> Self {
        self.min_cranking_rpm_for_stall = rpm;
        self
    }

    #[must_use]
    pub const fn with_cranking_rpm(mut self, rpm: u16) -> Self {
        self.cranking_rpm = rpm;
        self
    }

    #[must_use]
    pub const fn with_max_consecutive_anomalies(mut self, limit: u8) -> Self {
        self.max_consecutive_anomalies = limit;
        self
    }

    /// Angular pitch between adjacent tooth positions.
    #[must_use]
    pub const fn angle_per_tooth_millidegrees(&self) -> u32 {
        MILLIDEGREES_PER_REVOLUTION / self.teeth_per_revolution as u32
    }

    /// Checks the invariants the decoder depends on.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub const fn validate(&self) -> Result<(), ConfigError> {
        if self.teeth_per_revolution <= 1 {
            return Err(ConfigError::TooFewTeeth {
                teeth: self.teeth_per_revolution,
            });
        }
        if self.missing_teeth == 0 {
            return Err(ConfigError::NoMissingTeeth);
        }
        if self.missing_teeth >= self.teeth_per_revolution {
            return Err(ConfigError::TooManyMissingTeeth {
                teeth: self.teeth_per_revolution,
                missing: self.missing_teeth,
            });
        }
        if self.min_cranking_rpm_for_stall == 0 {
            return Err(ConfigError::ZeroStallRpm);
        }
        let limit = self.max_crank_angle.millidegrees();
        if self.trigger_angle_offset_millidegrees.unsigned_abs() >= limit {
            return Err(ConfigError::OffsetOutOfRange {
                offset_millidegrees: self.trigger_angle_offset_millidegrees,
            });
        }
        Ok(())
    }
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self::missing_tooth(36, 1)
    }
}
