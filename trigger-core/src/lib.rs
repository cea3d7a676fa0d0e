#![no_std]

// Crank/cam trigger decoding shared by the ECU firmware and host tooling.
//
// Everything here avoids the Rust standard library and dynamic allocation so the
// same decoder runs inside the tooth-edge interrupt path on the MCU and inside
// the emulator on a workstation.

#[macro_use]
mod fmt;

pub mod calc;
pub mod classifier;
pub mod clock;
pub mod config;
pub mod decoder;
pub mod history;
pub mod pattern;
pub mod shared;
pub mod stall;
pub mod state;
pub mod telemetry;

pub use calc::DecoderSnapshot;
pub use classifier::ToothVerdict;
pub use clock::ToothClock;
pub use config::{ConfigError, FilterLevel, MaxCrankAngle, TriggerConfig};
pub use decoder::{Decoder, MissingToothDecoder, ToothOutcome};
pub use pattern::{MissingToothPattern, TriggerPattern};
pub use shared::SharedDecoder;
pub use state::{DecoderState, SyncStatus};
pub use telemetry::{DecoderEvent, DecoderRecord};
