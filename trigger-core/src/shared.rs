//! Decoder handle shared between the edge interrupt and the polling task.
//!
//! Every accessor takes a `critical_section` for the duration of one decoder
//! call. Derived values (RPM, crank angle) are computed from a snapshot after
//! the section is released so the interrupt is masked only for the copy.

use core::cell::RefCell;

use critical_section::Mutex;
use heapless::Vec;

use crate::calc::DecoderSnapshot;
use crate::clock::TimestampMicros;
use crate::config::{ConfigError, TriggerConfig};
use crate::decoder::{Decoder, ToothOutcome};
use crate::pattern::{MissingToothPattern, TriggerPattern};
use crate::state::SyncStatus;
use crate::telemetry::{DecoderEvent, DecoderRecord, EventId, TELEMETRY_RING_CAPACITY};

/// Interrupt-safe wrapper around a [`Decoder`].
pub struct SharedDecoder<P = MissingToothPattern> {
    inner: Mutex<RefCell<Decoder<P>>>,
}

impl SharedDecoder<MissingToothPattern> {
    /// Builds a shared missing-tooth decoder.
    ///
    /// # Errors
    ///
    /// Propagates configuration validation failures.
    pub fn new(config: TriggerConfig) -> Result<Self, ConfigError> {
        Decoder::new(config).map(Self::from_decoder)
    }
}

impl<P: TriggerPattern> SharedDecoder<P> {
    #[must_use]
    pub const fn from_decoder(decoder: Decoder<P>) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(decoder)),
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut Decoder<P>) -> R) -> R {
        critical_section::with(|cs| f(&mut self.inner.borrow_ref_mut(cs)))
    }

    /// Edge-context entry point for crank teeth.
    pub fn on_tooth_edge(&self, timestamp: TimestampMicros) -> ToothOutcome {
        self.with(|decoder| decoder.on_tooth_edge(timestamp))
    }

    /// Edge-context entry point for cam teeth.
    pub fn on_secondary_tooth_edge(&self, timestamp: TimestampMicros) -> ToothOutcome {
        self.with(|decoder| decoder.on_secondary_tooth_edge(timestamp))
    }

    /// Polling-context stall check.
    pub fn tick(&self, now: TimestampMicros) -> Option<DecoderEvent> {
        self.with(|decoder| decoder.tick(now))
    }

    pub fn reset_decoder(&self, now: TimestampMicros) {
        self.with(|decoder| decoder.reset_decoder(now));
    }

    /// Consistent copy of the decoder state.
    #[must_use]
    pub fn snapshot(&self) -> DecoderSnapshot {
        self.with(|decoder| decoder.snapshot())
    }

    #[must_use]
    pub fn rpm(&self) -> u16 {
        self.snapshot().rpm()
    }

    #[must_use]
    pub fn crank_angle(&self, now: TimestampMicros) -> i32 {
        self.snapshot().crank_angle(now)
    }

    #[must_use]
    pub fn sync_status(&self) -> SyncStatus {
        self.with(|decoder| decoder.sync_status())
    }

    #[must_use]
    pub fn sync_loss_count(&self) -> u16 {
        self.with(|decoder| decoder.sync_loss_count())
    }

    #[must_use]
    pub fn revolution_count(&self) -> u32 {
        self.with(|decoder| decoder.revolution_count())
    }

    /// Copies out the telemetry records with `id >= first`, oldest first.
    #[must_use]
    pub fn events_since(&self, first: EventId) -> Vec<DecoderRecord, TELEMETRY_RING_CAPACITY> {
        self.with(|decoder| {
            let mut records = Vec::new();
            for record in decoder.telemetry().records_since(first) {
                // The ring never holds more than the vector's capacity.
                if records.push(*record).is_err() {
                    break;
                }
            }
            records
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_decoder_reaches_half_sync() {
        let shared = SharedDecoder::new(TriggerConfig::missing_tooth(12, 1)).expect("valid wheel");
        let mut now = 1_000;
        for _ in 0..11 {
            shared.on_tooth_edge(now);
            now += 1_000;
        }
        shared.on_tooth_edge(now + 1_000);
        assert_eq!(shared.sync_status(), SyncStatus::HalfSync);
        assert_eq!(shared.rpm(), 5_000);

        let events = shared.events_since(0);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, DecoderEvent::SyncAcquired);
        assert!(shared.events_since(1).is_empty());
    }
}
