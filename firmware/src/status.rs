#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Shared status storage for the firmware target.
//!
//! The poll task publishes the latest decoder readings into atomics so other
//! tasks can read speed and position without entering the decoder's critical
//! section.

use portable_atomic::{AtomicI32, AtomicU8, AtomicU16, AtomicU32, Ordering};
use trigger_core::clock::TimestampMicros;
use trigger_core::{DecoderSnapshot, SyncStatus};

static RPM: AtomicU16 = AtomicU16::new(0);
/// Encoded [`SyncStatus`], see [`encode_sync`].
static SYNC: AtomicU8 = AtomicU8::new(0);
static SYNC_LOSSES: AtomicU16 = AtomicU16::new(0);
static REVOLUTIONS: AtomicU32 = AtomicU32::new(0);
/// Crank angle at the moment of publication, in milli-degrees.
static CRANK_ANGLE: AtomicI32 = AtomicI32::new(0);
/// Timestamp (µs, +1) of the last publication.
static PUBLISHED_AT: AtomicU32 = AtomicU32::new(0);

/// Readings captured by the last [`publish`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub struct TriggerStatus {
    pub rpm: u16,
    pub sync: SyncStatus,
    pub sync_loss_count: u16,
    pub revolution_count: u32,
    pub crank_angle_millidegrees: i32,
    pub published_at: Option<TimestampMicros>,
}

const fn encode_sync(status: SyncStatus) -> u8 {
    match status {
        SyncStatus::Unsynced => 0,
        SyncStatus::HalfSync => 1,
        SyncStatus::FullSync => 2,
    }
}

const fn decode_sync(raw: u8) -> SyncStatus {
    match raw {
        1 => SyncStatus::HalfSync,
        2 => SyncStatus::FullSync,
        _ => SyncStatus::Unsynced,
    }
}

fn encode_micros(micros: TimestampMicros) -> u32 {
    micros.min(u32::MAX - 1) + 1
}

fn decode_micros(raw: u32) -> Option<TimestampMicros> {
    if raw == 0 {
        None
    } else {
        Some(raw.wrapping_sub(1))
    }
}

/// Stores the readings derived from `snapshot` at `now`.
///
/// Returns `true` when the sync status differs from the previous publication.
pub fn publish(snapshot: &DecoderSnapshot, now: TimestampMicros) -> bool {
    let sync = encode_sync(snapshot.sync_status());
    RPM.store(snapshot.rpm(), Ordering::Relaxed);
    SYNC_LOSSES.store(snapshot.state.sync_loss_count(), Ordering::Relaxed);
    REVOLUTIONS.store(snapshot.state.revolution_count(), Ordering::Relaxed);
    CRANK_ANGLE.store(snapshot.crank_angle(now), Ordering::Relaxed);
    PUBLISHED_AT.store(encode_micros(now), Ordering::Relaxed);
    SYNC.swap(sync, Ordering::Relaxed) != sync
}

/// Returns the most recently published readings.
pub fn current() -> TriggerStatus {
    TriggerStatus {
        rpm: RPM.load(Ordering::Relaxed),
        sync: decode_sync(SYNC.load(Ordering::Relaxed)),
        sync_loss_count: SYNC_LOSSES.load(Ordering::Relaxed),
        revolution_count: REVOLUTIONS.load(Ordering::Relaxed),
        crank_angle_millidegrees: CRANK_ANGLE.load(Ordering::Relaxed),
        published_at: decode_micros(PUBLISHED_AT.load(Ordering::Relaxed)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_encoding_covers_every_status() {
        for status in [
            SyncStatus::Unsynced,
            SyncStatus::HalfSync,
            SyncStatus::FullSync,
        ] {
            assert_eq!(decode_sync(encode_sync(status)), status);
        }
        assert_eq!(decode_sync(7), SyncStatus::Unsynced);
    }

    #[test]
    fn publication_time_zero_is_distinct_from_unset() {
        assert_eq!(decode_micros(0), None);
        assert_eq!(decode_micros(encode_micros(0)), Some(0));
        assert_eq!(decode_micros(encode_micros(u32::MAX)), Some(u32::MAX - 1));
    }
}
