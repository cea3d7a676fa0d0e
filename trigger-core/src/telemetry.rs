//! Decoder health events retained for the polling context.
//!
//! The edge handler appends to a fixed-capacity ring; the polling side walks
//! new records by id and forwards them to its logger. Writing a record is a
//! constant-time copy, so it is safe inside the interrupt path.

use core::fmt;

use heapless::{HistoryBuf, OldestOrdered};

use crate::clock::TimestampMicros;
use crate::state::SyncStatus;

/// Total number of decoder events retained in memory.
pub const TELEMETRY_RING_CAPACITY: usize = 32;

/// Identifier assigned to each record, increasing by one per event.
pub type EventId = u32;

/// Notable decoder transitions.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecoderEvent {
    /// First gap recognized: half sync.
    SyncAcquired,
    /// Full sync reached (clean revolution or cam confirmation).
    SyncPromoted,
    /// Interval outside every band while synced.
    PatternAnomaly { sync_loss_count: u16 },
    /// Too many anomalies in a row; back to unsynced.
    SyncDropped { sync_loss_count: u16 },
    /// Cam reference missing in sequential mode; back to half sync.
    PhaseLost { sync_loss_count: u16 },
    /// No tooth within the stall interval.
    Stalled { previous: SyncStatus },
    /// Caller-requested reset.
    Reset,
}

impl fmt::Display for DecoderEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecoderEvent::SyncAcquired => f.write_str("sync-acquired"),
            DecoderEvent::SyncPromoted => f.write_str("sync-promoted"),
            DecoderEvent::PatternAnomaly { sync_loss_count } => {
                write!(f, "pattern-anomaly losses={sync_loss_count}")
            }
            DecoderEvent::SyncDropped { sync_loss_count } => {
                write!(f, "sync-dropped losses={sync_loss_count}")
            }
            DecoderEvent::PhaseLost { sync_loss_count } => {
                write!(f, "phase-lost losses={sync_loss_count}")
            }
            DecoderEvent::Stalled { previous } => write!(f, "stalled from {previous:?}"),
            DecoderEvent::Reset => f.write_str("reset"),
        }
    }
}

/// Record stored in the ring buffer.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DecoderRecord {
    pub id: EventId,
    pub timestamp: TimestampMicros,
    pub event: DecoderEvent,
}

/// Records decoder events into a fixed-size ring buffer.
pub struct DecoderTelemetry<const CAPACITY: usize = TELEMETRY_RING_CAPACITY> {
    ring: HistoryBuf<DecoderRecord, CAPACITY>,
    next_event_id: EventId,
}

impl<const CAPACITY: usize> DecoderTelemetry<CAPACITY> {
    /// Creates a recorder with an empty history.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            next_event_id: 0,
        }
    }

    /// Appends an event and returns its id.
    pub fn record(&mut self, event: DecoderEvent, timestamp: TimestampMicros) -> EventId {
        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);
        self.ring.write(DecoderRecord {
            id,
            timestamp,
            event,
        });
        id
    }

    /// Returns an iterator over the retained records in chronological order.
    pub fn oldest_first(&self) -> OldestOrdered<'_, DecoderRecord> {
        self.ring.oldest_ordered()
    }

    /// Returns the most recent record, if any.
    #[must_use]
    pub fn latest(&self) -> Option<&DecoderRecord> {
        self.ring.recent()
    }

    /// Id the next record will receive.
    #[must_use]
    pub const fn next_event_id(&self) -> EventId {
        self.next_event_id
    }

    /// Records with `id >= first`, oldest first. Overwritten records are skipped.
    pub fn records_since(&self, first: EventId) -> impl Iterator<Item = &DecoderRecord> {
        self.ring
            .oldest_ordered()
            .filter(move |record| record.id.wrapping_sub(first) < u32::MAX / 2)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }
}

impl<const CAPACITY: usize> Default for DecoderTelemetry<CAPACITY> {
    fn default() -> Self {
        Self::new()
    }
}
