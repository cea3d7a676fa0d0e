use defmt::{info, warn};
use embassy_time::{Duration, Ticker};
use trigger_core::telemetry::EventId;
use trigger_core::{SharedDecoder, ToothClock};

use super::SYNC_CHANGED;
use crate::status;
use crate::trigger::{EmbassyClock, POLL_PERIOD_MILLIS, REPORT_EVERY_POLLS};

/// Runs the stall check, drains decoder events, and publishes status.
#[embassy_executor::task]
pub async fn run(decoder: &'static SharedDecoder) -> ! {
    let clock = EmbassyClock;
    let mut ticker = Ticker::every(Duration::from_millis(POLL_PERIOD_MILLIS));
    let mut next_event: EventId = 0;
    let mut polls: u32 = 0;

    loop {
        ticker.next().await;
        let now = clock.now_micros();
        decoder.tick(now);

        for record in decoder.events_since(next_event) {
            if record.id != next_event {
                warn!(
                    "trigger: {} events overwritten",
                    record.id.wrapping_sub(next_event)
                );
            }
            info!(
                "trigger event #{} at {}us: {}",
                record.id, record.timestamp, record.event
            );
            next_event = record.id.wrapping_add(1);
        }

        let snapshot = decoder.snapshot();
        if status::publish(&snapshot, now) {
            SYNC_CHANGED.signal(snapshot.sync_status());
        }

        polls = polls.wrapping_add(1);
        if polls % REPORT_EVERY_POLLS == 0 {
            let current = status::current();
            info!(
                "trigger: {} rpm, {} mdeg, {}, losses={}",
                current.rpm,
                current.crank_angle_millidegrees,
                current.sync,
                current.sync_loss_count
            );
        }
    }
}
