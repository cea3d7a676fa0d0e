use defmt::{info, warn};
use trigger_core::SyncStatus;

use super::SYNC_CHANGED;
use crate::status;

/// Logs every sync transition published by the poll task.
#[embassy_executor::task]
pub async fn run() -> ! {
    loop {
        let sync = SYNC_CHANGED.wait().await;
        let current = status::current();
        match sync {
            SyncStatus::Unsynced => warn!(
                "trigger: sync lost (losses={})",
                current.sync_loss_count
            ),
            SyncStatus::HalfSync | SyncStatus::FullSync => {
                info!("trigger: {} at {} rpm", sync, current.rpm);
            }
        }
    }
}
