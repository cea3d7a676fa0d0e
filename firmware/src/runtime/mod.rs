use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt::error;
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_stm32 as hal;
use embassy_stm32::gpio::{Input, Pull};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use static_cell::StaticCell;
use trigger_core::{SharedDecoder, SyncStatus};

use crate::trigger::BOARD_TRIGGER;

mod edge_irq;
mod poll_task;
mod report_task;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

static DECODER: StaticCell<SharedDecoder> = StaticCell::new();
pub(super) static SYNC_CHANGED: Signal<CriticalSectionRawMutex, SyncStatus> = Signal::new();

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let hal::Peripherals { PA0, PA1, .. } = hal::init(hal::Config::default());

    let decoder: &'static SharedDecoder = match SharedDecoder::new(BOARD_TRIGGER) {
        Ok(decoder) => DECODER.init(decoder),
        Err(err) => {
            error!("trigger: invalid wheel configuration: {}", err);
            core::future::pending::<()>().await;
            return;
        }
    };

    // Held for the life of the program so the pins stay in input mode.
    let _crank = Input::new(PA0, Pull::None);
    let _cam = Input::new(PA1, Pull::None);
    edge_irq::arm(decoder);

    spawner
        .spawn(poll_task::run(decoder))
        .expect("failed to spawn poll task");
    spawner
        .spawn(report_task::run())
        .expect("failed to spawn report task");

    core::future::pending::<()>().await;
}
