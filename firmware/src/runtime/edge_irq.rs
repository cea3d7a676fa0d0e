//! Crank and cam edges captured in the `EXTI0_1` interrupt.
//!
//! The handler reads the clock before anything else and feeds the shared
//! decoder directly, so edges reach it in arrival order and executor latency
//! never shows up in tooth intervals.

use core::cell::Cell;

use critical_section::Mutex;
use embassy_stm32::interrupt;
use embassy_stm32::interrupt::{InterruptExt, Priority};
use embassy_stm32::pac;
use trigger_core::{SharedDecoder, ToothClock};

use crate::trigger::{CAM_LINE, CRANK_LINE, EmbassyClock};

/// EXTICR source code for GPIOA.
const PORT_A: u8 = 0;

static EDGE_DECODER: Mutex<Cell<Option<&'static SharedDecoder>>> = Mutex::new(Cell::new(None));

/// Routes both sensor lines to the decoder and unmasks their interrupt.
///
/// The pins must already be configured as inputs.
pub fn arm(decoder: &'static SharedDecoder) {
    critical_section::with(|cs| EDGE_DECODER.borrow(cs).set(Some(decoder)));

    let exti = pac::EXTI;
    for line in [CRANK_LINE, CAM_LINE] {
        exti.exticr(line / 4)
            .modify(|w| w.set_exti(line % 4, PORT_A));
        exti.rtsr(0).modify(|w| w.set_line(line, true));
        exti.ftsr(0).modify(|w| w.set_line(line, false));
        exti.rpr(0).write(|w| w.set_line(line, true));
        exti.imr(0).modify(|w| w.set_line(line, true));
    }

    interrupt::EXTI0_1.set_priority(Priority::P0);
    // SAFETY: the handler only shares state through critical sections.
    unsafe { interrupt::EXTI0_1.enable() };
}

#[interrupt]
fn EXTI0_1() {
    let timestamp = EmbassyClock.now_micros();

    let exti = pac::EXTI;
    let pending = exti.rpr(0).read();
    // Write-one-to-clear; only the lines seen here are acknowledged.
    exti.rpr(0).write_value(pending);

    let Some(decoder) = critical_section::with(|cs| EDGE_DECODER.borrow(cs).get()) else {
        return;
    };
    if pending.line(CRANK_LINE) {
        decoder.on_tooth_edge(timestamp);
    }
    if pending.line(CAM_LINE) {
        decoder.on_secondary_tooth_edge(timestamp);
    }
}
