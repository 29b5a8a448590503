//! `Rx::wait_for_data` resolves once the interrupt handler stores a byte.
//!
//! A sender and a reader task run concurrently using join.

#![no_std]
#![no_main]

use irq_uart::{Config, Rx, UartState};
use testsuite::{CORE_CLOCK_HZ, SIM, block_on, entry, exception, exit_success, join, yield_once};

static STATE: UartState<16> = UartState::new();

#[exception]
fn PendSV() {
    testsuite::service_interrupt();
}

/// Delivers three chunks with yields in between.
async fn sender_task() {
    // Yield to let the reader start waiting.
    yield_once().await;

    for chunk in [&b"one"[..], &b"two"[..], &b"three"[..]] {
        testsuite::receive_all(chunk);
        yield_once().await;
        yield_once().await;
    }
}

/// Waits for data, then reads everything available, until 11 bytes are in.
async fn reader_task(rx: &mut Rx<'static>) -> usize {
    let mut total = 0;
    let mut buf = [0u8; 16];
    while total < 11 {
        rx.wait_for_data().await;
        let n = rx.read(&mut buf);
        defmt::info!("woke with {=[u8]:a}", &buf[..n]);
        total += n;
    }
    total
}

#[entry]
fn main() -> ! {
    let (mut rx, _tx, irq) = irq_uart::init(&SIM, &STATE, Config::new(CORE_CLOCK_HZ, 115_200))
        .unwrap_or_else(|e| panic!("init failed: {:?}", e));
    testsuite::install(irq);

    let ((), total) = block_on(join(sender_task(), reader_task(&mut rx)));
    defmt::assert_eq!(total, 11);

    exit_success();
}
