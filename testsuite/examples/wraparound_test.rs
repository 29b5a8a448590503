//! Fill a tiny buffer to capacity and check the restart policy: the buffer
//! empties and the fill level starts over from zero.

#![no_std]
#![no_main]

use irq_uart::{Config, UartState};
use testsuite::{CORE_CLOCK_HZ, SIM, entry, exception, exit_success};

static STATE: UartState<4> = UartState::new();

#[exception]
fn PendSV() {
    testsuite::service_interrupt();
}

#[entry]
fn main() -> ! {
    let (mut rx, _tx, irq) = irq_uart::init(&SIM, &STATE, Config::new(CORE_CLOCK_HZ, 9600))
        .unwrap_or_else(|e| panic!("init failed: {:?}", e));
    testsuite::install(irq);

    let mut buf = [0u8; 8];
    for round in 0..100u32 {
        testsuite::receive_all(b"ABC");
        defmt::assert_eq!(rx.len(), 3);
        // The fourth byte hits capacity and restarts the buffer.
        testsuite::receive_all(b"DE");
        defmt::assert_eq!(rx.len(), 1);

        let n = rx.read(&mut buf);
        defmt::assert_eq!(&buf[..n], b"E");
        if round % 25 == 0 {
            defmt::info!("round {=u32}: {=[u8]:a}", round, &buf[..n]);
        }
    }

    let stats = rx.stats();
    defmt::info!("{}", stats);
    defmt::assert_eq!(stats.overflow, 100);

    exit_success();
}
