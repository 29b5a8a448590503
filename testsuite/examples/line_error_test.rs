//! Bytes that arrive with a line error are read out of the peripheral and
//! thrown away; only the counters remember them.

#![no_std]
#![no_main]

use irq_uart::{Config, LineStatus, UartState};
use testsuite::{CORE_CLOCK_HZ, SIM, entry, exception, exit_success};

static STATE: UartState<64> = UartState::new();

#[exception]
fn PendSV() {
    testsuite::service_interrupt();
}

#[entry]
fn main() -> ! {
    let (mut rx, _tx, irq) = irq_uart::init(&SIM, &STATE, Config::new(CORE_CLOCK_HZ, 115_200))
        .unwrap_or_else(|e| panic!("init failed: {:?}", e));
    testsuite::install(irq);

    testsuite::receive(b'o');
    testsuite::receive_with_status(b'X', LineStatus::OE);
    testsuite::receive_with_status(b'Y', LineStatus::PE | LineStatus::FE);
    testsuite::receive_with_status(0, LineStatus::BI | LineStatus::RXFE);
    testsuite::receive(b'k');

    let mut buf = [0u8; 8];
    let n = rx.read(&mut buf);
    defmt::info!("read {=[u8]:a}", &buf[..n]);
    defmt::assert_eq!(&buf[..n], b"ok");

    // Every error byte was still taken out of the receive register.
    defmt::assert_eq!(SIM.rbr_reads(), 5);
    defmt::assert!(!SIM.line_status_now().intersects(LineStatus::ERRORS));

    let stats = rx.stats();
    defmt::info!("{}", stats);
    defmt::assert_eq!(stats.overrun, 1);
    defmt::assert_eq!(stats.parity, 1);
    defmt::assert_eq!(stats.framing, 1);
    defmt::assert_eq!(stats.break_detected, 1);
    defmt::assert_eq!(stats.rx_fifo, 1);

    exit_success();
}
