//! Receive a short line, read it back, then echo it on the transmit side.

#![no_std]
#![no_main]

use irq_uart::{Config, UartState};
use testsuite::{CORE_CLOCK_HZ, SIM, entry, exception, exit_success};

static STATE: UartState<64> = UartState::new();

#[exception]
fn PendSV() {
    testsuite::service_interrupt();
}

#[entry]
fn main() -> ! {
    let (mut rx, mut tx, irq) = irq_uart::init(&SIM, &STATE, Config::new(CORE_CLOCK_HZ, 115_200))
        .unwrap_or_else(|e| panic!("init failed: {:?}", e));
    testsuite::install(irq);
    defmt::info!("divisor {=u16}", SIM.divisor());

    testsuite::receive_all(b"hello");

    let mut buf = [0u8; 16];
    let n = rx.read(&mut buf);
    defmt::info!("read {=usize}: {=[u8]:a}", n, &buf[..n]);
    defmt::assert_eq!(&buf[..n], b"hello");

    defmt::assert_eq!(rx.read(&mut buf), 0);
    defmt::info!("second read empty");

    tx.write(&buf[..n]);
    irq_uart::uprintln!(tx, " ({} bytes)", n);
    let sent = SIM.transmitted();
    defmt::info!("sent {=[u8]:a}", &sent[..]);
    defmt::assert_eq!(&sent[..], b"hello (5 bytes)\r\n");
    defmt::assert_eq!(SIM.tx_with_rbr_enabled(), 0);

    exit_success();
}
