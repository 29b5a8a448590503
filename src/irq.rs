//! The interrupt service routine: the single producer of received bytes.

use core::sync::atomic::{AtomicU32, Ordering};

use crate::discard::AtomicDiscard;
use crate::regs::{InterruptId, LineStatus, Registers};
use crate::rx_buffer::{Overflow, Producer, Push};

/// Event counters maintained by the interrupt handler.
///
/// Line errors never reach the foreground as errors; the affected byte is
/// read and thrown away. These counters are the only trace they leave.
pub(crate) struct LineErrors {
    overrun: AtomicU32,
    parity: AtomicU32,
    framing: AtomicU32,
    break_: AtomicU32,
    rx_fifo: AtomicU32,
    overflow: AtomicU32,
    discarded: AtomicU32,
}

/// Snapshot of the receive-path counters. See [`Rx::stats`].
///
/// A single line status read can carry several error flags at once, in which
/// case each flag is counted.
///
/// [`Rx::stats`]: crate::Rx::stats
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Stats {
    /// Receiver overrun: the hardware FIFO lost a byte.
    pub overrun: u32,
    /// Parity errors.
    pub parity: u32,
    /// Framing errors.
    pub framing: u32,
    /// Break conditions.
    pub break_detected: u32,
    /// Errors flagged somewhere in the receive FIFO.
    pub rx_fifo: u32,
    /// Buffer overflows: restarts under [`Overflow::Restart`], dropped bytes
    /// under [`Overflow::DropNewest`].
    ///
    /// [`Overflow::Restart`]: crate::Overflow::Restart
    /// [`Overflow::DropNewest`]: crate::Overflow::DropNewest
    pub overflow: u32,
    /// Bytes dropped by the discard filter.
    pub discarded: u32,
}

impl LineErrors {
    pub(crate) const fn new() -> Self {
        Self {
            overrun: AtomicU32::new(0),
            parity: AtomicU32::new(0),
            framing: AtomicU32::new(0),
            break_: AtomicU32::new(0),
            rx_fifo: AtomicU32::new(0),
            overflow: AtomicU32::new(0),
            discarded: AtomicU32::new(0),
        }
    }

    fn bump(counter: &AtomicU32) {
        // Only the interrupt handler writes, so load + store cannot lose an
        // update, and it works on cores without read-modify-write atomics.
        let v = counter.load(Ordering::Relaxed);
        counter.store(v.wrapping_add(1), Ordering::Relaxed);
    }

    fn record(&self, lsr: LineStatus) {
        let flags = [
            (LineStatus::OE, &self.overrun),
            (LineStatus::PE, &self.parity),
            (LineStatus::FE, &self.framing),
            (LineStatus::BI, &self.break_),
            (LineStatus::RXFE, &self.rx_fifo),
        ];
        for (flag, counter) in flags {
            if lsr.contains(flag) {
                Self::bump(counter);
            }
        }
    }

    pub(crate) fn snapshot(&self) -> Stats {
        Stats {
            overrun: self.overrun.load(Ordering::Relaxed),
            parity: self.parity.load(Ordering::Relaxed),
            framing: self.framing.load(Ordering::Relaxed),
            break_detected: self.break_.load(Ordering::Relaxed),
            rx_fifo: self.rx_fifo.load(Ordering::Relaxed),
            overflow: self.overflow.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
        }
    }
}

/// Services UART interrupts. Returned by [`init`](crate::init).
///
/// Move it into the interrupt vector for the UART and call
/// [`IrqHandler::on_interrupt`] from there, once per interrupt.
pub struct IrqHandler<'a, R> {
    pub(crate) regs: R,
    pub(crate) producer: Producer<'a>,
    pub(crate) discard: &'a AtomicDiscard,
    pub(crate) errors: &'a LineErrors,
    pub(crate) overflow: Overflow,
    #[cfg(feature = "async-await")]
    pub(crate) waker: &'a crate::atomic_waker::AtomicWaker,
}

impl<R: Registers> IrqHandler<'_, R> {
    /// Services one interrupt event.
    ///
    /// Never blocks and never loops: a receive event consumes exactly one byte
    /// from the peripheral. Transmit-empty and character-timeout causes are
    /// acknowledged by the IIR read and otherwise ignored.
    pub fn on_interrupt(&mut self) {
        match InterruptId::from_iir(self.regs.interrupt_id()) {
            InterruptId::ReceiveLineStatus => {
                let lsr = self.regs.line_status();
                if lsr.intersects(LineStatus::ERRORS) {
                    // Reading RBR is what clears the error condition.
                    let _ = self.regs.read_rbr();
                    self.errors.record(lsr);
                } else if lsr.contains(LineStatus::RDR) {
                    let byte = self.regs.read_rbr();
                    self.accept(byte);
                }
            }
            InterruptId::ReceiveDataAvailable => {
                let byte = self.regs.read_rbr();
                self.accept(byte);
            }
            InterruptId::TransmitHoldingEmpty
            | InterruptId::CharacterTimeout
            | InterruptId::Other(_) => {}
        }
    }

    fn accept(&mut self, byte: u8) {
        if self.discard.contains(byte) {
            LineErrors::bump(&self.errors.discarded);
            return;
        }
        match self.producer.push(byte, self.overflow) {
            Push::Stored => {
                #[cfg(feature = "async-await")]
                self.waker.wake();
            }
            Push::Restarted | Push::Dropped => LineErrors::bump(&self.errors.overflow),
        }
    }
}

#[cfg(test)]
mod test {
    use crate::sim::SimUart;
    use crate::{Config, DiscardSet, LineStatus, Overflow, UartState, init};

    const CLOCK: u32 = 100_000_000;

    #[test]
    fn hello_then_empty() {
        let sim = SimUart::new();
        let state = UartState::<64>::new();
        let (mut rx, _tx, mut irq) = init(&sim, &state, Config::new(CLOCK, 115_200)).unwrap();

        for &b in b"hello" {
            sim.deliver(b);
            irq.on_interrupt();
        }

        let mut out = [0; 64];
        assert_eq!(rx.read(&mut out), 5);
        assert_eq!(&out[..5], b"hello");
        assert_eq!(rx.read(&mut out), 0);
    }

    #[test]
    fn capacity_four_restarts_after_fourth_byte() {
        let sim = SimUart::new();
        let state = UartState::<4>::new();
        let (mut rx, _tx, mut irq) = init(&sim, &state, Config::new(CLOCK, 9600)).unwrap();

        for &b in b"ABCD" {
            sim.deliver(b);
            irq.on_interrupt();
        }
        assert_eq!(rx.len(), 0);
        assert_eq!(rx.stats().overflow, 1);

        sim.deliver(b'E');
        irq.on_interrupt();
        assert_eq!(rx.len(), 1);

        let mut out = [0; 4];
        assert_eq!(rx.read(&mut out), 1);
        assert_eq!(out[0], b'E');
    }

    #[test]
    fn drop_newest_policy_keeps_first_bytes() {
        let sim = SimUart::new();
        let state = UartState::<4>::new();
        let config = Config::new(CLOCK, 9600).overflow(Overflow::DropNewest);
        let (mut rx, _tx, mut irq) = init(&sim, &state, config).unwrap();

        for &b in b"ABCDEF" {
            sim.deliver(b);
            irq.on_interrupt();
        }
        assert_eq!(rx.stats().overflow, 2);

        let mut out = [0; 4];
        assert_eq!(rx.read(&mut out), 4);
        assert_eq!(&out, b"ABCD");
    }

    #[test]
    fn discard_filter_drops_line_endings() {
        let sim = SimUart::new();
        let state = UartState::<64>::new();
        let (mut rx, _tx, mut irq) = init(&sim, &state, Config::new(CLOCK, 115_200)).unwrap();
        rx.set_discard(Some(&DiscardSet::from_bytes(b"\r\n")));

        for &b in b"hi\r\n" {
            let before = rx.len();
            sim.deliver(b);
            irq.on_interrupt();
            if b == b'\r' || b == b'\n' {
                assert_eq!(rx.len(), before);
            }
        }

        let mut out = [0; 64];
        assert_eq!(rx.read(&mut out), 2);
        assert_eq!(&out[..2], b"hi");
        assert_eq!(rx.stats().discarded, 2);
    }

    #[test]
    fn filter_applies_on_line_status_path() {
        let sim = SimUart::new();
        let state = UartState::<64>::new();
        let (mut rx, _tx, mut irq) = init(&sim, &state, Config::new(CLOCK, 115_200)).unwrap();
        rx.set_discard_bytes(b"\n");

        sim.deliver_with_status(b'\n', LineStatus::empty());
        irq.on_interrupt();
        sim.deliver_with_status(b'k', LineStatus::empty());
        irq.on_interrupt();

        let mut out = [0; 8];
        assert_eq!(rx.read(&mut out), 1);
        assert_eq!(out[0], b'k');
    }

    #[test]
    fn overrun_byte_is_discarded() {
        let sim = SimUart::new();
        let state = UartState::<64>::new();
        let (mut rx, _tx, mut irq) = init(&sim, &state, Config::new(CLOCK, 115_200)).unwrap();

        sim.deliver(b'a');
        irq.on_interrupt();
        sim.deliver_with_status(b'X', LineStatus::OE);
        irq.on_interrupt();

        assert_eq!(rx.len(), 1);
        // The byte must have been read to clear the condition.
        assert!(!sim.line_status_now().contains(LineStatus::RDR));
        assert_eq!(rx.stats().overrun, 1);
    }

    #[test]
    fn every_error_flag_discards_and_counts() {
        let sim = SimUart::new();
        let state = UartState::<64>::new();
        let (rx, _tx, mut irq) = init(&sim, &state, Config::new(CLOCK, 115_200)).unwrap();

        for flag in [
            LineStatus::OE,
            LineStatus::PE,
            LineStatus::FE,
            LineStatus::BI,
            LineStatus::RXFE,
        ] {
            sim.deliver_with_status(b'?', flag);
            irq.on_interrupt();
        }
        sim.deliver_with_status(b'?', LineStatus::PE | LineStatus::FE);
        irq.on_interrupt();

        assert_eq!(rx.len(), 0);
        let stats = rx.stats();
        assert_eq!(stats.overrun, 1);
        assert_eq!(stats.parity, 2);
        assert_eq!(stats.framing, 2);
        assert_eq!(stats.break_detected, 1);
        assert_eq!(stats.rx_fifo, 1);
    }

    #[test]
    fn line_status_without_data_is_a_no_op() {
        let sim = SimUart::new();
        let state = UartState::<64>::new();
        let (rx, _tx, mut irq) = init(&sim, &state, Config::new(CLOCK, 115_200)).unwrap();

        sim.raise_line_status_only();
        irq.on_interrupt();

        assert_eq!(rx.len(), 0);
        assert_eq!(sim.rbr_reads(), 0);
    }

    #[test]
    fn transmit_and_timeout_causes_are_ignored() {
        let sim = SimUart::new();
        let state = UartState::<64>::new();
        let (rx, _tx, mut irq) = init(&sim, &state, Config::new(CLOCK, 115_200)).unwrap();

        sim.raise(crate::InterruptId::TransmitHoldingEmpty);
        irq.on_interrupt();
        sim.raise(crate::InterruptId::CharacterTimeout);
        irq.on_interrupt();
        irq.on_interrupt();

        assert_eq!(rx.len(), 0);
        assert_eq!(sim.rbr_reads(), 0);
    }
}
