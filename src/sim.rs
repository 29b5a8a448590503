//! Software model of a 16550-style UART register block.
//!
//! The model implements [`Registers`] so the driver can run where no real
//! peripheral exists: host unit tests, and the QEMU testsuite (the emulated
//! LM3S6965 has a PL011, not a 16550). The test side injects receive events
//! with [`SimUart::deliver`] and friends, then runs the interrupt handler.
//!
//! The transmitter is ready unless [`SimUart::hold_transmitter`] holds it
//! busy for a number of status reads.

use core::cell::RefCell;

use critical_section::Mutex;

use crate::regs::{FifoControl, InterruptEnable, InterruptId, LCR_DLAB, LineStatus, Registers};

/// Bytes kept from the transmit side. Later writes are dropped.
pub const TX_LOG_CAPACITY: usize = 256;

/// IIR value with the pending bit set: no interrupt pending.
const IIR_NONE: u8 = 0x01;

struct State {
    iir: u8,
    rbr: Option<u8>,
    errors: LineStatus,
    ier: InterruptEnable,
    lcr: u8,
    dll: u8,
    dlm: u8,
    divisor_without_dlab: bool,
    fcr: FifoControl,
    clock_select: u8,
    pins_routed: bool,
    unmasked: bool,
    rbr_reads: u32,
    lsr_reads: u32,
    thr_busy_reads: u32,
    tx_while_busy: u32,
    tx: heapless::Vec<u8, TX_LOG_CAPACITY>,
    tx_count: u32,
    tx_with_rbr_enabled: u32,
}

/// A 16550-style register block held in RAM.
///
/// Every access takes a critical section, so one model can be shared between
/// an interrupt handler and foreground code.
pub struct SimUart {
    state: Mutex<RefCell<State>>,
}

impl Default for SimUart {
    fn default() -> Self {
        Self::new()
    }
}

impl SimUart {
    /// A reset peripheral: nothing pending, all interrupts disabled.
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(RefCell::new(State {
                iir: IIR_NONE,
                rbr: None,
                errors: LineStatus::empty(),
                ier: InterruptEnable::empty(),
                lcr: 0,
                dll: 0,
                dlm: 0,
                divisor_without_dlab: false,
                fcr: FifoControl::empty(),
                clock_select: 0,
                pins_routed: false,
                unmasked: false,
                rbr_reads: 0,
                lsr_reads: 0,
                thr_busy_reads: 0,
                tx_while_busy: 0,
                tx: heapless::Vec::new(),
                tx_count: 0,
                tx_with_rbr_enabled: 0,
            })),
        }
    }

    fn with<T>(&self, f: impl FnOnce(&mut State) -> T) -> T {
        critical_section::with(|cs| f(&mut self.state.borrow_ref_mut(cs)))
    }

    /// A byte arrives cleanly: raises a receive-data-available interrupt.
    pub fn deliver(&self, byte: u8) {
        self.with(|s| {
            s.rbr = Some(byte);
            s.errors = LineStatus::empty();
            s.iir = InterruptId::ReceiveDataAvailable.to_iir();
        });
    }

    /// A byte arrives with line status `flags` attached: raises a
    /// receive-line-status interrupt. Non-error flags in `flags` are ignored.
    pub fn deliver_with_status(&self, byte: u8, flags: LineStatus) {
        self.with(|s| {
            s.rbr = Some(byte);
            s.errors = flags & LineStatus::ERRORS;
            s.iir = InterruptId::ReceiveLineStatus.to_iir();
        });
    }

    /// Raises a receive-line-status interrupt with no byte and no error.
    pub fn raise_line_status_only(&self) {
        self.with(|s| {
            s.rbr = None;
            s.errors = LineStatus::empty();
            s.iir = InterruptId::ReceiveLineStatus.to_iir();
        });
    }

    /// Raises an arbitrary interrupt cause without touching the data path.
    pub fn raise(&self, id: InterruptId) {
        self.with(|s| s.iir = id.to_iir());
    }

    /// Makes the next `reads` line status reads report the transmit holding
    /// register as full.
    pub fn hold_transmitter(&self, reads: u32) {
        self.with(|s| s.thr_busy_reads = reads);
    }

    /// Sets the value returned by [`Registers::clock_select`].
    pub fn set_clock_select(&self, sel: u8) {
        self.with(|s| s.clock_select = sel & 0x03);
    }

    /// Line status as the next read would see it, without read side effects.
    pub fn line_status_now(&self) -> LineStatus {
        self.with(|s| Self::lsr(s))
    }

    /// Current Interrupt Enable Register.
    pub fn interrupt_enable_now(&self) -> InterruptEnable {
        self.with(|s| s.ier)
    }

    /// Last Line Control Register write.
    pub fn line_control(&self) -> u8 {
        self.with(|s| s.lcr)
    }

    /// Divisor latch contents.
    pub fn divisor(&self) -> u16 {
        self.with(|s| u16::from_be_bytes([s.dlm, s.dll]))
    }

    /// `true` if the divisor latch was written while DLAB was clear.
    pub fn divisor_written_without_dlab(&self) -> bool {
        self.with(|s| s.divisor_without_dlab)
    }

    /// Last FIFO Control Register write.
    pub fn fifo_control(&self) -> FifoControl {
        self.with(|s| s.fcr)
    }

    /// `true` once [`Registers::route_pins`] ran.
    pub fn pins_routed(&self) -> bool {
        self.with(|s| s.pins_routed)
    }

    /// `true` once [`Registers::unmask_interrupt`] ran.
    pub fn interrupt_unmasked(&self) -> bool {
        self.with(|s| s.unmasked)
    }

    /// Number of line status register reads so far.
    pub fn lsr_reads(&self) -> u32 {
        self.with(|s| s.lsr_reads)
    }

    /// Number of transmit holding register writes made while it was held
    /// full by [`SimUart::hold_transmitter`].
    pub fn tx_while_busy(&self) -> u32 {
        self.with(|s| s.tx_while_busy)
    }

    /// Number of receive buffer register reads so far.
    pub fn rbr_reads(&self) -> u32 {
        self.with(|s| s.rbr_reads)
    }

    /// Everything written to the transmit holding register so far, up to
    /// [`TX_LOG_CAPACITY`] bytes.
    pub fn transmitted(&self) -> heapless::Vec<u8, TX_LOG_CAPACITY> {
        self.with(|s| s.tx.clone())
    }

    /// Total number of bytes written to the transmit holding register,
    /// including those past [`TX_LOG_CAPACITY`].
    pub fn tx_count(&self) -> u32 {
        self.with(|s| s.tx_count)
    }

    /// Number of transmitted bytes written while the receive-data-available
    /// interrupt was enabled.
    pub fn tx_with_rbr_enabled(&self) -> u32 {
        self.with(|s| s.tx_with_rbr_enabled)
    }

    fn lsr(s: &State) -> LineStatus {
        let mut lsr = s.errors;
        if s.thr_busy_reads == 0 {
            lsr |= LineStatus::THRE | LineStatus::TEMT;
        }
        if s.rbr.is_some() {
            lsr |= LineStatus::RDR;
        }
        lsr
    }
}

impl Registers for SimUart {
    fn interrupt_id(&self) -> u8 {
        self.with(|s| {
            let iir = s.iir;
            // Reading IIR acknowledges a transmit-empty interrupt.
            if InterruptId::from_iir(iir) == InterruptId::TransmitHoldingEmpty {
                s.iir = IIR_NONE;
            }
            iir
        })
    }

    fn line_status(&self) -> LineStatus {
        self.with(|s| {
            let lsr = Self::lsr(s);
            s.lsr_reads += 1;
            s.thr_busy_reads = s.thr_busy_reads.saturating_sub(1);
            // Error flags are cleared by the read that reports them.
            s.errors = LineStatus::empty();
            if s.rbr.is_none() && InterruptId::from_iir(s.iir) == InterruptId::ReceiveLineStatus {
                s.iir = IIR_NONE;
            }
            lsr
        })
    }

    fn read_rbr(&self) -> u8 {
        self.with(|s| {
            s.rbr_reads += 1;
            s.errors = LineStatus::empty();
            s.iir = IIR_NONE;
            s.rbr.take().unwrap_or(0)
        })
    }

    fn write_thr(&self, byte: u8) {
        self.with(|s| {
            if s.ier.contains(InterruptEnable::RBR) {
                s.tx_with_rbr_enabled += 1;
            }
            if s.thr_busy_reads > 0 {
                s.tx_while_busy += 1;
            }
            s.tx_count += 1;
            let _ = s.tx.push(byte);
        });
    }

    fn interrupt_enable(&self) -> InterruptEnable {
        self.with(|s| s.ier)
    }

    fn set_interrupt_enable(&self, ier: InterruptEnable) {
        self.with(|s| s.ier = ier);
    }

    fn set_line_control(&self, lcr: u8) {
        self.with(|s| s.lcr = lcr);
    }

    fn set_divisor_latch(&self, dlm: u8, dll: u8) {
        self.with(|s| {
            if s.lcr & LCR_DLAB == 0 {
                s.divisor_without_dlab = true;
            }
            s.dlm = dlm;
            s.dll = dll;
        });
    }

    fn set_fifo_control(&self, fcr: FifoControl) {
        self.with(|s| s.fcr = fcr);
    }

    fn route_pins(&self) {
        self.with(|s| s.pins_routed = true);
    }

    fn clock_select(&self) -> u8 {
        self.with(|s| s.clock_select)
    }

    fn unmask_interrupt(&self) {
        self.with(|s| s.unmasked = true);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn receive_clears_on_read() {
        let sim = SimUart::new();
        sim.deliver(b'q');
        assert_eq!(
            InterruptId::from_iir(sim.interrupt_id()),
            InterruptId::ReceiveDataAvailable
        );
        assert!(sim.line_status().contains(LineStatus::RDR));
        assert_eq!(sim.read_rbr(), b'q');
        assert!(!sim.line_status().contains(LineStatus::RDR));
        assert_eq!(sim.interrupt_id() & 0x01, 0x01);
    }

    #[test]
    fn errors_are_cleared_by_status_read() {
        let sim = SimUart::new();
        sim.deliver_with_status(b'x', LineStatus::FE | LineStatus::THRE);
        let lsr = sim.line_status();
        assert!(lsr.contains(LineStatus::FE | LineStatus::RDR));
        assert!(!sim.line_status().contains(LineStatus::FE));
    }
}
