//! Register access for the NXP LPC17xx UART1.
//!
//! UART1 is routed to P2.0 (TXD1) and P2.1 (RXD1). The interrupt vector is
//! `UART1` (IRQ 6); bind it to [`IrqHandler::on_interrupt`], for example:
//!
//! ```ignore
//! static STATE: UartState<64> = UartState::new();
//! static IRQ: Mutex<RefCell<Option<IrqHandler<'static, Uart1>>>> =
//!     Mutex::new(RefCell::new(None));
//!
//! #[interrupt]
//! fn UART1() {
//!     critical_section::with(|cs| {
//!         if let Some(irq) = IRQ.borrow_ref_mut(cs).as_mut() {
//!             irq.on_interrupt();
//!         }
//!     });
//! }
//! ```
//!
//! [`IrqHandler::on_interrupt`]: crate::IrqHandler::on_interrupt

use core::ptr::{with_exposed_provenance, with_exposed_provenance_mut};

use cortex_m::interrupt::InterruptNumber;
use cortex_m::peripheral::NVIC;

use crate::regs::{FifoControl, InterruptEnable, LineStatus, Registers};

const UART1_BASE: usize = 0x4001_0000;
const RBR_THR_DLL: usize = 0x00;
const IER_DLM: usize = 0x04;
const IIR_FCR: usize = 0x08;
const LCR: usize = 0x0c;
const LSR: usize = 0x14;

const PINSEL4: usize = 0x4002_c010;
const PCLKSEL0: usize = 0x400f_c1a8;
const PCLK_UART1_SHIFT: u32 = 8;

/// Interrupt line of UART1 in the NVIC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Uart1Irq;

// SAFETY: 6 is the UART1 position in the LPC17xx vector table.
unsafe impl InterruptNumber for Uart1Irq {
    fn number(self) -> u16 {
        6
    }
}

#[inline(always)]
fn read(addr: usize) -> u32 {
    // SAFETY: Only called with fixed, aligned LPC17xx peripheral addresses.
    unsafe { with_exposed_provenance::<u32>(addr).read_volatile() }
}

#[inline(always)]
fn write(addr: usize, value: u32) {
    // SAFETY: Only called with fixed, aligned LPC17xx peripheral addresses.
    unsafe { with_exposed_provenance_mut::<u32>(addr).write_volatile(value) }
}

/// Handle to the UART1 register block.
#[derive(Debug, Clone, Copy)]
pub struct Uart1 {
    _private: (),
}

impl Uart1 {
    /// Creates a handle to the peripheral.
    ///
    /// # Safety
    ///
    /// Nothing else may drive UART1, its pins (P2.0, P2.1) or its NVIC line
    /// while handles are in use by this driver.
    pub const unsafe fn steal() -> Self {
        Self { _private: () }
    }
}

impl Registers for Uart1 {
    fn interrupt_id(&self) -> u8 {
        read(UART1_BASE + IIR_FCR) as u8
    }

    fn line_status(&self) -> LineStatus {
        LineStatus::from_bits_retain(read(UART1_BASE + LSR) as u8)
    }

    fn read_rbr(&self) -> u8 {
        read(UART1_BASE + RBR_THR_DLL) as u8
    }

    fn write_thr(&self, byte: u8) {
        write(UART1_BASE + RBR_THR_DLL, byte.into());
    }

    fn interrupt_enable(&self) -> InterruptEnable {
        InterruptEnable::from_bits_truncate(read(UART1_BASE + IER_DLM) as u8)
    }

    fn set_interrupt_enable(&self, ier: InterruptEnable) {
        write(UART1_BASE + IER_DLM, ier.bits().into());
    }

    fn set_line_control(&self, lcr: u8) {
        write(UART1_BASE + LCR, lcr.into());
    }

    fn set_divisor_latch(&self, dlm: u8, dll: u8) {
        write(UART1_BASE + IER_DLM, dlm.into());
        write(UART1_BASE + RBR_THR_DLL, dll.into());
    }

    fn set_fifo_control(&self, fcr: FifoControl) {
        write(UART1_BASE + IIR_FCR, fcr.bits().into());
    }

    fn route_pins(&self) {
        // Function 2 on P2.0 and P2.1.
        let v = read(PINSEL4) & !0x0000_000f;
        write(PINSEL4, v | 0x0000_000a);
    }

    fn clock_select(&self) -> u8 {
        ((read(PCLKSEL0) >> PCLK_UART1_SHIFT) & 0x03) as u8
    }

    fn unmask_interrupt(&self) {
        // SAFETY: The handler bound to this line only touches state handed
        // to it by `init`, so unmasking cannot break a critical section.
        unsafe { NVIC::unmask(Uart1Irq) };
    }
}
