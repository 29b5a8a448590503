//! 16550-style register contract.
//!
//! The driver never touches memory directly. Everything it needs from the
//! peripheral goes through [`Registers`], so the same interrupt handler runs
//! against the LPC17xx MMIO block or the software model used in tests.

use bitflags::bitflags;

bitflags! {
    /// Line Status Register (LSR).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LineStatus: u8 {
        /// Receiver Data Ready.
        const RDR = 1 << 0;
        /// Overrun Error.
        const OE = 1 << 1;
        /// Parity Error.
        const PE = 1 << 2;
        /// Framing Error.
        const FE = 1 << 3;
        /// Break Interrupt.
        const BI = 1 << 4;
        /// Transmitter Holding Register Empty.
        const THRE = 1 << 5;
        /// Transmitter Empty.
        const TEMT = 1 << 6;
        /// Error in RX FIFO.
        const RXFE = 1 << 7;

        /// Any condition that makes the pending byte unusable.
        const ERRORS = Self::OE.bits()
            | Self::PE.bits()
            | Self::FE.bits()
            | Self::BI.bits()
            | Self::RXFE.bits();
    }
}

bitflags! {
    /// Interrupt Enable Register (IER).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct InterruptEnable: u8 {
        /// Receive Data Available.
        const RBR = 1 << 0;
        /// Transmit Holding Register Empty.
        const THRE = 1 << 1;
        /// Receive Line Status.
        const RLS = 1 << 2;
    }
}

bitflags! {
    /// FIFO Control Register (FCR).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FifoControl: u8 {
        /// Enable both hardware FIFOs.
        const ENABLE = 1 << 0;
        /// Reset the receive FIFO.
        const RX_RESET = 1 << 1;
        /// Reset the transmit FIFO.
        const TX_RESET = 1 << 2;
    }
}

/// Divisor Latch Access Bit in the Line Control Register.
pub const LCR_DLAB: u8 = 1 << 7;

/// Cause of a UART interrupt, decoded from the Interrupt Identification
/// Register (IIR).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InterruptId {
    /// Receive line status: an error flag or a byte with status attached.
    ReceiveLineStatus,
    /// Receive data available.
    ReceiveDataAvailable,
    /// Character timeout indication.
    CharacterTimeout,
    /// Transmit holding register empty.
    TransmitHoldingEmpty,
    /// Anything else, including modem status. Carries the 3-bit cause code.
    Other(u8),
}

impl InterruptId {
    /// Decodes the cause field (bits 3..1) of a raw IIR value.
    ///
    /// The pending bit (bit 0) is not consulted.
    pub const fn from_iir(iir: u8) -> Self {
        match (iir >> 1) & 0x07 {
            0b011 => Self::ReceiveLineStatus,
            0b010 => Self::ReceiveDataAvailable,
            0b110 => Self::CharacterTimeout,
            0b001 => Self::TransmitHoldingEmpty,
            code => Self::Other(code),
        }
    }

    /// Encodes the cause as a raw IIR value with the pending bit cleared
    /// (an interrupt is pending).
    pub const fn to_iir(self) -> u8 {
        let code = match self {
            Self::ReceiveLineStatus => 0b011,
            Self::ReceiveDataAvailable => 0b010,
            Self::CharacterTimeout => 0b110,
            Self::TransmitHoldingEmpty => 0b001,
            Self::Other(code) => code & 0x07,
        };
        code << 1
    }
}

/// Access to one 16550-compatible UART and the board-level plumbing around it.
///
/// All methods take `&self`: implementations are handles to hardware (or to a
/// model of it) and are shared between the interrupt handler and [`Tx`].
///
/// Reading the receive buffer register must clear the data-ready condition,
/// and reading the interrupt identification register must not have side
/// effects beyond what the hardware does.
///
/// [`Tx`]: crate::Tx
pub trait Registers {
    /// Raw Interrupt Identification Register.
    fn interrupt_id(&self) -> u8;

    /// Line Status Register.
    fn line_status(&self) -> LineStatus;

    /// Pops the pending received byte (RBR).
    fn read_rbr(&self) -> u8;

    /// Hands one byte to the Transmit Holding Register (THR).
    fn write_thr(&self, byte: u8);

    /// Current Interrupt Enable Register.
    fn interrupt_enable(&self) -> InterruptEnable;

    /// Overwrites the Interrupt Enable Register.
    fn set_interrupt_enable(&self, ier: InterruptEnable);

    /// Writes the Line Control Register, including [`LCR_DLAB`] when set.
    fn set_line_control(&self, lcr: u8);

    /// Writes the divisor latch pair (DLM, DLL). Only meaningful while
    /// [`LCR_DLAB`] is set.
    fn set_divisor_latch(&self, dlm: u8, dll: u8);

    /// Writes the FIFO Control Register.
    fn set_fifo_control(&self, fcr: FifoControl);

    /// Routes the TX/RX pins to this UART.
    fn route_pins(&self);

    /// Two-bit peripheral clock selection for this UART.
    fn clock_select(&self) -> u8;

    /// Enables this UART's line in the interrupt controller.
    fn unmask_interrupt(&self);
}

impl<R: Registers + ?Sized> Registers for &R {
    fn interrupt_id(&self) -> u8 {
        (**self).interrupt_id()
    }
    fn line_status(&self) -> LineStatus {
        (**self).line_status()
    }
    fn read_rbr(&self) -> u8 {
        (**self).read_rbr()
    }
    fn write_thr(&self, byte: u8) {
        (**self).write_thr(byte)
    }
    fn interrupt_enable(&self) -> InterruptEnable {
        (**self).interrupt_enable()
    }
    fn set_interrupt_enable(&self, ier: InterruptEnable) {
        (**self).set_interrupt_enable(ier)
    }
    fn set_line_control(&self, lcr: u8) {
        (**self).set_line_control(lcr)
    }
    fn set_divisor_latch(&self, dlm: u8, dll: u8) {
        (**self).set_divisor_latch(dlm, dll)
    }
    fn set_fifo_control(&self, fcr: FifoControl) {
        (**self).set_fifo_control(fcr)
    }
    fn route_pins(&self) {
        (**self).route_pins()
    }
    fn clock_select(&self) -> u8 {
        (**self).clock_select()
    }
    fn unmask_interrupt(&self) {
        (**self).unmask_interrupt()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn decode_causes() {
        assert_eq!(InterruptId::from_iir(0x06), InterruptId::ReceiveLineStatus);
        assert_eq!(InterruptId::from_iir(0x04), InterruptId::ReceiveDataAvailable);
        assert_eq!(InterruptId::from_iir(0x0c), InterruptId::CharacterTimeout);
        assert_eq!(InterruptId::from_iir(0x02), InterruptId::TransmitHoldingEmpty);
        assert_eq!(InterruptId::from_iir(0x00), InterruptId::Other(0));
    }

    #[test]
    fn decode_ignores_pending_and_fifo_bits() {
        // FIFO-enabled bits (7:6) and the pending bit must not change the cause.
        assert_eq!(InterruptId::from_iir(0xc5), InterruptId::ReceiveDataAvailable);
        assert_eq!(InterruptId::from_iir(0x01), InterruptId::Other(0));
    }

    #[test]
    fn encode_matches_decode() {
        for id in [
            InterruptId::ReceiveLineStatus,
            InterruptId::ReceiveDataAvailable,
            InterruptId::CharacterTimeout,
            InterruptId::TransmitHoldingEmpty,
        ] {
            assert_eq!(InterruptId::from_iir(id.to_iir()), id);
        }
    }

    #[test]
    fn error_mask_excludes_transmit_flags() {
        assert!(!LineStatus::ERRORS.contains(LineStatus::RDR));
        assert!(!LineStatus::ERRORS.intersects(LineStatus::THRE | LineStatus::TEMT));
        assert_eq!(LineStatus::ERRORS.bits(), 0x9e);
    }
}
