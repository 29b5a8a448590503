#![no_std]
#![warn(missing_docs)]
#![doc = include_str!("../README.md")]

use core::sync::atomic::{AtomicBool, Ordering};

pub use clock::{DataBits, LineFormat, Parity, StopBits, divisor, peripheral_clock};
pub use discard::DiscardSet;
pub use irq::{IrqHandler, Stats};
pub use regs::{FifoControl, InterruptEnable, InterruptId, LCR_DLAB, LineStatus, Registers};
pub use rx::Rx;
pub use rx_buffer::Overflow;
use rx_buffer::RxBuffer;
pub use tx::{PRINT_BUFFER_SIZE, Tx};

// Declared first so the log macros are in textual scope for every module.
#[macro_use]
mod fmt;

#[cfg(feature = "async-await")]
pub(crate) mod atomic_waker;
mod clock;
mod discard;
mod irq;
#[cfg(feature = "lpc17xx")]
pub mod lpc17xx;
mod regs;
mod rx;
mod rx_buffer;
#[cfg(any(test, feature = "sim"))]
pub mod sim;
mod tx;

/// Error returned by [`init`] when initialization fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InitError {
    /// [`init`] has already been called with this [`UartState`].
    AlreadyInitialized,
    /// The requested baud rate is zero.
    ZeroBaudRate,
    /// The peripheral clock cannot produce the requested baud rate: the
    /// divisor is zero or does not fit the 16-bit divisor latch.
    BaudRateUnreachable {
        /// The computed divisor.
        divisor: u32,
    },
}

/// Peripheral and driver configuration for [`init`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// Core clock the peripheral clock is derived from.
    pub core_clock_hz: u32,
    /// Line speed in bits per second.
    pub baud_rate: u32,
    /// Character framing.
    pub format: LineFormat,
    /// What the interrupt handler does when the receive buffer fills up.
    pub overflow: Overflow,
}

impl Config {
    /// 8N1 at `baud_rate`, with the default [`Overflow::Restart`] policy.
    pub const fn new(core_clock_hz: u32, baud_rate: u32) -> Self {
        Self {
            core_clock_hz,
            baud_rate,
            format: LineFormat::EIGHT_N_1,
            overflow: Overflow::Restart,
        }
    }

    /// Sets the character framing.
    pub const fn format(mut self, format: LineFormat) -> Self {
        self.format = format;
        self
    }

    /// Sets the character framing from raw Line Control Register bits.
    ///
    /// Only the framing bits (0 to 5) are kept. The divisor latch bit (7) is
    /// managed by [`init`], and the break control bit (6) is dropped so the
    /// line is never held in break after initialization.
    pub const fn mode_bits(mut self, bits: u8) -> Self {
        self.format = LineFormat::from_bits(bits);
        self
    }

    /// Sets the receive buffer overflow policy.
    pub const fn overflow(mut self, overflow: Overflow) -> Self {
        self.overflow = overflow;
        self
    }
}

/// Everything the interrupt handler and the foreground share.
///
/// Place it in a `static` (or anywhere that outlives the handles) and pass it
/// to [`init`]. `N` is the receive buffer capacity.
pub struct UartState<const N: usize> {
    taken: AtomicBool,
    rx: RxBuffer<N>,
    discard: discard::AtomicDiscard,
    errors: irq::LineErrors,
    #[cfg(feature = "async-await")]
    waker: atomic_waker::AtomicWaker,
}

impl<const N: usize> Default for UartState<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> UartState<N> {
    /// Creates the state with an empty buffer and no discard filter.
    pub const fn new() -> Self {
        Self {
            taken: AtomicBool::new(false),
            rx: RxBuffer::new(),
            discard: discard::AtomicDiscard::new(),
            errors: irq::LineErrors::new(),
            #[cfg(feature = "async-await")]
            waker: atomic_waker::AtomicWaker::new(),
        }
    }
}

/// Configures the UART and hands out the driver's three handles.
///
/// In order: routes the pins, derives the peripheral clock from
/// [`Registers::clock_select`], programs the divisor latch and line format,
/// enables and resets the FIFOs, unmasks the interrupt line and finally
/// enables the receive-data-available, transmit-empty and receive-line-status
/// interrupt sources.
///
/// - [`Rx`] reads buffered bytes and configures the discard filter.
/// - [`Tx`] sends bytes and formatted text.
/// - [`IrqHandler`] must be moved into the UART interrupt vector.
///
/// Every handle assumes one foreground context: `Rx` and `Tx` are not meant
/// to be used from two threads or from interrupt handlers.
///
/// # Errors
///
/// - [`InitError::AlreadyInitialized`]: `state` was handed out before. The
///   peripheral is not touched again.
/// - [`InitError::ZeroBaudRate`]: `config.baud_rate` is zero.
/// - [`InitError::BaudRateUnreachable`]: the divisor does not fit 1..=65535.
pub fn init<'a, R, const N: usize>(
    regs: R,
    state: &'a UartState<N>,
    config: Config,
) -> Result<(Rx<'a>, Tx<R>, IrqHandler<'a, R>), InitError>
where
    R: Registers + Copy,
{
    let pclk = peripheral_clock(config.core_clock_hz, regs.clock_select());
    let divisor = match divisor(pclk, config.baud_rate) {
        None => return Err(InitError::ZeroBaudRate),
        Some(d) if d == 0 || d > u32::from(u16::MAX) => {
            warn!("uart: baud rate unreachable, divisor {=u32}", d);
            return Err(InitError::BaudRateUnreachable { divisor: d });
        }
        Some(d) => d,
    };

    if state.taken.swap(true, Ordering::SeqCst) {
        return Err(InitError::AlreadyInitialized);
    }

    debug!(
        "uart: pclk {=u32} Hz, baud {=u32}, divisor {=u32}",
        pclk,
        config.baud_rate,
        divisor
    );

    let mode = config.format.bits();
    let [_, _, dlm, dll] = divisor.to_be_bytes();

    regs.route_pins();
    regs.set_line_control(mode | LCR_DLAB);
    regs.set_divisor_latch(dlm, dll);
    regs.set_line_control(mode);
    regs.set_fifo_control(FifoControl::ENABLE | FifoControl::RX_RESET | FifoControl::TX_RESET);
    regs.unmask_interrupt();
    regs.set_interrupt_enable(InterruptEnable::RBR | InterruptEnable::THRE | InterruptEnable::RLS);

    // SAFETY: The swap on `taken` above guarantees this runs once per state.
    let (producer, consumer) = unsafe { state.rx.split() };

    let rx = Rx {
        consumer,
        discard: &state.discard,
        errors: &state.errors,
        #[cfg(feature = "async-await")]
        waker: &state.waker,
    };
    let irq = IrqHandler {
        regs,
        producer,
        discard: &state.discard,
        errors: &state.errors,
        overflow: config.overflow,
        #[cfg(feature = "async-await")]
        waker: &state.waker,
    };

    Ok((rx, Tx::new(regs), irq))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::sim::SimUart;

    #[test]
    fn programs_peripheral_in_order() {
        let sim = SimUart::new();
        sim.set_clock_select(0b01);
        let state = UartState::<64>::new();
        let config = Config::new(48_000_000, 9600).format(LineFormat {
            data_bits: DataBits::Seven,
            parity: Parity::Odd,
            stop_bits: StopBits::One,
        });
        init(&sim, &state, config).unwrap();

        // 48 MHz / 16 / 9600
        assert_eq!(sim.divisor(), 312);
        assert!(!sim.divisor_written_without_dlab());
        assert_eq!(sim.line_control(), 0b0000_1010);
        assert_eq!(
            sim.fifo_control(),
            FifoControl::ENABLE | FifoControl::RX_RESET | FifoControl::TX_RESET
        );
        assert!(sim.pins_routed());
        assert!(sim.interrupt_unmasked());
        assert_eq!(
            sim.interrupt_enable_now(),
            InterruptEnable::RBR | InterruptEnable::THRE | InterruptEnable::RLS
        );
    }

    #[test]
    fn default_clock_select_is_quarter() {
        let sim = SimUart::new();
        let state = UartState::<64>::new();
        init(&sim, &state, Config::new(100_000_000, 115_200)).unwrap();
        assert_eq!(sim.divisor(), 13);
    }

    #[test]
    fn second_init_is_rejected() {
        let sim = SimUart::new();
        let state = UartState::<64>::new();
        assert!(init(&sim, &state, Config::new(48_000_000, 9600)).is_ok());

        let other = SimUart::new();
        assert_eq!(
            init(&other, &state, Config::new(48_000_000, 9600)).err(),
            Some(InitError::AlreadyInitialized)
        );
        assert!(!other.pins_routed());
    }

    #[test]
    fn bad_baud_rates() {
        let sim = SimUart::new();
        let state = UartState::<64>::new();
        assert_eq!(
            init(&sim, &state, Config::new(48_000_000, 0)).err(),
            Some(InitError::ZeroBaudRate)
        );
        assert_eq!(
            init(&sim, &state, Config::new(1_000, 115_200)).err(),
            Some(InitError::BaudRateUnreachable { divisor: 0 })
        );
        sim.set_clock_select(0b01);
        assert_eq!(
            init(&sim, &state, Config::new(400_000_000, 300)).err(),
            Some(InitError::BaudRateUnreachable { divisor: 83_333 })
        );

        // Rejected configurations leave the state available.
        assert!(init(&sim, &state, Config::new(48_000_000, 9600)).is_ok());
    }

    #[test]
    fn mode_bits_round_trip_into_lcr() {
        let sim = SimUart::new();
        let state = UartState::<64>::new();
        init(&sim, &state, Config::new(48_000_000, 9600).mode_bits(0x1f)).unwrap();
        assert_eq!(sim.line_control(), 0x1f);
    }

    #[test]
    fn mode_bits_drop_break_and_dlab() {
        let sim = SimUart::new();
        let state = UartState::<64>::new();
        init(&sim, &state, Config::new(48_000_000, 9600).mode_bits(0xc3)).unwrap();
        assert_eq!(sim.line_control(), 0x03);
    }

    #[cfg(feature = "async-await")]
    #[test]
    fn wait_for_data_wakes_on_receive() {
        extern crate std;

        use core::future::Future;
        use core::pin::pin;
        use core::task::{Context, Poll, Waker};
        use std::sync::Arc;
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::task::Wake;

        struct Counter(AtomicUsize);
        impl Wake for Counter {
            fn wake(self: Arc<Self>) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let sim = SimUart::new();
        let state = UartState::<8>::new();
        let (mut rx, _tx, mut irq) = init(&sim, &state, Config::new(48_000_000, 9600)).unwrap();

        let counter = Arc::new(Counter(AtomicUsize::new(0)));
        let waker = Waker::from(counter.clone());
        let mut cx = Context::from_waker(&waker);

        {
            let mut fut = pin!(rx.wait_for_data());
            assert_eq!(fut.as_mut().poll(&mut cx), Poll::Pending);

            sim.deliver(b'z');
            irq.on_interrupt();
            assert_eq!(counter.0.load(Ordering::SeqCst), 1);
            assert_eq!(fut.as_mut().poll(&mut cx), Poll::Ready(()));
        }
        assert_eq!(rx.len(), 1);
    }
}
