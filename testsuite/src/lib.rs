#![no_std]

mod logger;

use core::cell::RefCell;
use core::future::Future;
use core::pin::pin;
use core::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};

use cortex_m::peripheral::SCB;
use cortex_m_semihosting::debug::{self, EXIT_FAILURE, EXIT_SUCCESS};
use critical_section::Mutex;
use irq_uart::sim::SimUart;
use irq_uart::{IrqHandler, LineStatus};
use panic_semihosting as _;

pub use cortex_m_rt::{entry, exception};

/// Core clock the examples pretend to run at.
pub const CORE_CLOCK_HZ: u32 = 100_000_000;

/// The UART every example drives. LM3S6965 has no 16550, so the register
/// block is modelled in RAM.
pub static SIM: SimUart = SimUart::new();

static IRQ: Mutex<RefCell<Option<IrqHandler<'static, &'static SimUart>>>> =
    Mutex::new(RefCell::new(None));

pub fn exit_success() -> ! {
    debug::exit(EXIT_SUCCESS);
    #[allow(clippy::empty_loop)]
    loop {}
}

pub fn exit_failure() -> ! {
    debug::exit(EXIT_FAILURE);
    #[allow(clippy::empty_loop)]
    loop {}
}

/// Hands the interrupt handler to [`service_interrupt`].
pub fn install(irq: IrqHandler<'static, &'static SimUart>) {
    critical_section::with(|cs| IRQ.borrow_ref_mut(cs).replace(irq));
}

/// Runs the installed interrupt handler once.
///
/// Examples call this from their `PendSV` exception, which stands in for the
/// UART interrupt vector.
pub fn service_interrupt() {
    critical_section::with(|cs| {
        if let Some(irq) = IRQ.borrow_ref_mut(cs).as_mut() {
            irq.on_interrupt();
        }
    });
}

/// Puts `byte` in the receive register and takes the interrupt.
///
/// PendSV has the lowest priority, so it is taken right after the barriers
/// when called from thread mode with interrupts enabled.
pub fn receive(byte: u8) {
    SIM.deliver(byte);
    pend();
}

/// Like [`receive`], with line status error flags attached.
pub fn receive_with_status(byte: u8, flags: LineStatus) {
    SIM.deliver_with_status(byte, flags);
    pend();
}

/// Feeds `bytes` one interrupt at a time.
pub fn receive_all(bytes: &[u8]) {
    for &b in bytes {
        receive(b);
    }
}

fn pend() {
    SCB::set_pendsv();
    cortex_m::asm::dsb();
    cortex_m::asm::isb();
}

/// Yield once to allow other tasks to run.
pub async fn yield_once() {
    let mut yielded = false;
    core::future::poll_fn(|_cx| {
        if yielded {
            Poll::Ready(())
        } else {
            yielded = true;
            Poll::Pending
        }
    })
    .await
}

/// Minimal block_on executor for testing.
pub fn block_on<F: Future>(fut: F) -> F::Output {
    let mut fut = pin!(fut);

    // Create a no-op waker.
    const VTABLE: RawWakerVTable = RawWakerVTable::new(
        |_| RawWaker::new(core::ptr::null(), &VTABLE),
        |_| {},
        |_| {},
        |_| {},
    );
    let raw_waker = RawWaker::new(core::ptr::null(), &VTABLE);
    let waker = unsafe { Waker::from_raw(raw_waker) };
    let mut cx = Context::from_waker(&waker);

    loop {
        match fut.as_mut().poll(&mut cx) {
            Poll::Ready(val) => return val,
            Poll::Pending => {
                cortex_m::asm::nop();
            }
        }
    }
}

/// Join two futures, polling them alternately until both complete.
pub async fn join<A, B, T, U>(a: A, b: B) -> (T, U)
where
    A: Future<Output = T>,
    B: Future<Output = U>,
{
    let mut a = pin!(a);
    let mut b = pin!(b);
    let mut a_done: Option<T> = None;
    let mut b_done: Option<U> = None;

    core::future::poll_fn(|cx| {
        if a_done.is_none() {
            if let Poll::Ready(val) = a.as_mut().poll(cx) {
                a_done = Some(val);
            }
        }
        if b_done.is_none() {
            if let Poll::Ready(val) = b.as_mut().poll(cx) {
                b_done = Some(val);
            }
        }
        if a_done.is_some() && b_done.is_some() {
            Poll::Ready((a_done.take().unwrap(), b_done.take().unwrap()))
        } else {
            Poll::Pending
        }
    })
    .await
}
