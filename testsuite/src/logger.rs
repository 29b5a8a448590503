//! defmt global logger writing rzcobs frames to semihosting stdout.
//!
//! The xtask runner captures QEMU's stdout and decodes the frames against the
//! example ELF.

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicUsize, Ordering, compiler_fence};

use cortex_m_semihosting::hio::{self, HostStream};
use critical_section::RestoreState;
use defmt::Encoder;

#[defmt::global_logger]
struct Logger;

struct LoggerState {
    stdout: UnsafeCell<Option<HostStream>>,
    cs_state: UnsafeCell<RestoreState>,
    encoder: UnsafeCell<Encoder>,
    /// 0 = idle, 1 = logging, 2+ = a log statement fired while logging
    /// (from an exception or a panic), which is dropped.
    depth: AtomicUsize,
}

// SAFETY: `stdout`, `cs_state` and `encoder` are only accessed between
// `acquire` and `release`, i.e. inside a critical section, by the depth-1
// owner.
unsafe impl Sync for LoggerState {}

static STATE: LoggerState = LoggerState {
    stdout: UnsafeCell::new(None),
    cs_state: UnsafeCell::new(RestoreState::invalid()),
    encoder: UnsafeCell::new(Encoder::new()),
    depth: AtomicUsize::new(0),
};

/// # Safety
///
/// Must be called from within a critical section.
unsafe fn emit(bytes: &[u8]) {
    // SAFETY: Caller guarantees we're in a critical section.
    let stdout = unsafe { &mut *STATE.stdout.get() };

    // Opened once; reopening would truncate the capture.
    if stdout.is_none() {
        *stdout = hio::hstdout().ok();
    }
    if let Some(out) = stdout {
        let _ = out.write_all(bytes);
    }
}

// SAFETY: `acquire` enters a critical section that `release` leaves, all
// shared state is touched only in between, and nested use is dropped.
unsafe impl defmt::Logger for Logger {
    fn acquire() {
        if STATE.depth.fetch_add(1, Ordering::Acquire) > 0 {
            return;
        }

        // SAFETY: Released in `release`; defmt balances acquire/release.
        let restore = unsafe { critical_section::acquire() };
        compiler_fence(Ordering::SeqCst);

        // SAFETY: In the critical section.
        unsafe { STATE.cs_state.get().write(restore) };
        // SAFETY: In the critical section; `emit` runs inside it too.
        unsafe { &mut *STATE.encoder.get() }.start_frame(|b| unsafe { emit(b) });
    }

    unsafe fn flush() {}

    unsafe fn release() {
        if STATE.depth.fetch_sub(1, Ordering::Release) != 1 {
            return;
        }

        // SAFETY: Still inside the critical section from `acquire`.
        unsafe { &mut *STATE.encoder.get() }.end_frame(|b| unsafe { emit(b) });
        compiler_fence(Ordering::SeqCst);

        // SAFETY: Restores the state saved by the matching `acquire`.
        unsafe { critical_section::release(STATE.cs_state.get().read()) };
    }

    unsafe fn write(bytes: &[u8]) {
        if STATE.depth.load(Ordering::Relaxed) != 1 {
            return;
        }

        // SAFETY: defmt calls this between `acquire` and `release`.
        unsafe { &mut *STATE.encoder.get() }.write(bytes, |b| unsafe { emit(b) });
    }
}
