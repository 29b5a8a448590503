//! Fixed-capacity receive buffer shared between the interrupt handler and the
//! foreground reader.

use core::{
    cell::UnsafeCell,
    sync::atomic::{AtomicUsize, Ordering},
};

/// What the producer does when an append fills the buffer.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Overflow {
    /// Store the byte, then reset the length to zero and start collecting
    /// again from index 0. Everything buffered so far is lost, including the
    /// byte that filled the buffer.
    #[default]
    Restart,
    /// Keep the full buffer untouched and drop incoming bytes until the next
    /// read drains it.
    DropNewest,
}

/// Outcome of a single [`Producer::push`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Push {
    /// The byte is visible to the next read.
    Stored,
    /// The byte filled the buffer and the buffer restarted empty.
    Restarted,
    /// The buffer was full and the byte was dropped.
    Dropped,
}

/// Storage for up to `N` received bytes plus the count of valid ones.
///
/// `storage[..len]` holds the bytes in arrival order. Only the interrupt
/// handler appends and only the foreground reader drains; see
/// [`RxBuffer::split`].
pub struct RxBuffer<const N: usize> {
    /// Number of valid bytes.
    ///
    /// Always `<= N`. With [`Overflow::Restart`] it is `< N` between appends.
    len: AtomicUsize,
    storage: [UnsafeCell<u8>; N],
}

// SAFETY: `storage` is only reached through the `Producer` and `Consumer`
// created by `split`, which is called at most once. The producer writes only
// at index `len`, past what the consumer may read, and the consumer reads
// inside a critical section during which the producer cannot run.
unsafe impl<const N: usize> Sync for RxBuffer<N> {}

impl<const N: usize> Default for RxBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> RxBuffer<N> {
    /// Creates an empty buffer.
    pub const fn new() -> Self {
        assert!(N > 0, "receive buffer capacity must be non-zero");
        RxBuffer {
            len: AtomicUsize::new(0),
            storage: [const { UnsafeCell::new(0) }; N],
        }
    }

    /// Splits the buffer into the appending and draining halves.
    ///
    /// # Safety
    ///
    /// Must be called at most once for the lifetime of the buffer. A second
    /// `Producer` would race the first on `storage[len]`.
    pub(crate) unsafe fn split(&self) -> (Producer<'_>, Consumer<'_>) {
        (
            Producer {
                len: &self.len,
                buf: &self.storage,
            },
            Consumer {
                len: &self.len,
                buf: &self.storage,
            },
        )
    }
}

/// Appends received bytes. Owned by the interrupt handler.
pub(crate) struct Producer<'a> {
    len: &'a AtomicUsize,
    buf: &'a [UnsafeCell<u8>],
}

/// Drains received bytes. Owned by the foreground reader.
pub(crate) struct Consumer<'a> {
    len: &'a AtomicUsize,
    buf: &'a [UnsafeCell<u8>],
}

// SAFETY: Only one Producer exists per buffer (enforced by `split`) and it
// only touches the slot at the current length, which the Consumer never reads.
unsafe impl Send for Producer<'_> {}

// SAFETY: Only one Consumer exists per buffer (enforced by `split`) and it
// only reads the buffer inside a critical section, so it never observes a
// slot while the Producer is writing it.
unsafe impl Send for Consumer<'_> {}

impl Producer<'_> {
    /// Appends `byte` according to `overflow`.
    ///
    /// Must run in a context the consumer cannot preempt, i.e. the interrupt
    /// handler.
    #[inline]
    pub(crate) fn push(&mut self, byte: u8, overflow: Overflow) -> Push {
        // Relaxed: only the producer increments `len`, and a concurrent drain
        // cannot happen while the interrupt handler runs.
        let len = self.len.load(Ordering::Relaxed);
        let cap = self.buf.len();

        if len >= cap {
            // Only reachable with `DropNewest`.
            return Push::Dropped;
        }

        // SAFETY: `len < cap` so the index is in bounds. The consumer only reads
        // `buf[..len]`, so this slot is producer-owned.
        unsafe { self.buf[len].get().write(byte) };

        let new_len = len + 1;
        if new_len == cap {
            match overflow {
                Overflow::Restart => {
                    self.len.store(0, Ordering::Release);
                    return Push::Restarted;
                }
                Overflow::DropNewest => {}
            }
        }
        // Release: publishes the byte written above before the new length.
        self.len.store(new_len, Ordering::Release);
        Push::Stored
    }
}

impl Consumer<'_> {
    /// Number of bytes currently buffered.
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    /// Total number of slots.
    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Copies up to `out.len()` buffered bytes into `out` and empties the
    /// buffer.
    ///
    /// Bytes that do not fit in `out` are discarded. Returns the number of
    /// bytes copied; an empty buffer returns 0 and is left untouched.
    ///
    /// The length check, copy and reset run in one critical section so the
    /// interrupt handler cannot append a byte that the reset would then lose.
    pub(crate) fn drain(&mut self, out: &mut [u8]) -> usize {
        critical_section::with(|_| {
            // Acquire: pairs with the producer's Release store.
            let len = self.len.load(Ordering::Acquire);
            if len == 0 {
                return 0;
            }

            let n = len.min(out.len());
            for (dst, src) in out[..n].iter_mut().zip(&self.buf[..n]) {
                // SAFETY: `src` lies in `buf[..len]`, which the producer has
                // published and will not touch until `len` is reset below. The
                // critical section keeps the producer from running meanwhile.
                *dst = unsafe { src.get().read() };
            }
            self.len.store(0, Ordering::Release);
            n
        })
    }
}
