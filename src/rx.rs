use crate::discard::{AtomicDiscard, DiscardSet};
use crate::irq::{LineErrors, Stats};
use crate::rx_buffer::Consumer;

/// Foreground half of the receive path. Returned by [`init`](crate::init).
///
/// Reads are one-shot and destructive: [`Rx::read`] empties the whole buffer
/// no matter how many bytes fit in the caller's slice.
pub struct Rx<'a> {
    pub(crate) consumer: Consumer<'a>,
    pub(crate) discard: &'a AtomicDiscard,
    pub(crate) errors: &'a LineErrors,
    #[cfg(feature = "async-await")]
    pub(crate) waker: &'a crate::atomic_waker::AtomicWaker,
}

impl Rx<'_> {
    /// Copies buffered bytes into `buf` and empties the receive buffer.
    ///
    /// Returns the number of bytes copied, at most `buf.len()`. Bytes beyond
    /// `buf.len()` are discarded, so size `buf` to [`Rx::capacity`] to never
    /// lose data. Returns 0 without side effects when nothing is buffered.
    ///
    /// Never blocks. The interrupt handler is held off only for the copy.
    pub fn read(&mut self, buf: &mut [u8]) -> usize {
        self.consumer.drain(buf)
    }

    /// Installs a discard filter, or removes it with `None`.
    ///
    /// Takes effect from the next received byte.
    pub fn set_discard(&mut self, filter: Option<&DiscardSet>) {
        match filter {
            Some(_) => trace!("rx: discard filter installed"),
            None => trace!("rx: discard filter cleared"),
        }
        self.discard.store(filter);
    }

    /// Installs a discard filter built from `bytes`. An empty slice clears it.
    pub fn set_discard_bytes(&mut self, bytes: &[u8]) {
        self.set_discard(Some(&DiscardSet::from_bytes(bytes)));
    }

    /// The filter currently installed.
    pub fn discard(&self) -> Option<DiscardSet> {
        self.discard.load()
    }

    /// Number of bytes waiting to be read.
    pub fn len(&self) -> usize {
        self.consumer.len()
    }

    /// Returns `true` if nothing is waiting to be read.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Size of the receive buffer.
    pub fn capacity(&self) -> usize {
        self.consumer.capacity()
    }

    /// Receive-path counters since initialization.
    pub fn stats(&self) -> Stats {
        self.errors.snapshot()
    }

    /// Waits until at least one byte is buffered.
    #[cfg(feature = "async-await")]
    pub async fn wait_for_data(&mut self) {
        core::future::poll_fn(|cx| {
            self.waker.register(cx.waker());

            if self.is_empty() {
                core::task::Poll::Pending
            } else {
                core::task::Poll::Ready(())
            }
        })
        .await
    }
}
