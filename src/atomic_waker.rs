//! Waker slot shared between the reader task and the interrupt handler.

use core::cell::Cell;
use core::task::Waker;

use critical_section::Mutex;

/// Holds at most one waker. The interrupt handler takes it on every buffered
/// byte; the reader registers a fresh one each time it polls.
pub(crate) struct AtomicWaker {
    waker: Mutex<Cell<Option<Waker>>>,
}

impl AtomicWaker {
    pub(crate) const fn new() -> Self {
        Self {
            waker: Mutex::new(Cell::new(None)),
        }
    }

    /// Overwrites the previous waker, if any.
    pub(crate) fn register(&self, new_waker: &Waker) {
        critical_section::with(|cs| {
            let slot = self.waker.borrow(cs);
            match slot.take() {
                Some(w) if w.will_wake(new_waker) => slot.set(Some(w)),
                _ => slot.set(Some(new_waker.clone())),
            }
        });
    }

    /// Wakes and clears the registered waker, if any.
    pub(crate) fn wake(&self) {
        if let Some(w) = critical_section::with(|cs| self.waker.borrow(cs).take()) {
            w.wake();
        }
    }
}

#[cfg(test)]
mod test {
    extern crate std;

    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::task::Wake;

    struct Counter(AtomicUsize);

    impl Wake for Counter {
        fn wake(self: Arc<Self>) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn wake_consumes_registration() {
        let counter = Arc::new(Counter(AtomicUsize::new(0)));
        let waker = Waker::from(counter.clone());
        let slot = AtomicWaker::new();

        slot.wake();
        assert_eq!(counter.0.load(Ordering::SeqCst), 0);

        slot.register(&waker);
        slot.register(&waker);
        slot.wake();
        slot.wake();
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
    }
}
