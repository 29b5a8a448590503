//! Byte values the interrupt handler drops before buffering.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

const WORDS: usize = 256 / 32;

/// A set of byte values, one bit per value.
///
/// ```
/// use irq_uart::DiscardSet;
///
/// const LINE_ENDINGS: DiscardSet = DiscardSet::from_bytes(b"\r\n");
/// assert!(LINE_ENDINGS.contains(b'\n'));
/// assert!(!LINE_ENDINGS.contains(b'a'));
/// ```
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DiscardSet {
    words: [u32; WORDS],
}

impl DiscardSet {
    /// The empty set.
    pub const EMPTY: Self = Self { words: [0; WORDS] };

    /// Builds a set containing every byte of `bytes`.
    ///
    /// Unlike a C string, `bytes` has no terminator: NUL is only part of the
    /// set if it appears in `bytes`.
    pub const fn from_bytes(bytes: &[u8]) -> Self {
        let mut set = Self::EMPTY;
        let mut i = 0;
        while i < bytes.len() {
            set = set.with(bytes[i]);
            i += 1;
        }
        set
    }

    /// Returns a copy of the set with `byte` added.
    pub const fn with(mut self, byte: u8) -> Self {
        self.words[(byte >> 5) as usize] |= 1 << (byte & 0x1f);
        self
    }

    /// Returns `true` if `byte` is in the set.
    #[inline]
    pub const fn contains(&self, byte: u8) -> bool {
        self.words[(byte >> 5) as usize] & (1 << (byte & 0x1f)) != 0
    }

    /// Returns `true` if no byte is in the set.
    pub const fn is_empty(&self) -> bool {
        let mut i = 0;
        while i < WORDS {
            if self.words[i] != 0 {
                return false;
            }
            i += 1;
        }
        true
    }
}

impl From<&[u8]> for DiscardSet {
    fn from(bytes: &[u8]) -> Self {
        Self::from_bytes(bytes)
    }
}

/// The filter currently installed, readable from the interrupt handler.
///
/// Each membership test is one atomic word load, so a lookup never observes a
/// half-written bit for the byte it asks about. Installing a new filter while
/// the interrupt handler runs is last-writer-wins: individual bytes are tested
/// against either the old or the new membership.
pub(crate) struct AtomicDiscard {
    enabled: AtomicBool,
    words: [AtomicU32; WORDS],
}

impl AtomicDiscard {
    pub(crate) const fn new() -> Self {
        Self {
            enabled: AtomicBool::new(false),
            words: [const { AtomicU32::new(0) }; WORDS],
        }
    }

    /// Installs `set`, or clears the filter with `None`.
    pub(crate) fn store(&self, set: Option<&DiscardSet>) {
        match set {
            Some(set) => {
                for (dst, &src) in self.words.iter().zip(&set.words) {
                    dst.store(src, Ordering::Relaxed);
                }
                self.enabled.store(!set.is_empty(), Ordering::Release);
            }
            None => {
                self.enabled.store(false, Ordering::Release);
                for w in &self.words {
                    w.store(0, Ordering::Relaxed);
                }
            }
        }
    }

    /// Returns `true` if `byte` must be dropped.
    #[inline]
    pub(crate) fn contains(&self, byte: u8) -> bool {
        if !self.enabled.load(Ordering::Acquire) {
            return false;
        }
        let word = self.words[(byte >> 5) as usize].load(Ordering::Relaxed);
        word & (1 << (byte & 0x1f)) != 0
    }

    /// Snapshot of the installed filter, `None` when disabled.
    pub(crate) fn load(&self) -> Option<DiscardSet> {
        if !self.enabled.load(Ordering::Acquire) {
            return None;
        }
        let mut set = DiscardSet::EMPTY;
        for (dst, src) in set.words.iter_mut().zip(&self.words) {
            *dst = src.load(Ordering::Relaxed);
        }
        Some(set)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn membership_covers_whole_byte_range() {
        let set = DiscardSet::from_bytes(&[0x00, 0x1f, 0x20, 0x7f, 0x80, 0xff]);
        for b in 0..=u8::MAX {
            let expected = matches!(b, 0x00 | 0x1f | 0x20 | 0x7f | 0x80 | 0xff);
            assert_eq!(set.contains(b), expected, "byte {b:#04x}");
        }
    }

    #[test]
    fn nul_is_not_implied() {
        let set = DiscardSet::from_bytes(b"\r\n");
        assert!(!set.contains(0));
    }

    #[test]
    fn empty_set() {
        assert!(DiscardSet::EMPTY.is_empty());
        assert!(DiscardSet::from_bytes(b"").is_empty());
        assert!(!DiscardSet::EMPTY.with(b'x').is_empty());
    }

    #[test]
    fn installed_filter_follows_last_store() {
        let f = AtomicDiscard::new();
        assert!(!f.contains(b'\r'));
        assert_eq!(f.load(), None);

        f.store(Some(&DiscardSet::from_bytes(b"\r\n")));
        assert!(f.contains(b'\r'));
        assert!(f.contains(b'\n'));
        assert!(!f.contains(b'h'));

        f.store(Some(&DiscardSet::from_bytes(b"h")));
        assert!(!f.contains(b'\r'));
        assert!(f.contains(b'h'));
        assert_eq!(f.load(), Some(DiscardSet::from_bytes(b"h")));

        f.store(None);
        assert!(!f.contains(b'h'));
        assert_eq!(f.load(), None);
    }

    #[test]
    fn storing_empty_set_disables() {
        let f = AtomicDiscard::new();
        f.store(Some(&DiscardSet::EMPTY));
        assert_eq!(f.load(), None);
    }
}
