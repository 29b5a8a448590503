//! Blocking, polled transmit.

use core::fmt;

use crate::regs::{InterruptEnable, LineStatus, Registers};

/// Size of the scratch buffer used by [`Tx::print`], terminator slot included.
pub const PRINT_BUFFER_SIZE: usize = 1024;

/// Transmit half of the driver. Returned by [`init`](crate::init).
///
/// Owns the scratch buffer for formatted output, so formatted prints from
/// one `Tx` never interleave with another.
pub struct Tx<R> {
    pub(crate) regs: R,
    scratch: [u8; PRINT_BUFFER_SIZE],
}

impl<R: Registers> Tx<R> {
    pub(crate) const fn new(regs: R) -> Self {
        Self {
            regs,
            scratch: [0; PRINT_BUFFER_SIZE],
        }
    }

    /// Sends `bytes`, spinning on the transmit-holding-empty flag before each.
    ///
    /// The receive-data-available interrupt is disabled for the duration and
    /// re-enabled afterwards. Bytes arriving meanwhile wait in the hardware
    /// FIFO and are lost only if it overflows.
    ///
    /// Returns once the last byte is in the holding register, not once it is
    /// on the wire. Hangs forever if the transmitter never reports empty.
    pub fn write(&mut self, bytes: &[u8]) {
        send(&self.regs, bytes);
    }

    /// Sends the bytes of `text`.
    pub fn write_string(&mut self, text: &str) {
        self.write(text.as_bytes());
    }

    /// Formats `args` into the scratch buffer, then sends it.
    ///
    /// Output longer than `PRINT_BUFFER_SIZE - 1` bytes is cut short without
    /// notice. See also [`uprint!`](crate::uprint).
    pub fn print(&mut self, args: fmt::Arguments<'_>) {
        let mut cursor = Truncate {
            buf: &mut self.scratch[..PRINT_BUFFER_SIZE - 1],
            pos: 0,
        };
        // `Truncate` never fails. An `Err` can only come from a `Display`
        // impl, and whatever was rendered before it is still sent.
        let _ = fmt::write(&mut cursor, args);
        let len = cursor.pos;

        send(&self.regs, &self.scratch[..len]);
    }
}

fn send<R: Registers>(regs: &R, bytes: &[u8]) {
    let ier = regs.interrupt_enable();
    regs.set_interrupt_enable(ier.difference(InterruptEnable::RBR));

    for &b in bytes {
        while !regs.line_status().contains(LineStatus::THRE) {
            core::hint::spin_loop();
        }
        regs.write_thr(b);
    }

    let ier = regs.interrupt_enable();
    regs.set_interrupt_enable(ier | InterruptEnable::RBR);
}

/// Writes straight through [`Tx::write`], without the scratch buffer.
impl<R: Registers> fmt::Write for Tx<R> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.write_string(s);
        Ok(())
    }
}

/// Copies as much as fits, then silently drops the rest.
struct Truncate<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl fmt::Write for Truncate<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let room = self.buf.len() - self.pos;
        let n = s.len().min(room);
        self.buf[self.pos..self.pos + n].copy_from_slice(&s.as_bytes()[..n]);
        self.pos += n;
        Ok(())
    }
}

/// Formats and sends through a [`Tx`], like `print!`.
///
/// ```ignore
/// uprint!(tx, "temp={} C\r\n", t);
/// ```
#[macro_export]
macro_rules! uprint {
    ($tx:expr, $($arg:tt)*) => {
        $tx.print(::core::format_args!($($arg)*))
    };
}

/// Like [`uprint!`], with a trailing `"\r\n"`.
#[macro_export]
macro_rules! uprintln {
    ($tx:expr) => {
        $tx.write(b"\r\n")
    };
    ($tx:expr, $($arg:tt)*) => {{
        $tx.print(::core::format_args!($($arg)*));
        $tx.write(b"\r\n");
    }};
}
