//! Transport abstraction: any byte-oriented channel.
//!
//! Concrete implementations:
//! - [`SerialChannel`](super::port::SerialChannel): a real tty
//! - in-memory scripted peers in the test harnesses
//!
//! The framing layer is generic over `Transport`, so every protocol
//! above it can be driven without hardware.

use std::io;

/// Byte-oriented transport channel.
///
/// Reads never block: timing is enforced by the caller's poll budget.
pub trait Transport {
    /// Read up to `buf.len()` bytes into `buf`.
    /// Returns the number of bytes actually read.
    /// Returns 0 if no data is available right now.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write `data` to the transport.
    /// Returns the number of bytes actually written.
    fn write(&mut self, data: &[u8]) -> io::Result<usize>;

    /// Flush any buffered output.
    fn flush(&mut self) -> io::Result<()>;

    /// Drop everything received but not yet read (and anything still
    /// queued for output).
    fn discard_buffers(&mut self) -> io::Result<()>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read(buf)
    }

    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        (**self).write(data)
    }

    fn flush(&mut self) -> io::Result<()> {
        (**self).flush()
    }

    fn discard_buffers(&mut self) -> io::Result<()> {
        (**self).discard_buffers()
    }
}
