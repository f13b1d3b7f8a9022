//! Command channel abstraction
//!
//! The dispatcher talks to the host through a plain byte channel: a blocking
//! single-byte read, a non-blocking read that can report "no data yet", and a
//! byte writer. Serial ports, TCP sockets and stdio all fit behind it.

use crate::error::Result;

/// Byte-in/byte-out channel to the host
pub trait Channel {
    /// Block until one byte is available and return it
    ///
    /// Returns `Error::ChannelClosed` once the peer has gone away.
    fn read_byte(&mut self) -> Result<u8>;

    /// Return the next byte if one is already buffered, `None` otherwise
    fn try_read_byte(&mut self) -> Result<Option<u8>>;

    /// Write all bytes to the channel
    fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Flush any buffered output
    fn flush(&mut self) -> Result<()>;

    /// Fill `buf` completely with blocking reads
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        for byte in buf.iter_mut() {
            *byte = self.read_byte()?;
        }
        Ok(())
    }
}

impl<C: Channel + ?Sized> Channel for &mut C {
    fn read_byte(&mut self) -> Result<u8> {
        (**self).read_byte()
    }

    fn try_read_byte(&mut self) -> Result<Option<u8>> {
        (**self).try_read_byte()
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        (**self).write(data)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}
