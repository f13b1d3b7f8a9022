//! Formatted replies on the command channel

use core::fmt;

use crate::channel::Channel;
use crate::error::{Error, Result};
use crate::hex;

/// Line terminator for every textual reply
pub const EOL: &[u8] = b"\r\n";

/// `core::fmt::Write` adapter over a [`Channel`]
///
/// `fmt::Error` carries no payload, so the first channel error is stashed
/// and handed back by [`Reply::finish`].
pub(crate) struct Reply<'a, C: Channel + ?Sized> {
    channel: &'a mut C,
    error: Option<Error>,
}

impl<'a, C: Channel + ?Sized> Reply<'a, C> {
    pub(crate) fn new(channel: &'a mut C) -> Self {
        Self {
            channel,
            error: None,
        }
    }

    /// Append raw bytes
    pub(crate) fn bytes(&mut self, data: &[u8]) -> &mut Self {
        if self.error.is_none() {
            if let Err(e) = self.channel.write(data) {
                self.error = Some(e);
            }
        }
        self
    }

    /// Append `data` as uppercase hex, optionally space separated
    pub(crate) fn hex(&mut self, data: &[u8], spaced: bool) -> &mut Self {
        for &b in data {
            if spaced {
                self.bytes(b" ");
            }
            self.bytes(&hex::encode_byte(b));
        }
        self
    }

    /// Terminate the line and surface any error hit while writing
    pub(crate) fn finish(&mut self, formatted: fmt::Result) -> Result<()> {
        self.bytes(EOL);
        match (self.error, formatted) {
            (Some(e), _) => Err(e),
            (None, Ok(())) => Ok(()),
            // Only our own write_str can fail
            (None, Err(_)) => Err(Error::ChannelIo),
        }
    }
}

impl<C: Channel + ?Sized> fmt::Write for Reply<'_, C> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.bytes(s.as_bytes());
        if self.error.is_some() {
            Err(fmt::Error)
        } else {
            Ok(())
        }
    }
}
