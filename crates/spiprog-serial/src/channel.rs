//! Core [`Channel`] over any [`Transport`]

use spiprog_core::channel::Channel;

use crate::transport::Transport;

/// How long a blocking read waits per attempt before trying again
const IDLE_POLL_MS: u32 = 1_000;

/// Command channel running over a byte transport
///
/// Blocking reads wait for as long as it takes the operator to type; the
/// non-blocking read only returns what the transport already holds.
pub struct TransportChannel<T: Transport> {
    transport: T,
}

impl<T: Transport> TransportChannel<T> {
    /// Wrap a transport
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Give the transport back
    pub fn into_inner(self) -> T {
        self.transport
    }
}

impl<T: Transport> Channel for TransportChannel<T> {
    fn read_byte(&mut self) -> spiprog_core::Result<u8> {
        let mut byte = [0u8; 1];
        loop {
            if self.transport.read_nonblock(&mut byte, IDLE_POLL_MS)? == 1 {
                return Ok(byte[0]);
            }
        }
    }

    fn try_read_byte(&mut self) -> spiprog_core::Result<Option<u8>> {
        let mut byte = [0u8; 1];
        match self.transport.read_nonblock(&mut byte, 0)? {
            1 => Ok(Some(byte[0])),
            _ => Ok(None),
        }
    }

    fn write(&mut self, data: &[u8]) -> spiprog_core::Result<()> {
        Ok(self.transport.write(data)?)
    }

    fn flush(&mut self) -> spiprog_core::Result<()> {
        Ok(self.transport.flush()?)
    }
}
