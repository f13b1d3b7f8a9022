//! Per-command scratch state

use heapless::Vec;

use crate::channel::Channel;
use crate::error::{Error, Result};
use crate::hex;

/// Most hex parameters any command takes
pub const MAX_PARAMS: usize = 2;

/// Dispatcher state that outlives a single character read
///
/// The parameter list is cleared when a command starts. The read cursor
/// survives across commands until `r` overwrites it.
#[derive(Debug, Default)]
pub struct Session {
    params: Vec<u32, MAX_PARAMS>,
    cursor: u32,
    last_command: Option<u8>,
}

impl Session {
    /// Fresh session with the cursor at address 0
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new command, dropping the previous command's parameters
    pub fn begin(&mut self, cmd: u8) {
        self.params.clear();
        self.last_command = Some(cmd);
    }

    /// Parse the next hex parameter from the channel and record it
    pub fn param<C: Channel + ?Sized>(&mut self, channel: &mut C) -> Result<u32> {
        let value = hex::read_hex_value(channel)?;
        self.params
            .push(value)
            .map_err(|_| Error::InvalidParameter)?;
        Ok(value)
    }

    /// Parameters parsed so far for the current command
    pub fn params(&self) -> &[u32] {
        &self.params
    }

    /// Address the next `.` will read from
    pub fn cursor(&self) -> u32 {
        self.cursor
    }

    /// Move the read cursor
    pub fn set_cursor(&mut self, addr: u32) {
        self.cursor = addr;
    }

    /// Command character most recently started
    pub fn last_command(&self) -> Option<u8> {
        self.last_command
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::MemChannel;

    #[test]
    fn test_params_reset_per_command() {
        let mut session = Session::new();
        let mut ch = MemChannel::new(b"10 20\r30\r");

        session.begin(b'u');
        assert_eq!(session.param(&mut ch).unwrap(), 0x10);
        assert_eq!(session.param(&mut ch).unwrap(), 0x20);
        assert_eq!(session.params(), &[0x10, 0x20]);

        session.set_cursor(0x40);
        session.begin(b'e');
        assert!(session.params().is_empty());
        assert_eq!(session.param(&mut ch).unwrap(), 0x30);
        assert_eq!(session.cursor(), 0x40);
        assert_eq!(session.last_command(), Some(b'e'));
    }

    #[test]
    fn test_too_many_params() {
        let mut session = Session::new();
        let mut ch = MemChannel::new(b"1 2 3 ");
        session.begin(b'u');
        session.param(&mut ch).unwrap();
        session.param(&mut ch).unwrap();
        assert_eq!(session.param(&mut ch), Err(Error::InvalidParameter));
    }
}
