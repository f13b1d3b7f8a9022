//! Scripted host side of the command channel

use alloc::boxed::Box;
use alloc::collections::VecDeque;
use alloc::vec::Vec;

use spiprog_core::channel::Channel;
use spiprog_core::error::{Error, Result};

/// Produces more host input from the bytes written since it last ran
pub type Responder = Box<dyn FnMut(&[u8]) -> Vec<u8>>;

/// Channel fed from a fixed script, with an optional reactive peer
///
/// Blocking reads drain the script first. Once it is empty the responder (if
/// any) sees everything written since its previous call and may queue more
/// input; when nothing more is queued the channel reports closed.
/// Non-blocking reads only ever see already-queued input.
pub struct ScriptedChannel {
    input: VecDeque<u8>,
    output: Vec<u8>,
    seen: usize,
    responder: Option<Responder>,
}

impl ScriptedChannel {
    /// Create a channel that will deliver `input`
    pub fn new(input: &[u8]) -> Self {
        Self {
            input: input.iter().copied().collect(),
            output: Vec::new(),
            seen: 0,
            responder: None,
        }
    }

    /// Attach a peer that reacts to output
    pub fn with_responder(mut self, responder: Responder) -> Self {
        self.responder = Some(responder);
        self
    }

    /// Queue more input
    pub fn push_input(&mut self, bytes: &[u8]) {
        self.input.extend(bytes.iter().copied());
    }

    /// Everything written so far
    pub fn output(&self) -> &[u8] {
        &self.output
    }

    /// Take everything written so far
    pub fn take_output(&mut self) -> Vec<u8> {
        self.seen = 0;
        core::mem::take(&mut self.output)
    }
}

impl Channel for ScriptedChannel {
    fn read_byte(&mut self) -> Result<u8> {
        if self.input.is_empty() {
            if let Some(responder) = self.responder.as_mut() {
                let more = responder(&self.output[self.seen..]);
                self.seen = self.output.len();
                self.input.extend(more);
            }
        }
        self.input.pop_front().ok_or(Error::ChannelClosed)
    }

    fn try_read_byte(&mut self) -> Result<Option<u8>> {
        Ok(self.input.pop_front())
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        self.output.extend_from_slice(data);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_responder_sees_new_output_only() {
        let mut ch = ScriptedChannel::new(b"a").with_responder(Box::new(|w: &[u8]| {
            if w == b"ping" {
                b"pong".to_vec()
            } else {
                Vec::new()
            }
        }));

        assert_eq!(ch.read_byte().unwrap(), b'a');
        ch.write(b"ping").unwrap();
        assert_eq!(ch.try_read_byte().unwrap(), None);
        assert_eq!(ch.read_byte().unwrap(), b'p');

        let mut rest = [0u8; 3];
        ch.read_exact(&mut rest).unwrap();
        assert_eq!(&rest, b"ong");

        // Responder already saw "ping"; nothing new, so the peer is gone
        assert_eq!(ch.read_byte(), Err(Error::ChannelClosed));
    }
}
