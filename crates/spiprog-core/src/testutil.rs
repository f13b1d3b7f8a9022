//! Test doubles shared by the unit tests in this crate

use std::collections::VecDeque;
use std::vec::Vec;

use crate::channel::Channel;
use crate::error::{Error, Result};
use crate::spi::SpiBus;

/// One observable action on a [`ScriptedBus`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusEvent {
    Select(bool),
    Exchange(u8),
    Power(bool),
}

/// SPI bus that records traffic and answers from a script
///
/// Exchanges pop the next scripted response, or return 0xFF once the script
/// runs dry. Status reads can instead be answered from a fixed status byte.
pub struct ScriptedBus {
    events: Vec<BusEvent>,
    responses: VecDeque<u8>,
    status: Option<u8>,
    selected: bool,
    fail_after: Option<usize>,
    exchanges: usize,
    at_opcode: bool,
    answering_status: bool,
}

impl ScriptedBus {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            responses: VecDeque::new(),
            status: None,
            selected: false,
            fail_after: None,
            exchanges: 0,
            at_opcode: false,
            answering_status: false,
        }
    }

    /// Queue raw bytes to be returned by subsequent exchanges
    pub fn respond(&mut self, bytes: &[u8]) {
        self.responses.extend(bytes.iter().copied());
    }

    /// Answer every RDSR with `status` instead of the script
    pub fn with_status(mut self, status: u8) -> Self {
        self.status = Some(status);
        self
    }

    /// Fail every exchange after the first `n`
    pub fn fail_after(&mut self, n: usize) {
        self.fail_after = Some(n);
    }

    pub fn events(&self) -> &[BusEvent] {
        &self.events
    }

    pub fn is_selected(&self) -> bool {
        self.selected
    }

    /// Opcodes, i.e. the first byte exchanged in each transaction
    pub fn opcodes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        let mut first = false;
        for e in &self.events {
            match *e {
                BusEvent::Select(true) => first = true,
                BusEvent::Exchange(b) if first => {
                    out.push(b);
                    first = false;
                }
                _ => {}
            }
        }
        out
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
    }
}

impl SpiBus for ScriptedBus {
    fn select(&mut self, asserted: bool) -> Result<()> {
        self.events.push(BusEvent::Select(asserted));
        self.selected = asserted;
        self.at_opcode = asserted;
        self.answering_status = false;
        Ok(())
    }

    fn exchange(&mut self, byte: u8) -> Result<u8> {
        if let Some(n) = self.fail_after {
            if self.exchanges >= n {
                return Err(Error::SpiTransferFailed);
            }
        }
        self.exchanges += 1;
        self.events.push(BusEvent::Exchange(byte));

        if self.at_opcode {
            self.at_opcode = false;
            self.answering_status = self.status.is_some() && byte == crate::spi::opcodes::RDSR;
            if self.answering_status {
                return Ok(0xFF);
            }
        } else if self.answering_status {
            return Ok(self.status.unwrap_or(0xFF));
        }
        Ok(self.responses.pop_front().unwrap_or(0xFF))
    }

    fn power(&mut self, on: bool) -> Result<()> {
        self.events.push(BusEvent::Power(on));
        Ok(())
    }
}

/// Channel backed by an input queue and an output buffer
pub struct MemChannel {
    input: VecDeque<u8>,
    output: Vec<u8>,
    hide_pending: bool,
}

impl MemChannel {
    pub fn new(input: &[u8]) -> Self {
        Self {
            input: input.iter().copied().collect(),
            output: Vec::new(),
            hide_pending: false,
        }
    }

    /// Make non-blocking reads report nothing pending
    pub fn without_pending(mut self) -> Self {
        self.hide_pending = true;
        self
    }

    pub fn push_input(&mut self, bytes: &[u8]) {
        self.input.extend(bytes.iter().copied());
    }

    pub fn output(&self) -> &[u8] {
        &self.output
    }

    pub fn take_output(&mut self) -> Vec<u8> {
        core::mem::take(&mut self.output)
    }
}

impl Channel for MemChannel {
    fn read_byte(&mut self) -> Result<u8> {
        self.input.pop_front().ok_or(Error::ChannelClosed)
    }

    fn try_read_byte(&mut self) -> Result<Option<u8>> {
        if self.hide_pending {
            return Ok(None);
        }
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
