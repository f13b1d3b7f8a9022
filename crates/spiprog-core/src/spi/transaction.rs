//! Scoped chip-select ownership

use super::SpiBus;
use crate::error::Result;

/// Byte clocked out during a read phase
const READ_FILL: u8 = 0xFF;

/// An active chip-select assertion
///
/// Created by [`Transaction::begin`], which asserts chip-select. The select
/// line is deasserted by [`Transaction::finish`] or, on any early return, when
/// the transaction is dropped. The exclusive borrow of the bus guarantees that
/// only one transaction is outstanding at a time.
pub struct Transaction<'a, B: SpiBus + ?Sized> {
    bus: &'a mut B,
    active: bool,
}

impl<'a, B: SpiBus + ?Sized> Transaction<'a, B> {
    /// Assert chip-select and start a transaction
    pub fn begin(bus: &'a mut B) -> Result<Self> {
        bus.select(true)?;
        Ok(Self { bus, active: true })
    }

    /// Exchange a single byte
    pub fn exchange(&mut self, byte: u8) -> Result<u8> {
        self.bus.exchange(byte)
    }

    /// Clock out `data`, discarding what comes back
    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        for &byte in data {
            self.bus.exchange(byte)?;
        }
        Ok(())
    }

    /// Clock in `buf.len()` bytes
    pub fn read(&mut self, buf: &mut [u8]) -> Result<()> {
        for byte in buf.iter_mut() {
            *byte = self.bus.exchange(READ_FILL)?;
        }
        Ok(())
    }

    /// Deassert chip-select, reporting any failure to do so
    pub fn finish(mut self) -> Result<()> {
        self.active = false;
        self.bus.select(false)
    }
}

impl<B: SpiBus + ?Sized> Drop for Transaction<'_, B> {
    fn drop(&mut self) {
        if self.active {
            if let Err(e) = self.bus.select(false) {
                log::error!("spi: failed to release chip-select: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::testutil::{BusEvent, ScriptedBus};

    fn partial(bus: &mut ScriptedBus) -> Result<()> {
        let mut tx = Transaction::begin(bus)?;
        tx.exchange(0x9F)?;
        Err(Error::InvalidParameter)
    }

    #[test]
    fn test_drop_releases_select() {
        let mut bus = ScriptedBus::new();
        assert_eq!(partial(&mut bus), Err(Error::InvalidParameter));
        assert!(!bus.is_selected());
        assert_eq!(
            bus.events(),
            &[
                BusEvent::Select(true),
                BusEvent::Exchange(0x9F),
                BusEvent::Select(false)
            ]
        );
    }

    #[test]
    fn test_finish_releases_once() {
        let mut bus = ScriptedBus::new();
        let tx = Transaction::begin(&mut bus).unwrap();
        tx.finish().unwrap();
        let deselects = bus
            .events()
            .iter()
            .filter(|e| **e == BusEvent::Select(false))
            .count();
        assert_eq!(deselects, 1);
    }
}
