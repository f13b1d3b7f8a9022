//! SPI transaction layer
//!
//! The whole flash protocol is built on one primitive: exchange a single byte
//! full-duplex while chip-select is asserted. Whether that byte goes through a
//! hardware shift register or a GPIO bit-bang loop is decided by the
//! [`SpiBus`] implementation and nothing above this module knows which.
//!
//! Chip-select is owned by [`Transaction`], which deasserts it on every exit
//! path, and [`command`] frames a complete opcode/address/payload exchange.

pub mod address;
pub mod bitbang;
pub mod opcodes;
mod transaction;

pub use address::{encode_3b, ADDRESS_SPACE, MAX_ADDRESS};
pub use bitbang::{BitbangBus, GpioLine};
pub use transaction::Transaction;

use crate::error::Result;

/// Raw SPI bus as seen by the programmer
///
/// There is exactly one device on the bus and no reentrancy: callers go through
/// [`Transaction`] rather than toggling `select` by hand.
pub trait SpiBus {
    /// Drive chip-select (active low, so `asserted = true` drives the pin low)
    fn select(&mut self, asserted: bool) -> Result<()>;

    /// Shift one byte out while shifting one byte in
    fn exchange(&mut self, byte: u8) -> Result<u8>;

    /// Switch the chip's supply rail
    ///
    /// Boards without a switched rail keep the default no-op.
    fn power(&mut self, _on: bool) -> Result<()> {
        Ok(())
    }

    /// Delay for the specified number of microseconds
    fn delay_us(&mut self, _us: u32) {}
}

impl<B: SpiBus + ?Sized> SpiBus for &mut B {
    fn select(&mut self, asserted: bool) -> Result<()> {
        (**self).select(asserted)
    }

    fn exchange(&mut self, byte: u8) -> Result<u8> {
        (**self).exchange(byte)
    }

    fn power(&mut self, on: bool) -> Result<()> {
        (**self).power(on)
    }

    fn delay_us(&mut self, us: u32) {
        (**self).delay_us(us)
    }
}

/// Frame and run one complete SPI command
///
/// Asserts chip-select, sends `opcode`, the optional 3-byte address (MSB
/// first), then `payload_out`, then clocks in `payload_in.len()` bytes, and
/// finally deasserts chip-select. Chip-select is released even when an
/// exchange fails part way; the failure is returned after the release.
pub fn command<B: SpiBus + ?Sized>(
    bus: &mut B,
    opcode: u8,
    address: Option<u32>,
    payload_out: &[u8],
    payload_in: &mut [u8],
) -> Result<()> {
    let mut tx = Transaction::begin(bus)?;
    tx.exchange(opcode)?;
    if let Some(addr) = address {
        tx.write(&encode_3b(addr))?;
    }
    tx.write(payload_out)?;
    tx.read(payload_in)?;
    tx.finish()
}
