//! spiprog-core - SPI NOR flash programming engine
//!
//! This crate contains everything that runs on the programmer side of the
//! serial link: the single-character command dispatcher, the SPI transaction
//! layer with its chip-select discipline, the SPI25 flash protocol with its
//! write-enable and busy-wait invariants, and the bulk dump/upload paths that
//! feed the XMODEM block-transfer collaborator.
//!
//! It is `no_std` and allocation free. Hardware is reached through two seams:
//!
//! - [`spi::SpiBus`] - chip-select, power rail and the single "exchange one
//!   byte" primitive. A GPIO bit-bang implementation lives in [`spi::bitbang`].
//! - [`channel::Channel`] - the byte-in/byte-out command channel.
//!
//! # Example
//!
//! ```ignore
//! use spiprog_core::{console::Dispatcher, flash::FlashDevice};
//!
//! fn serve<C: Channel, B: SpiBus>(channel: C, bus: B) -> spiprog_core::Result<()> {
//!     let mut dispatcher = Dispatcher::new(channel, FlashDevice::new(bus));
//!     dispatcher.run()
//! }
//! ```
//!
//! # Features
//!
//! - `std` - implement `std::error::Error` for [`Error`]

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(any(feature = "std", test))]
extern crate std;

pub mod channel;
pub mod console;
pub mod error;
pub mod flash;
pub mod hex;
pub mod spi;
pub mod transfer;

#[cfg(test)]
pub(crate) mod testutil;

pub use error::{Error, Result};
