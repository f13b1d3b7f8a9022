//! spiprog-linux-gpio - Linux GPIO bit-bang SPI bus
//!
//! Drives the flash over plain GPIO lines through the Linux character device
//! interface (gpiocdev), using the core crate's [`BitbangBus`] for the SPI
//! timing. Useful on boards like the Raspberry Pi where GPIO pins are easy to
//! reach and no SPI controller is free.
//!
//! # Example
//!
//! ```no_run
//! use spiprog_linux_gpio::{open, LinuxGpioSpiConfig};
//! use spiprog_core::flash::FlashDevice;
//!
//! // Configure GPIO pins for SPI
//! let config = LinuxGpioSpiConfig::new("/dev/gpiochip0", 25, 11, 10, 9);
//! //                                    device          CS  SCK MOSI MISO
//!
//! let mut flash = FlashDevice::new(open(&config)?);
//! let id = flash.identify()?;
//! println!("ID: {:02X?}", id);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Usage with the spiprog CLI
//!
//! ```bash
//! spiprog serve --channel dev=/dev/ttyUSB0 \
//!     --spi linux_gpio:gpiochip=0,cs=25,sck=11,mosi=10,miso=9,power=17
//! ```
//!
//! # GPIO Pin Wiring
//!
//! | Flash Pin | GPIO Function | Description |
//! |-----------|---------------|-------------|
//! | CS#       | CS (output)   | Chip Select |
//! | CLK       | SCK (output)  | Serial Clock |
//! | DI        | MOSI (output) | Controller Out |
//! | DO        | MISO (input)  | Controller In |
//! | VCC       | 3.3V or POWER | Supply, optionally through a switched rail |
//! | WP#       | 3.3V          | Write Protect (tie high to disable) |
//! | HOLD#     | 3.3V          | Hold (tie high to disable) |
//!
//! # System Requirements
//!
//! - Linux kernel 4.8+ with GPIO character device support (kernel 5.5+ for v2 API)
//! - Access to `/dev/gpiochipN` devices (may require root or udev rules)
//!
//! [`BitbangBus`]: spiprog_core::spi::BitbangBus

pub mod device;
pub mod error;

pub use device::{open, parse_options, LinuxGpioSpi, LinuxGpioSpiConfig, LinuxLine};
pub use error::{LinuxGpioError, Result};

/// Open a Linux GPIO SPI bus from `key=value` option pairs
///
/// This is a convenience function for the CLI backend dispatch.
pub fn open_from_options(options: &[(&str, &str)]) -> Result<LinuxGpioSpi> {
    let config = parse_options(options)?;
    open(&config)
}
