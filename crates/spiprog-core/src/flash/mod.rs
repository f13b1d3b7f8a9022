//! Flash device protocol
//!
//! JEDEC-style single-I/O command set over the [`crate::spi`] layer:
//! identify, read, status, write-enable, sector erase and page program.
//!
//! Every erase or program consumes the write enable latch (WEL): the chip
//! clears it when the operation finishes, so each mutating call needs its own
//! preceding [`FlashDevice::write_enable`]. The latch is always checked with a
//! fresh status read right before the mutating opcode goes out.

mod device;
mod status;

pub use device::{FlashDevice, Timeout, Timeouts};
pub use status::Status;

/// Minimum erase granularity
pub const SECTOR_SIZE: u32 = 4096;

/// Maximum bytes accepted by one page program
pub const PAGE_SIZE: usize = 256;

/// Length of the identification reply
pub const ID_LEN: usize = 4;

/// Default chip-size hint (8 MiB)
pub const DEFAULT_SIZE: u32 = 8 * 1024 * 1024;

/// Check that `addr` and `len` both fall on sector boundaries
pub fn check_sector_aligned(addr: u32, len: u32) -> crate::Result<()> {
    if addr % SECTOR_SIZE != 0 || len % SECTOR_SIZE != 0 {
        return Err(crate::Error::AlignmentViolation { addr, len });
    }
    Ok(())
}
