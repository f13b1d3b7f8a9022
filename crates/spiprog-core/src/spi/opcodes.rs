//! JEDEC SPI flash opcodes used by the programmer
//!
//! Only the single-I/O, 3-byte-address subset is needed here.

// ============================================================================
// Write control
// ============================================================================

/// Write Enable - required before any write/erase operation
pub const WREN: u8 = 0x06;
/// Write Disable - clears WEL bit in status register
pub const WRDI: u8 = 0x04;

// ============================================================================
// Status register
// ============================================================================

/// Read Status Register 1
pub const RDSR: u8 = 0x05;

// ============================================================================
// Identification and data
// ============================================================================

/// Read JEDEC ID (manufacturer + device ID)
pub const RDID: u8 = 0x9F;
/// Read Data with 3-byte address
pub const READ: u8 = 0x03;

// ============================================================================
// Program and erase
// ============================================================================

/// Page Program with 3-byte address
pub const PP: u8 = 0x02;
/// 4 KiB Sector Erase with 3-byte address
pub const SE_20: u8 = 0x20;
/// Chip Erase
pub const CE_C7: u8 = 0xC7;

/// True for opcodes that modify array contents and consume the WEL bit
pub const fn is_mutating(opcode: u8) -> bool {
    matches!(opcode, PP | SE_20 | CE_C7)
}
