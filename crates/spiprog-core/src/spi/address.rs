//! 24-bit flash addresses

/// Largest byte offset reachable with 3-byte addressing
pub const MAX_ADDRESS: u32 = 0x00FF_FFFF;

/// Size of the 3-byte address space (16 MiB)
pub const ADDRESS_SPACE: u32 = MAX_ADDRESS + 1;

/// Encode a 24-bit address most-significant byte first
///
/// Bits above 23 are dropped, as the device would ignore them.
pub const fn encode_3b(address: u32) -> [u8; 3] {
    [(address >> 16) as u8, (address >> 8) as u8, address as u8]
}
