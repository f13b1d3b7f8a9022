//! Hex codec for the command channel
//!
//! Output bytes are rendered as two uppercase ASCII hex digits. Input
//! parameters are free-form hex digit runs terminated by the first non-hex
//! character, which is consumed as the field separator.

use crate::channel::Channel;
use crate::error::Result;

const DIGITS: &[u8; 16] = b"0123456789ABCDEF";

/// Encode one byte as two ASCII hex characters, most-significant nibble first
pub const fn encode_byte(b: u8) -> [u8; 2] {
    [DIGITS[(b >> 4) as usize], DIGITS[(b & 0xF) as usize]]
}

/// Value of an ASCII hex digit (either case)
pub const fn digit_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

/// Read a hex value from the channel
///
/// Pulls characters (blocking) and accumulates `value * 16 + digit` until a
/// non-hex character arrives; that terminator is consumed and discarded.
/// Accumulation wraps at 32 bits; callers validate ranges themselves.
pub fn read_hex_value<C: Channel + ?Sized>(channel: &mut C) -> Result<u32> {
    let mut value: u32 = 0;
    loop {
        let c = channel.read_byte()?;
        match digit_value(c) {
            Some(d) => value = value.wrapping_mul(16).wrapping_add(d as u32),
            None => return Ok(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::MemChannel;

    #[test]
    fn test_encode_byte() {
        assert_eq!(&encode_byte(0x00), b"00");
        assert_eq!(&encode_byte(0x7F), b"7F");
        assert_eq!(&encode_byte(0xA5), b"A5");
    }

    #[test]
    fn test_read_hex_value_consumes_terminator() {
        let mut ch = MemChannel::new(b"7F0000\rX");
        assert_eq!(read_hex_value(&mut ch).unwrap(), 0x7F0000);
        // Only the trailing X is left
        assert_eq!(ch.read_byte().unwrap(), b'X');
        assert!(ch.try_read_byte().unwrap().is_none());
    }

    #[test]
    fn test_read_hex_value_no_digits() {
        let mut ch = MemChannel::new(b"G1");
        assert_eq!(read_hex_value(&mut ch).unwrap(), 0);
        assert_eq!(ch.read_byte().unwrap(), b'1');
    }

    #[test]
    fn test_read_hex_value_mixed_case() {
        let mut ch = MemChannel::new(b"aBcD ");
        assert_eq!(read_hex_value(&mut ch).unwrap(), 0xABCD);
    }

    #[test]
    fn test_read_hex_value_wraps() {
        // Nine digits: the leading 1 falls off the top of a u32
        let mut ch = MemChannel::new(b"123456789\n");
        assert_eq!(read_hex_value(&mut ch).unwrap(), 0x23456789);
    }

    #[test]
    fn test_read_hex_value_closed_channel() {
        let mut ch = MemChannel::new(b"12");
        assert_eq!(
            read_hex_value(&mut ch),
            Err(crate::error::Error::ChannelClosed)
        );
    }
}
