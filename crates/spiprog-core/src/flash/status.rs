//! Status register 1

use bitflags::bitflags;

bitflags! {
    /// Status register 1 bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Status: u8 {
        /// Erase or program in progress
        const WIP = 1 << 0;
        /// Write enable latch
        const WEL = 1 << 1;
        /// Block protect bits
        const BP = 0b0001_1100;
        /// Status register write disable
        const SRWD = 1 << 7;
    }
}

impl Status {
    /// Write in progress
    pub fn is_busy(&self) -> bool {
        self.contains(Status::WIP)
    }

    /// Write enable latch set
    pub fn is_write_enabled(&self) -> bool {
        self.contains(Status::WEL)
    }

    /// Raw register value, including bits without a named flag
    pub fn raw(&self) -> u8 {
        self.bits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_decode() {
        let s = Status::from_bits_retain(0x01);
        assert!(s.is_busy());
        assert!(!s.is_write_enabled());

        let s = Status::from_bits_retain(0x42);
        assert!(!s.is_busy());
        assert!(s.is_write_enabled());
        assert_eq!(s.raw(), 0x42);
    }
}
