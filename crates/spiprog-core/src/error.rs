//! Error types for spiprog-core
//!
//! Every error is local to the command that raised it: the dispatcher reports
//! it on the command channel with a trailing `!` marker and keeps looping.

use core::fmt;

/// Core error type - no_std compatible, Copy so it can be stored and echoed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    // Command errors
    /// Unrecognized command character
    MalformedCommand(u8),
    /// A numeric parameter is outside the accepted range
    InvalidParameter,

    // Flash protocol errors
    /// Write enable latch was clear when a mutating operation was requested
    WriteProtected,
    /// Address or length is not aligned to the sector size
    AlignmentViolation {
        /// Requested start address
        addr: u32,
        /// Requested length in bytes
        len: u32,
    },
    /// Address is beyond the 24-bit address space or the chip-size hint
    AddressOutOfBounds,
    /// Write-in-progress never cleared within the configured timeout
    DeviceHang,

    // Bulk transfer errors
    /// The block-transfer collaborator gave up (retries exhausted or cancelled)
    TransferAborted,
    /// The input stream ended in the middle of an upload block
    IncompleteBlock,

    // Transport errors
    /// The underlying SPI primitive reported a failure
    SpiTransferFailed,
    /// The command channel was closed by the peer
    ChannelClosed,
    /// The command channel reported an I/O failure
    ChannelIo,
}

impl Error {
    /// True if the error means the command channel can no longer be used
    ///
    /// Everything else is reported inline and the dispatcher keeps going.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ChannelClosed | Self::ChannelIo)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedCommand(c) => write!(f, "unknown command 0x{:02X}", c),
            Self::InvalidParameter => write!(f, "invalid parameter"),
            Self::WriteProtected => write!(f, "write protected"),
            Self::AlignmentViolation { addr, len } => write!(
                f,
                "unaligned region 0x{:06X}+0x{:X} (sector is 0x1000)",
                addr, len
            ),
            Self::AddressOutOfBounds => write!(f, "address out of bounds"),
            Self::DeviceHang => write!(f, "device hang: busy flag never cleared"),
            Self::TransferAborted => write!(f, "transfer aborted"),
            Self::IncompleteBlock => write!(f, "input ended mid-block"),
            Self::SpiTransferFailed => write!(f, "SPI transfer failed"),
            Self::ChannelClosed => write!(f, "channel closed"),
            Self::ChannelIo => write!(f, "channel I/O error"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
