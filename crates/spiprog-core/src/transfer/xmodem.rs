//! XMODEM sender
//!
//! The receiver starts a transfer by sending NAK (8-bit checksum mode) or
//! `C` (CRC-16 mode). Each block is framed as
//!
//! ```text
//! SOH | blk | 255-blk | 128 data bytes | checksum (1) or CRC-16 BE (2)
//! ```
//!
//! and answered with ACK, NAK (resend) or CAN (give up). Block numbers start
//! at 1 and wrap modulo 256.

use super::{BlockTransfer, BLOCK_SIZE};
use crate::channel::Channel;
use crate::error::{Error, Result};

/// Start of 128-byte block
pub const SOH: u8 = 0x01;
/// End of transmission
pub const EOT: u8 = 0x04;
/// Positive acknowledgement
pub const ACK: u8 = 0x06;
/// Negative acknowledgement, also the checksum-mode start request
pub const NAK: u8 = 0x15;
/// Cancel
pub const CAN: u8 = 0x18;
/// CRC-mode start request
pub const CRC_REQUEST: u8 = b'C';

/// Retransmissions allowed per block before giving up
pub const MAX_RETRIES: u32 = 10;

const FRAME_LEN: usize = 3 + BLOCK_SIZE + 2;

/// Block integrity check selected by the receiver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Check {
    /// 8-bit arithmetic sum of the data bytes
    Checksum,
    /// CRC-16/XMODEM (poly 0x1021, init 0)
    Crc16,
}

impl Check {
    /// Mode requested by a receiver start byte, if it is one
    pub fn from_request(byte: u8) -> Option<Self> {
        match byte {
            NAK => Some(Self::Checksum),
            CRC_REQUEST => Some(Self::Crc16),
            _ => None,
        }
    }

    fn len(&self) -> usize {
        match self {
            Self::Checksum => 1,
            Self::Crc16 => 2,
        }
    }
}

/// CRC-16/XMODEM
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;
    for &b in data {
        crc ^= (b as u16) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x1021
            } else {
                crc << 1
            };
        }
    }
    crc
}

/// 8-bit arithmetic checksum
pub fn checksum(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

/// XMODEM sender over a command channel
pub struct Xmodem<C: Channel> {
    channel: C,
    check: Check,
    block_num: u8,
    retransmit_allowed: bool,
    failed: bool,
    blocks_sent: u32,
}

impl<C: Channel> Xmodem<C> {
    /// Create a sender for a receiver that has already sent `check`'s start byte
    pub fn new(channel: C, check: Check) -> Self {
        Self {
            channel,
            check,
            block_num: 1,
            retransmit_allowed: true,
            failed: false,
            blocks_sent: 0,
        }
    }

    /// Number of blocks acknowledged so far
    pub fn blocks_sent(&self) -> u32 {
        self.blocks_sent
    }

    fn frame(&self, block: &[u8; BLOCK_SIZE], out: &mut [u8; FRAME_LEN]) -> usize {
        out[0] = SOH;
        out[1] = self.block_num;
        out[2] = !self.block_num;
        out[3..3 + BLOCK_SIZE].copy_from_slice(block);
        match self.check {
            Check::Checksum => out[3 + BLOCK_SIZE] = checksum(block),
            Check::Crc16 => {
                out[3 + BLOCK_SIZE..].copy_from_slice(&crc16(block).to_be_bytes());
            }
        }
        3 + BLOCK_SIZE + self.check.len()
    }

    fn try_send(&mut self, block: &[u8; BLOCK_SIZE]) -> Result<()> {
        let mut frame = [0u8; FRAME_LEN];
        let len = self.frame(block, &mut frame);

        let mut retries = 0;
        loop {
            self.channel.write(&frame[..len])?;
            self.channel.flush()?;

            match self.channel.read_byte()? {
                ACK => return Ok(()),
                CAN => {
                    log::warn!("xmodem: receiver cancelled at block {}", self.block_num);
                    return Err(Error::TransferAborted);
                }
                other => {
                    retries += 1;
                    log::debug!(
                        "xmodem: block {} not acknowledged (0x{:02X}), retry {}",
                        self.block_num,
                        other,
                        retries
                    );
                    if !self.retransmit_allowed || retries > MAX_RETRIES {
                        log::warn!("xmodem: giving up on block {}", self.block_num);
                        return Err(Error::TransferAborted);
                    }
                }
            }
        }
    }
}

impl<C: Channel> BlockTransfer for Xmodem<C> {
    fn begin_send(&mut self, retransmit_allowed: bool) -> Result<()> {
        // Receivers repeat their start byte until the first block arrives
        while self.channel.try_read_byte()?.is_some() {}

        self.retransmit_allowed = retransmit_allowed;
        self.block_num = 1;
        self.blocks_sent = 0;
        self.failed = false;
        log::debug!("xmodem: sending with {:?}", self.check);
        Ok(())
    }

    fn send_block(&mut self, block: &[u8; BLOCK_SIZE]) -> Result<()> {
        if self.failed {
            return Err(Error::TransferAborted);
        }
        match self.try_send(block) {
            Ok(()) => {
                self.block_num = self.block_num.wrapping_add(1);
                self.blocks_sent += 1;
                Ok(())
            }
            Err(e) => {
                self.failed = true;
                Err(e)
            }
        }
    }

    fn end_send(&mut self) -> Result<()> {
        if self.failed {
            return self.abort();
        }

        for _ in 0..=MAX_RETRIES {
            self.channel.write(&[EOT])?;
            self.channel.flush()?;
            if self.channel.read_byte()? == ACK {
                log::debug!("xmodem: {} blocks sent", self.blocks_sent);
                return Ok(());
            }
        }
        log::warn!("xmodem: EOT never acknowledged");
        Err(Error::TransferAborted)
    }

    fn abort(&mut self) -> Result<()> {
        self.failed = true;
        log::debug!("xmodem: cancelling after {} blocks", self.blocks_sent);
        self.channel.write(&[CAN, CAN])?;
        self.channel.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::MemChannel;

    #[test]
    fn test_crc16_check_value() {
        assert_eq!(crc16(b"123456789"), 0x31C3);
    }

    #[test]
    fn test_checksum_wraps() {
        assert_eq!(checksum(&[0xFF, 0x02]), 0x01);
    }

    #[test]
    fn test_start_request() {
        assert_eq!(Check::from_request(NAK), Some(Check::Checksum));
        assert_eq!(Check::from_request(b'C'), Some(Check::Crc16));
        assert_eq!(Check::from_request(b'r'), None);
    }

    #[test]
    fn test_checksum_frame() {
        // Stale start bytes, then ACK for the block and the EOT
        let mut ch = MemChannel::new(&[NAK, NAK]);
        let mut x = Xmodem::new(&mut ch, Check::Checksum);
        x.begin_send(true).unwrap();
        x.channel.push_input(&[ACK, ACK]);

        let block = [0x11u8; BLOCK_SIZE];
        x.send_block(&block).unwrap();
        x.end_send().unwrap();
        assert_eq!(x.blocks_sent(), 1);

        let out = ch.output();
        assert_eq!(out.len(), 3 + BLOCK_SIZE + 1 + 1);
        assert_eq!(&out[..3], &[SOH, 1, 0xFE]);
        assert_eq!(out[3 + BLOCK_SIZE], checksum(&block));
        assert_eq!(out[out.len() - 1], EOT);
    }

    #[test]
    fn test_crc_frame_and_numbering() {
        let mut ch = MemChannel::new(&[]);
        ch.push_input(&[ACK, ACK]);
        let mut x = Xmodem::new(&mut ch, Check::Crc16);
        let block = [0u8; BLOCK_SIZE];
        x.send_block(&block).unwrap();
        x.send_block(&block).unwrap();

        let out = ch.output();
        let frame = 3 + BLOCK_SIZE + 2;
        assert_eq!(out.len(), 2 * frame);
        assert_eq!(&out[frame..frame + 3], &[SOH, 2, 0xFD]);
        assert_eq!(&out[frame - 2..frame], &crc16(&block).to_be_bytes());
    }

    #[test]
    fn test_nak_retransmits() {
        let mut ch = MemChannel::new(&[NAK, NAK, ACK]);
        let mut x = Xmodem::new(&mut ch, Check::Checksum);
        x.send_block(&[0xA5; BLOCK_SIZE]).unwrap();
        assert_eq!(ch.output().len(), 3 * (3 + BLOCK_SIZE + 1));
    }

    #[test]
    fn test_retry_budget_exhausted() {
        let naks = [NAK; MAX_RETRIES as usize + 1];
        let mut ch = MemChannel::new(&naks);
        let mut x = Xmodem::new(&mut ch, Check::Checksum);
        assert_eq!(
            x.send_block(&[0; BLOCK_SIZE]),
            Err(Error::TransferAborted)
        );
        // Teardown cancels instead of sending EOT
        x.end_send().unwrap();
        assert_eq!(&ch.output()[ch.output().len() - 2..], &[CAN, CAN]);
    }

    #[test]
    fn test_no_retransmit_fails_on_first_nak() {
        let mut ch = MemChannel::new(&[]);
        let mut x = Xmodem::new(&mut ch, Check::Checksum);
        x.begin_send(false).unwrap();
        x.channel.push_input(&[NAK, ACK]);
        assert_eq!(
            x.send_block(&[0; BLOCK_SIZE]),
            Err(Error::TransferAborted)
        );
    }

    #[test]
    fn test_receiver_cancel() {
        let mut ch = MemChannel::new(&[CAN]);
        let mut x = Xmodem::new(&mut ch, Check::Crc16);
        assert_eq!(
            x.send_block(&[0; BLOCK_SIZE]),
            Err(Error::TransferAborted)
        );
        assert_eq!(
            x.send_block(&[0; BLOCK_SIZE]),
            Err(Error::TransferAborted)
        );
    }
}
