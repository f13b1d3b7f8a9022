//! Whole-chip dump and chunked upload

use super::{BlockTransfer, BLOCK_SIZE};
use crate::channel::Channel;
use crate::error::{Error, Result};
use crate::flash::{check_sector_aligned, FlashDevice, SECTOR_SIZE};
use crate::spi::SpiBus;

/// Size of each block pulled from the channel during an upload
pub const UPLOAD_BLOCK_SIZE: usize = BLOCK_SIZE;

/// Stream the chip from address 0 up to its size hint through `xfer`
///
/// Returns the number of bytes sent. A failure from the collaborator or the
/// flash ends the dump. Once `begin_send` has succeeded the transfer is
/// closed with `end_send` when every block went out and with `abort` otherwise.
pub fn dump<B: SpiBus, T: BlockTransfer>(
    flash: &mut FlashDevice<B>,
    xfer: &mut T,
    retransmit_allowed: bool,
) -> Result<u32> {
    xfer.begin_send(retransmit_allowed)?;
    let result = stream_blocks(flash, xfer);
    let end = match result {
        Ok(_) => xfer.end_send(),
        Err(_) => xfer.abort(),
    };

    let sent = result?;
    end?;
    log::info!("bulk: dumped {} bytes", sent);
    Ok(sent)
}

fn stream_blocks<B: SpiBus, T: BlockTransfer>(
    flash: &mut FlashDevice<B>,
    xfer: &mut T,
) -> Result<u32> {
    let size = flash.size();
    let mut block = [0u8; BLOCK_SIZE];
    let mut addr = 0u32;

    while addr < size {
        if let Err(e) = flash.read(addr, &mut block) {
            log::warn!("bulk: read failed at 0x{:06X}: {}", addr, e);
            return Err(e);
        }
        if let Err(e) = xfer.send_block(&block) {
            log::warn!("bulk: dump stopped at 0x{:06X}: {}", addr, e);
            return Err(e);
        }
        addr += BLOCK_SIZE as u32;
    }
    Ok(addr)
}

/// Write `len` bytes pushed by the host on `channel` to flash at `addr`
///
/// `addr` and `len` must be sector aligned; that and the range are checked
/// before anything is read, erased or programmed. Each block on a sector
/// boundary first gets write-enable + sector erase, and every block gets its
/// own write-enable + page program.
///
/// Once the checks pass the host sends all `len` bytes regardless, so when
/// flash fails part way the rest of the payload is read and discarded before
/// the error is returned. None of it reaches the command loop.
pub fn upload<B: SpiBus, C: Channel + ?Sized>(
    flash: &mut FlashDevice<B>,
    channel: &mut C,
    addr: u32,
    len: u32,
) -> Result<u32> {
    check_sector_aligned(addr, len)?;
    if len == 0 {
        return Ok(0);
    }
    flash.check_range(addr, len)?;

    let mut consumed = 0u32;
    match program_blocks(flash, channel, addr, len, &mut consumed) {
        Ok(()) => {
            log::info!("bulk: uploaded {} bytes at 0x{:06X}", len, addr);
            Ok(len)
        }
        Err(e) if e.is_fatal() || e == Error::IncompleteBlock => Err(e),
        Err(e) => {
            log::warn!("bulk: upload failed at 0x{:06X}: {}", addr + consumed, e);
            discard(channel, len - consumed)?;
            Err(e)
        }
    }
}

fn program_blocks<B: SpiBus, C: Channel + ?Sized>(
    flash: &mut FlashDevice<B>,
    channel: &mut C,
    addr: u32,
    len: u32,
    consumed: &mut u32,
) -> Result<()> {
    let mut block = [0u8; UPLOAD_BLOCK_SIZE];

    while *consumed < len {
        let block_addr = addr + *consumed;
        read_block(channel, &mut block)?;
        *consumed += UPLOAD_BLOCK_SIZE as u32;

        if block_addr % SECTOR_SIZE == 0 {
            log::debug!("bulk: erasing sector 0x{:06X}", block_addr);
            flash.write_enable()?;
            flash.erase_sector(block_addr)?;
        }

        flash.write_enable()?;
        flash.page_program(block_addr, &block)?;
    }
    Ok(())
}

/// Swallow the rest of an upload payload
fn discard<C: Channel + ?Sized>(channel: &mut C, remaining: u32) -> Result<()> {
    log::debug!("bulk: discarding {} payload bytes", remaining);
    for _ in 0..remaining {
        match channel.read_byte() {
            Ok(_) => {}
            Err(Error::ChannelClosed) => return Ok(()),
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Fill `block` from the channel; the stream ending part way is an error
fn read_block<C: Channel + ?Sized>(channel: &mut C, block: &mut [u8]) -> Result<()> {
    for (i, byte) in block.iter_mut().enumerate() {
        *byte = match channel.read_byte() {
            Ok(b) => b,
            Err(Error::ChannelClosed) => {
                log::warn!("bulk: input ended after {} of {} bytes", i, block.len());
                return Err(Error::IncompleteBlock);
            }
            Err(e) => return Err(e),
        };
    }
    Ok(())
}
