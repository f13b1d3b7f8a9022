//! The attached flash chip

use super::{check_sector_aligned, Status, DEFAULT_SIZE, ID_LEN, PAGE_SIZE};
use crate::error::{Error, Result};
use crate::spi::{self, opcodes, SpiBus, ADDRESS_SPACE};

/// Settle time after switching the supply rail on
const POWER_SETTLE_US: u32 = 1_000;

/// Bounded busy-wait parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeout {
    /// Delay between status polls in microseconds
    pub poll_delay_us: u32,
    /// Give up with `Error::DeviceHang` after this long
    pub timeout_us: u32,
}

impl Timeout {
    /// Number of status polls before giving up (at least one)
    pub fn max_polls(&self) -> u32 {
        let polls = if self.poll_delay_us > 0 {
            self.timeout_us / self.poll_delay_us
        } else {
            // Fall back to polling once per microsecond
            self.timeout_us
        };
        polls.max(1)
    }
}

/// Busy-wait limits for the mutating operations
///
/// Defaults follow typical 25-series datasheet figures:
/// 4 KiB sector erase 45-400ms, page program 0.7-5ms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Sector erase: poll every 10ms, give up after 1s
    pub erase: Timeout,
    /// Page program: poll every 10us, give up after 10ms
    pub program: Timeout,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            erase: Timeout {
                poll_delay_us: 10_000,
                timeout_us: 1_000_000,
            },
            program: Timeout {
                poll_delay_us: 10,
                timeout_us: 10_000,
            },
        }
    }
}

/// The single flash chip on the bus
///
/// `last_status` is whatever the most recent status read returned; it is
/// stale the moment another command goes out and is never used for a
/// precondition check.
pub struct FlashDevice<B: SpiBus> {
    bus: B,
    size_bytes: u32,
    last_status: Status,
    timeouts: Timeouts,
}

impl<B: SpiBus> FlashDevice<B> {
    /// Wrap a bus, assuming the default 8 MiB chip
    pub fn new(bus: B) -> Self {
        Self {
            bus,
            size_bytes: DEFAULT_SIZE,
            last_status: Status::empty(),
            timeouts: Timeouts::default(),
        }
    }

    /// Set the chip-size hint
    pub fn with_size(mut self, size_bytes: u32) -> Self {
        self.size_bytes = size_bytes;
        self
    }

    /// Set the busy-wait limits
    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Chip-size hint in bytes, used to bound bulk dumps
    pub fn size(&self) -> u32 {
        self.size_bytes
    }

    /// Change the chip-size hint
    pub fn set_size(&mut self, size_bytes: u32) {
        log::debug!("flash: size hint set to {} bytes", size_bytes);
        self.size_bytes = size_bytes;
    }

    /// Status from the last poll (possibly stale)
    pub fn last_status(&self) -> Status {
        self.last_status
    }

    /// Access the underlying bus
    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    /// Unwrap the underlying bus
    pub fn into_inner(self) -> B {
        self.bus
    }

    /// Switch the supply rail on and wait for the chip to settle
    pub fn power_on(&mut self) -> Result<()> {
        self.bus.power(true)?;
        self.bus.delay_us(POWER_SETTLE_US);
        Ok(())
    }

    /// Switch the supply rail off
    pub fn power_off(&mut self) -> Result<()> {
        self.bus.power(false)
    }

    /// Read the 4 identification bytes
    pub fn identify(&mut self) -> Result<[u8; ID_LEN]> {
        let mut id = [0u8; ID_LEN];
        spi::command(&mut self.bus, opcodes::RDID, None, &[], &mut id)?;
        log::debug!(
            "flash: id {:02X} {:02X} {:02X} {:02X}",
            id[0],
            id[1],
            id[2],
            id[3]
        );
        Ok(id)
    }

    /// Read `buf.len()` bytes starting at `addr`
    ///
    /// No busy check is made: reading while an erase or program is still
    /// running returns whatever the chip drives, which is not array data.
    pub fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
        spi::command(&mut self.bus, opcodes::READ, Some(addr), &[], buf)
    }

    /// Read status register 1
    pub fn read_status(&mut self) -> Result<Status> {
        let mut sr = [0u8; 1];
        spi::command(&mut self.bus, opcodes::RDSR, None, &[], &mut sr)?;
        self.last_status = Status::from_bits_retain(sr[0]);
        Ok(self.last_status)
    }

    /// Send Write Enable
    ///
    /// A write-protected chip silently ignores this; only a following status
    /// read shows whether WEL actually latched.
    pub fn write_enable(&mut self) -> Result<()> {
        spi::command(&mut self.bus, opcodes::WREN, None, &[], &mut [])
    }

    /// Send Write Disable
    pub fn write_disable(&mut self) -> Result<()> {
        spi::command(&mut self.bus, opcodes::WRDI, None, &[], &mut [])
    }

    /// Erase the 4 KiB sector at `addr`
    ///
    /// `addr` must be sector aligned and WEL must already be set; both are
    /// checked before the erase opcode is sent. Consumes WEL.
    pub fn erase_sector(&mut self, addr: u32) -> Result<()> {
        check_sector_aligned(addr, 0)?;
        Self::check_address(addr, 0)?;
        self.require_write_enabled()?;

        log::trace!("flash: erase sector 0x{:06X}", addr);
        spi::command(&mut self.bus, opcodes::SE_20, Some(addr), &[], &mut [])?;
        self.wait_ready(self.timeouts.erase)?;
        Ok(())
    }

    /// Program up to one page at `addr`
    ///
    /// Same WEL precondition as [`FlashDevice::erase_sector`]. Data running
    /// past the end of the page wraps to the start of the same page, as the
    /// chip does. An empty `data` is a no-op. Consumes WEL.
    pub fn page_program(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        Self::check_address(addr, 0)?;
        let page_offset = addr as usize % PAGE_SIZE;
        if page_offset + data.len() > PAGE_SIZE {
            log::warn!(
                "flash: program of {} bytes at 0x{:06X} wraps within its page",
                data.len(),
                addr
            );
        }
        self.require_write_enabled()?;

        log::trace!("flash: program {} bytes at 0x{:06X}", data.len(), addr);
        spi::command(&mut self.bus, opcodes::PP, Some(addr), data, &mut [])?;
        self.wait_ready(self.timeouts.program)?;
        Ok(())
    }

    /// Poll until WIP clears, giving up with `Error::DeviceHang`
    pub fn wait_ready(&mut self, timeout: Timeout) -> Result<Status> {
        for _ in 0..timeout.max_polls() {
            let status = self.read_status()?;
            if !status.is_busy() {
                return Ok(status);
            }
            if timeout.poll_delay_us > 0 {
                self.bus.delay_us(timeout.poll_delay_us);
            }
        }
        log::error!(
            "flash: still busy after {}us (status 0x{:02X})",
            timeout.timeout_us,
            self.last_status.raw()
        );
        Err(Error::DeviceHang)
    }

    /// Fresh status read; fails with `WriteProtected` unless WEL is set
    fn require_write_enabled(&mut self) -> Result<()> {
        let mut status = self.read_status()?;
        if status.is_busy() && status.is_write_enabled() {
            status = self.wait_ready(self.timeouts.erase)?;
        }
        if !status.is_write_enabled() {
            log::debug!(
                "flash: WEL clear (status 0x{:02X}), refusing mutating command",
                status.raw()
            );
            return Err(Error::WriteProtected);
        }
        Ok(())
    }

    fn check_address(addr: u32, len: u32) -> Result<()> {
        match addr.checked_add(len) {
            Some(end) if addr < ADDRESS_SPACE && end <= ADDRESS_SPACE => Ok(()),
            _ => Err(Error::AddressOutOfBounds),
        }
    }

    /// Check that `[addr, addr + len)` fits in the chip-size hint
    pub fn check_range(&self, addr: u32, len: u32) -> Result<()> {
        Self::check_address(addr, len)?;
        if addr.saturating_add(len) > self.size_bytes || addr >= self.size_bytes {
            return Err(Error::AddressOutOfBounds);
        }
        Ok(())
    }
}
