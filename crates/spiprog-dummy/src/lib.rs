//! spiprog-dummy - In-memory SPI NOR flash emulator for testing
//!
//! [`DummyFlash`] sits directly behind the [`SpiBus`] byte-exchange seam, so
//! the whole stack above it (transaction framing, the flash protocol, the
//! dispatcher) runs unmodified. It decodes opcodes per chip-select window the
//! way a 25-series chip does: erase and program take effect when chip-select
//! is released, both require the write enable latch, and both leave the chip
//! busy for a configurable number of status polls.
//!
//! [`ScriptedChannel`] plays the host side of the command channel.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(feature = "alloc")]
mod channel;

#[cfg(feature = "alloc")]
pub use channel::{Responder, ScriptedChannel};

#[cfg(feature = "alloc")]
use alloc::vec;
#[cfg(feature = "alloc")]
use alloc::vec::Vec;

#[cfg(feature = "alloc")]
use spiprog_core::error::Result;
#[cfg(feature = "alloc")]
use spiprog_core::flash::{Status, PAGE_SIZE, SECTOR_SIZE};
#[cfg(feature = "alloc")]
use spiprog_core::spi::{opcodes, SpiBus};

/// Configuration for the emulated chip
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// Bytes returned by RDID
    pub id: [u8; 4],
    /// Array size in bytes
    pub size: usize,
    /// Hardware write-protect pin asserted: WREN is ignored
    pub write_protect: bool,
    /// Status polls that still report WIP after an erase or program
    pub busy_polls: u32,
    /// Never clear WIP once an erase or program has started
    pub stuck_busy: bool,
    /// Chip only responds while [`SpiBus::power`] has switched it on
    pub switched_rail: bool,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            id: [0xEF, 0x40, 0x17, 0x00], // Winbond W25Q64
            size: 8 * 1024 * 1024,
            write_protect: false,
            busy_polls: 1,
            stuck_busy: false,
            switched_rail: false,
        }
    }
}

/// Traffic counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DummyStats {
    /// Chip-select windows opened
    pub transactions: u32,
    /// Erase or program opcodes received, accepted or not
    pub mutating: u32,
    /// Mutating commands dropped because WEL was clear
    pub ignored: u32,
    /// Sector and chip erases performed
    pub erases: u32,
    /// Page programs performed
    pub programs: u32,
}

#[cfg(feature = "alloc")]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Chip-select released
    Idle,
    /// Waiting for the opcode byte
    Opcode,
    /// Collecting address bytes, MSB first
    Address { opcode: u8, addr: u32, remaining: u8 },
    /// Opcode (and address) complete; `offset` counts payload bytes
    Data { opcode: u8, addr: u32, offset: usize },
    /// Rest of the window is ignored
    Ignore,
}

/// Emulated SPI NOR flash chip
#[cfg(feature = "alloc")]
pub struct DummyFlash {
    config: DummyConfig,
    data: Vec<u8>,
    page_latch: [u8; PAGE_SIZE],
    phase: Phase,
    selected: bool,
    powered: bool,
    write_enabled: bool,
    busy_remaining: u32,
    stuck: bool,
    stats: DummyStats,
}

#[cfg(feature = "alloc")]
impl DummyFlash {
    /// Create an erased chip with the given configuration
    pub fn new(config: DummyConfig) -> Self {
        let data = vec![0xFF; config.size];
        Self {
            powered: !config.switched_rail,
            config,
            data,
            page_latch: [0xFF; PAGE_SIZE],
            phase: Phase::Idle,
            selected: false,
            write_enabled: false,
            busy_remaining: 0,
            stuck: false,
            stats: DummyStats::default(),
        }
    }

    /// Create a chip with the default configuration (8 MiB W25Q64)
    pub fn new_default() -> Self {
        Self::new(DummyConfig::default())
    }

    /// Create a chip with pre-filled data
    pub fn with_data(config: DummyConfig, initial_data: &[u8]) -> Self {
        let mut flash = Self::new(config);
        let len = core::cmp::min(initial_data.len(), flash.data.len());
        flash.data[..len].copy_from_slice(&initial_data[..len]);
        flash
    }

    /// Array contents
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Mutable array contents
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Get the configuration
    pub fn config(&self) -> &DummyConfig {
        &self.config
    }

    /// Traffic counters
    pub fn stats(&self) -> DummyStats {
        self.stats
    }

    /// Zero the traffic counters
    pub fn reset_stats(&mut self) {
        self.stats = DummyStats::default();
    }

    /// Drive the write-protect pin
    pub fn set_write_protect(&mut self, asserted: bool) {
        self.config.write_protect = asserted;
    }

    /// True while the supply rail is on (always, without a switched rail)
    pub fn is_powered(&self) -> bool {
        self.powered
    }

    /// True while chip-select is asserted
    pub fn is_selected(&self) -> bool {
        self.selected
    }

    /// Current status register value
    pub fn status(&self) -> Status {
        let mut status = Status::empty();
        status.set(Status::WIP, self.is_busy());
        status.set(Status::WEL, self.write_enabled);
        status
    }

    fn is_busy(&self) -> bool {
        self.stuck || self.busy_remaining > 0
    }

    fn start(&mut self, opcode: u8) -> Phase {
        if self.is_busy() && opcode != opcodes::RDSR {
            log::debug!("dummy: busy, ignoring opcode 0x{:02X}", opcode);
            return Phase::Ignore;
        }
        if opcodes::is_mutating(opcode) {
            self.stats.mutating += 1;
        }
        match opcode {
            opcodes::READ | opcodes::PP | opcodes::SE_20 => {
                if opcode == opcodes::PP {
                    self.page_latch = [0xFF; PAGE_SIZE];
                }
                Phase::Address {
                    opcode,
                    addr: 0,
                    remaining: 3,
                }
            }
            opcodes::RDID | opcodes::RDSR | opcodes::WREN | opcodes::WRDI | opcodes::CE_C7 => {
                Phase::Data {
                    opcode,
                    addr: 0,
                    offset: 0,
                }
            }
            _ => {
                log::warn!("dummy: unsupported opcode 0x{:02X}", opcode);
                Phase::Ignore
            }
        }
    }

    fn data_byte(&mut self, opcode: u8, addr: u32, offset: usize, out: u8) -> u8 {
        match opcode {
            opcodes::RDID => self.config.id.get(offset).copied().unwrap_or(0xFF),
            opcodes::RDSR => self.poll_status(),
            opcodes::READ => {
                let index = (addr as usize + offset) % self.data.len();
                self.data[index]
            }
            opcodes::PP => {
                // Bytes past the page end wrap to its start
                let column = (addr as usize + offset) % PAGE_SIZE;
                self.page_latch[column] = out;
                0xFF
            }
            _ => 0xFF,
        }
    }

    /// Return the status byte, counting the poll against any busy period
    fn poll_status(&mut self) -> u8 {
        let status = self.status().bits();
        if self.busy_remaining > 0 {
            self.busy_remaining -= 1;
            if self.busy_remaining == 0 {
                self.write_enabled = false;
            }
        }
        status
    }

    /// Execute the command framed by the chip-select window just closed
    fn complete(&mut self) {
        let Phase::Data {
            opcode,
            addr,
            offset,
        } = self.phase
        else {
            return;
        };

        match opcode {
            opcodes::WREN => {
                if self.config.write_protect {
                    log::debug!("dummy: WREN ignored, write-protect pin asserted");
                } else {
                    self.write_enabled = true;
                }
            }
            opcodes::WRDI => self.write_enabled = false,
            opcodes::SE_20 => {
                if self.accept_mutation(opcode) {
                    let base = self.wrap(addr) & !(SECTOR_SIZE as usize - 1);
                    let end = (base + SECTOR_SIZE as usize).min(self.data.len());
                    self.data[base..end].fill(0xFF);
                    self.stats.erases += 1;
                    self.begin_busy();
                }
            }
            opcodes::CE_C7 => {
                if self.accept_mutation(opcode) {
                    self.data.fill(0xFF);
                    self.stats.erases += 1;
                    self.begin_busy();
                }
            }
            opcodes::PP if offset > 0 => {
                if self.accept_mutation(opcode) {
                    let page = self.wrap(addr) & !(PAGE_SIZE - 1);
                    for (column, &byte) in self.page_latch.iter().enumerate() {
                        if let Some(cell) = self.data.get_mut(page + column) {
                            // Programming can only clear bits
                            *cell &= byte;
                        }
                    }
                    self.stats.programs += 1;
                    self.begin_busy();
                }
            }
            _ => {}
        }
    }

    fn accept_mutation(&mut self, opcode: u8) -> bool {
        if !self.write_enabled {
            log::debug!("dummy: opcode 0x{:02X} ignored, WEL clear", opcode);
            self.stats.ignored += 1;
            return false;
        }
        true
    }

    fn begin_busy(&mut self) {
        if self.config.stuck_busy {
            self.stuck = true;
        } else if self.config.busy_polls == 0 {
            self.write_enabled = false;
        } else {
            self.busy_remaining = self.config.busy_polls;
        }
    }

    fn wrap(&self, addr: u32) -> usize {
        addr as usize % self.data.len()
    }
}

#[cfg(feature = "alloc")]
impl SpiBus for DummyFlash {
    fn select(&mut self, asserted: bool) -> Result<()> {
        if asserted {
            if self.selected {
                log::warn!("dummy: chip-select asserted twice");
            }
            self.stats.transactions += 1;
            self.phase = if self.powered {
                Phase::Opcode
            } else {
                Phase::Ignore
            };
        } else {
            if self.selected {
                self.complete();
            }
            self.phase = Phase::Idle;
        }
        self.selected = asserted;
        Ok(())
    }

    fn exchange(&mut self, out: u8) -> Result<u8> {
        let (next, reply) = match self.phase {
            Phase::Idle | Phase::Ignore => (self.phase, 0xFF),
            Phase::Opcode => (self.start(out), 0xFF),
            Phase::Address {
                opcode,
                addr,
                remaining,
            } => {
                let addr = (addr << 8) | out as u32;
                let next = if remaining > 1 {
                    Phase::Address {
                        opcode,
                        addr,
                        remaining: remaining - 1,
                    }
                } else {
                    Phase::Data {
                        opcode,
                        addr,
                        offset: 0,
                    }
                };
                (next, 0xFF)
            }
            Phase::Data {
                opcode,
                addr,
                offset,
            } => {
                let reply = self.data_byte(opcode, addr, offset, out);
                (
                    Phase::Data {
                        opcode,
                        addr,
                        offset: offset + 1,
                    },
                    reply,
                )
            }
        };
        self.phase = next;
        Ok(reply)
    }

    fn power(&mut self, on: bool) -> Result<()> {
        if !self.config.switched_rail {
            return Ok(());
        }
        if !on {
            // Volatile state is lost with the supply
            self.write_enabled = false;
            self.busy_remaining = 0;
            self.stuck = false;
        }
        log::trace!("dummy: power {}", if on { "on" } else { "off" });
        self.powered = on;
        Ok(())
    }
}
