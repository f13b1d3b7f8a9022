//! Single-character command dispatcher
//!
//! The host types one command character, optionally followed by hex
//! parameters terminated by any non-hex character. Every command ends with a
//! textual reply (or raw binary for the dumps) and a fresh prompt.
//!
//! | cmd | params | action |
//! |-----|--------|--------|
//! | `i` | - | identify, 4 bytes hex |
//! | `r` | addr | read 16 bytes |
//! | `.` | - | read the next 16 bytes |
//! | `R` | - | raw dump of the whole chip |
//! | `w` | - | write enable, then status (`!` if WEL did not latch) |
//! | `e` | addr | erase one 4 KiB sector |
//! | `u` | addr len | upload raw bytes into sector-aligned region |
//! | `s` | MiB | set the chip-size hint |
//! | NAK / `C` | - | XMODEM dump of the whole chip |
//! | `?` | - | help |
//!
//! Errors share the reply channel with normal output and are marked with a
//! trailing `!`. Unknown commands are echoed back with `?`.

mod reply;
mod session;

pub use reply::EOL;
pub use session::{Session, MAX_PARAMS};

use core::fmt::Write;

use crate::channel::Channel;
use crate::error::{Error, Result};
use crate::flash::{check_sector_aligned, FlashDevice, SECTOR_SIZE};
use crate::spi::{SpiBus, ADDRESS_SPACE};
use crate::transfer::{self, xmodem::Check, Xmodem};
use reply::Reply;

/// Written after every command
pub const PROMPT: &[u8] = b"> ";

/// Bytes shown by `r` and `.`
pub const READ_LEN: usize = 16;

/// Chunk size for the raw `R` dump
const RAW_CHUNK: usize = 256;

/// Largest chip-size hint `s` accepts, limited by 3-byte addressing
pub const MAX_SIZE_MIB: u32 = ADDRESS_SPACE / (1024 * 1024);

const HELP: &[&str] = &[
    "i         identify",
    "r<addr>   read 16 bytes",
    ".         read next 16 bytes",
    "R         raw dump",
    "w         write enable",
    "e<addr>   erase 4K sector",
    "u<addr> <len>  upload (4K aligned)",
    "s<mib>    set chip size",
    "NAK / C   XMODEM dump",
    "?         this help",
];

/// Read-eval loop over a command channel and one flash chip
pub struct Dispatcher<C: Channel, B: SpiBus> {
    channel: C,
    flash: FlashDevice<B>,
    session: Session,
}

impl<C: Channel, B: SpiBus> Dispatcher<C, B> {
    /// Create a dispatcher serving `flash` on `channel`
    pub fn new(channel: C, flash: FlashDevice<B>) -> Self {
        Self {
            channel,
            flash,
            session: Session::new(),
        }
    }

    /// Session state (read cursor and last command)
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// The flash device being served
    pub fn flash(&self) -> &FlashDevice<B> {
        &self.flash
    }

    /// Mutable access to the flash device
    pub fn flash_mut(&mut self) -> &mut FlashDevice<B> {
        &mut self.flash
    }

    /// Mutable access to the command channel
    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    /// Take the dispatcher apart
    pub fn into_parts(self) -> (C, FlashDevice<B>) {
        (self.channel, self.flash)
    }

    /// Serve commands until the channel fails
    ///
    /// The chip's supply rail is on for the whole session and switched off
    /// again however it ends. Returns the channel error that ended it.
    pub fn run(&mut self) -> Error {
        log::info!("console: session started");
        let result = self.flash.power_on().and_then(|()| self.serve());
        if let Err(e) = self.flash.power_off() {
            log::error!("console: failed to switch power off: {}", e);
        }
        match result {
            Ok(()) => Error::ChannelClosed,
            Err(e) => {
                log::info!("console: session ended: {}", e);
                e
            }
        }
    }

    fn serve(&mut self) -> Result<()> {
        self.prompt()?;
        loop {
            self.step()?;
        }
    }

    /// Block for one command character and handle it
    pub fn step(&mut self) -> Result<()> {
        let cmd = self.channel.read_byte()?;
        self.handle(cmd)
    }

    /// Handle a command if one is already waiting
    ///
    /// Returns whether a character was consumed.
    pub fn poll(&mut self) -> Result<bool> {
        match self.channel.try_read_byte()? {
            Some(cmd) => self.handle(cmd).map(|()| true),
            None => Ok(false),
        }
    }

    /// Run the command `cmd`, reply, and prompt
    ///
    /// Only channel failures are returned; every other error is reported to
    /// the host and the dispatcher stays usable.
    pub fn handle(&mut self, cmd: u8) -> Result<()> {
        if is_separator(cmd) {
            return Ok(());
        }

        self.session.begin(cmd);
        log::debug!("console: command {:?}", cmd as char);

        match self.execute(cmd) {
            Ok(()) => {}
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                self.report(e)?;
            }
        }
        self.prompt()
    }

    fn execute(&mut self, cmd: u8) -> Result<()> {
        match cmd {
            b'i' => self.identify(),
            b'r' => {
                let addr = self.session.param(&mut self.channel)?;
                self.read_at(addr)
            }
            b'.' => {
                let next = self.session.cursor().wrapping_add(READ_LEN as u32);
                self.read_at(next)
            }
            b'R' => self.raw_dump(),
            b'w' => self.write_enable(),
            b'e' => {
                let addr = self.session.param(&mut self.channel)?;
                self.erase(addr)
            }
            b'u' => {
                let addr = self.session.param(&mut self.channel)?;
                let len = self.session.param(&mut self.channel)?;
                self.upload(addr, len)
            }
            b's' => {
                let mib = self.session.param(&mut self.channel)?;
                self.set_size(mib)
            }
            b'?' => self.help(),
            other => match Check::from_request(other) {
                Some(check) => self.block_dump(check),
                None => Err(Error::MalformedCommand(other)),
            },
        }
    }

    fn identify(&mut self) -> Result<()> {
        let id = self.flash.identify()?;
        Reply::new(&mut self.channel).hex(&id, false).finish(Ok(()))
    }

    fn read_at(&mut self, addr: u32) -> Result<()> {
        self.flash.check_range(addr, READ_LEN as u32)?;
        let mut buf = [0u8; READ_LEN];
        self.flash.read(addr, &mut buf)?;
        self.session.set_cursor(addr);

        let mut reply = Reply::new(&mut self.channel);
        let r = write!(reply, "{:06X}:", addr);
        reply.hex(&buf, true).finish(r)
    }

    fn raw_dump(&mut self) -> Result<()> {
        let size = self.flash.size();
        let mut buf = [0u8; RAW_CHUNK];
        let mut addr = 0u32;
        while addr < size {
            let n = (size - addr).min(RAW_CHUNK as u32) as usize;
            self.flash.read(addr, &mut buf[..n])?;
            self.channel.write(&buf[..n])?;
            addr += n as u32;
        }
        self.channel.flush()?;
        log::info!("console: raw dump of {} bytes", size);
        Ok(())
    }

    fn write_enable(&mut self) -> Result<()> {
        self.flash.write_enable()?;
        let status = self.flash.read_status()?;
        if !status.is_write_enabled() {
            log::warn!(
                "console: WEL did not latch (status 0x{:02X})",
                status.raw()
            );
        }
        let mut reply = Reply::new(&mut self.channel);
        reply.hex(&[status.raw()], false);
        if !status.is_write_enabled() {
            reply.bytes(b"!");
        }
        reply.finish(Ok(()))
    }

    fn erase(&mut self, addr: u32) -> Result<()> {
        check_sector_aligned(addr, 0)?;
        self.flash.check_range(addr, SECTOR_SIZE)?;
        self.flash.erase_sector(addr)?;
        let mut reply = Reply::new(&mut self.channel);
        let r = write!(reply, "{:06X}", addr);
        reply.finish(r)
    }

    fn upload(&mut self, addr: u32, len: u32) -> Result<()> {
        let written = transfer::upload(&mut self.flash, &mut self.channel, addr, len)?;
        let mut reply = Reply::new(&mut self.channel);
        let r = write!(reply, "{:06X}+{:X}", addr, written);
        reply.finish(r)
    }

    fn set_size(&mut self, mib: u32) -> Result<()> {
        if mib == 0 || mib > MAX_SIZE_MIB {
            return Err(Error::InvalidParameter);
        }
        self.flash.set_size(mib * 1024 * 1024);
        Ok(())
    }

    fn block_dump(&mut self, check: Check) -> Result<()> {
        let mut xfer = Xmodem::new(&mut self.channel, check);
        let sent = transfer::dump(&mut self.flash, &mut xfer, true)?;
        log::info!("console: XMODEM dump of {} bytes ({:?})", sent, check);
        Ok(())
    }

    fn help(&mut self) -> Result<()> {
        for line in HELP {
            Reply::new(&mut self.channel)
                .bytes(line.as_bytes())
                .finish(Ok(()))?;
        }
        Ok(())
    }

    fn report(&mut self, error: Error) -> Result<()> {
        if let Some(cmd) = self.session.last_command() {
            log::debug!(
                "console: {:?} {:X?} failed: {}",
                cmd as char,
                self.session.params(),
                error
            );
        }
        let mut reply = Reply::new(&mut self.channel);
        let r = match error {
            Error::MalformedCommand(c) => {
                reply.bytes(&[c, b'?']);
                Ok(())
            }
            other => write!(reply, "{}!", other),
        };
        reply.finish(r)
    }

    fn prompt(&mut self) -> Result<()> {
        self.channel.write(PROMPT)?;
        self.channel.flush()
    }
}

/// Characters between commands that are dropped without a reply
fn is_separator(c: u8) -> bool {
    matches!(c, b'\r' | b'\n' | b' ' | b'\t')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spi::opcodes;
    use crate::testutil::{BusEvent, MemChannel, ScriptedBus};
    use std::vec::Vec;

    fn dispatcher(input: &[u8], bus: ScriptedBus) -> Dispatcher<MemChannel, ScriptedBus> {
        Dispatcher::new(MemChannel::new(input), FlashDevice::new(bus))
    }

    /// Feed every queued character through the dispatcher
    fn drain(d: &mut Dispatcher<MemChannel, ScriptedBus>) -> Vec<u8> {
        while d.poll().unwrap() {}
        d.channel_mut().take_output()
    }

    #[test]
    fn test_identify_reply() {
        let mut bus = ScriptedBus::new();
        // Opcode slot, then the four id bytes
        bus.respond(&[0xFF, 0x01, 0x02, 0x04, 0x17]);
        let mut d = dispatcher(b"i", bus);
        assert_eq!(drain(&mut d), b"01020417\r\n> ");
    }

    #[test]
    fn test_read_and_next() {
        let mut bus = ScriptedBus::new();
        let mut first = [0u8; 4 + READ_LEN];
        first[4..].copy_from_slice(&[0xAB; READ_LEN]);
        bus.respond(&first);
        let mut d = dispatcher(b"r7F0000\r.", bus);

        let out = drain(&mut d);
        let text = core::str::from_utf8(&out).unwrap();
        let mut lines = text.split("\r\n");
        assert_eq!(
            lines.next().unwrap(),
            "7F0000: AB AB AB AB AB AB AB AB AB AB AB AB AB AB AB AB"
        );
        assert!(lines.next().unwrap().starts_with("> 7F0010:"));
        assert_eq!(d.session().cursor(), 0x7F0010);
    }

    #[test]
    fn test_read_out_of_bounds() {
        let mut d = dispatcher(b"r7FFFF8\r", ScriptedBus::new());
        assert_eq!(drain(&mut d), b"address out of bounds!\r\n> ");
        assert!(d.flash_mut().bus_mut().events().is_empty());
    }

    #[test]
    fn test_write_enable_latched() {
        let mut d = dispatcher(b"w", ScriptedBus::new().with_status(0x02));
        assert_eq!(drain(&mut d), b"02\r\n> ");
        assert_eq!(
            d.flash_mut().bus_mut().opcodes(),
            [opcodes::WREN, opcodes::RDSR]
        );
    }

    #[test]
    fn test_write_enable_refused_then_erase() {
        // Busy and WEL clear: the latch never sets
        let mut d = dispatcher(b"we0\r", ScriptedBus::new().with_status(0x01));
        assert_eq!(drain(&mut d), b"01!\r\n> write protected!\r\n> ");

        let ops = d.flash_mut().bus_mut().opcodes();
        assert!(!ops.contains(&opcodes::SE_20));
    }

    #[test]
    fn test_erase_echoes_address() {
        let mut d = dispatcher(b"e1000\r", ScriptedBus::new().with_status(0x02));
        assert_eq!(drain(&mut d), b"001000\r\n> ");
    }

    #[test]
    fn test_erase_unaligned() {
        let mut d = dispatcher(b"e1001\r", ScriptedBus::new().with_status(0x02));
        let out = drain(&mut d);
        assert!(out.starts_with(b"unaligned region 0x001001"));
        assert!(out.ends_with(b"!\r\n> "));
        assert!(d.flash_mut().bus_mut().events().is_empty());
    }

    #[test]
    fn test_upload_misaligned_no_traffic() {
        let mut d = dispatcher(b"u190001 1000\r", ScriptedBus::new().with_status(0x02));
        let out = drain(&mut d);
        assert!(out.starts_with(b"unaligned region"));
        assert!(d.flash_mut().bus_mut().events().is_empty());
    }

    #[test]
    fn test_upload_reply() {
        let mut input = Vec::from(&b"u2000 1000\r"[..]);
        input.extend_from_slice(&[0x5A; 0x1000]);
        let mut d = dispatcher(&input, ScriptedBus::new().with_status(0x02));
        assert_eq!(drain(&mut d), b"002000+1000\r\n> ");
    }

    #[test]
    fn test_failed_upload_payload_is_not_executed() {
        let mut input = Vec::from(&b"u0 1000\r"[..]);
        let payload: Vec<u8> = b"s1\r".iter().copied().cycle().take(0x1000).collect();
        input.extend_from_slice(&payload);
        // WEL never latches
        let mut d = dispatcher(&input, ScriptedBus::new().with_status(0x00));

        assert_eq!(drain(&mut d), b"write protected!\r\n> ");
        assert_eq!(d.flash().size(), crate::flash::DEFAULT_SIZE);
    }

    #[test]
    fn test_set_size() {
        let mut d = dispatcher(b"s1\rs0\rs11\r", ScriptedBus::new());
        assert_eq!(
            drain(&mut d),
            b"> invalid parameter!\r\n> invalid parameter!\r\n> "
        );
        assert_eq!(d.flash().size(), 1024 * 1024);
    }

    #[test]
    fn test_raw_dump_bounded_by_size() {
        let mut d = dispatcher(b"s1\rR", ScriptedBus::new());
        let out = drain(&mut d);
        // Prompt after `s`, the raw bytes, prompt after `R`
        assert_eq!(out.len(), 2 + 1024 * 1024 + 2);
        assert!(out[2..out.len() - 2].iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_unknown_and_separators() {
        let mut d = dispatcher(b"\r\n x", ScriptedBus::new());
        assert_eq!(drain(&mut d), b"x?\r\n> ");
    }

    #[test]
    fn test_help() {
        let mut d = dispatcher(b"?", ScriptedBus::new());
        let out = drain(&mut d);
        assert_eq!(
            out.iter().filter(|&&b| b == b'\n').count(),
            HELP.len()
        );
        assert!(out.ends_with(PROMPT));
    }

    #[test]
    fn test_xmodem_trigger_on_dead_channel() {
        // Receiver asks for CRC mode, then goes away before acknowledging
        let mut d = dispatcher(b"C", ScriptedBus::new());
        assert_eq!(d.poll(), Err(Error::ChannelClosed));

        let out = d.channel_mut().take_output();
        assert_eq!(&out[..3], &[transfer::xmodem::SOH, 1, 0xFE]);
        // Teardown cancels instead of sending EOT
        assert_eq!(
            &out[out.len() - 2..],
            &[transfer::xmodem::CAN, transfer::xmodem::CAN]
        );
        assert!(!d.flash_mut().bus_mut().is_selected());
    }

    #[test]
    fn test_erase_beyond_size_hint() {
        let mut d = dispatcher(b"s1\re100000\r", ScriptedBus::new().with_status(0x02));
        assert_eq!(drain_after_prompt(&mut d), b"address out of bounds!\r\n> ");
        assert!(d.flash_mut().bus_mut().events().is_empty());
    }

    fn drain_after_prompt(d: &mut Dispatcher<MemChannel, ScriptedBus>) -> Vec<u8> {
        let out = drain(d);
        out[PROMPT.len()..].to_vec()
    }

    #[test]
    fn test_run_powers_off_on_close() {
        let mut d = dispatcher(b"i", ScriptedBus::new());
        assert_eq!(d.run(), Error::ChannelClosed);
        let events = d.flash_mut().bus_mut().events().to_vec();
        assert_eq!(events.first(), Some(&BusEvent::Power(true)));
        assert_eq!(events.last(), Some(&BusEvent::Power(false)));
        assert!(d.channel_mut().output().starts_with(PROMPT));
    }
}
