//! Wiring a command channel to the flash and running the console

use spiprog_core::channel::Channel;
use spiprog_core::console::Dispatcher;
use spiprog_core::flash::{FlashDevice, Timeout, Timeouts, DEFAULT_SIZE};
use spiprog_core::spi::SpiBus;
use spiprog_serial::{
    ChannelSpec, SerialTransport, StdioTransport, TcpServer, TransportChannel,
};

use crate::backends;
use crate::cli::ServeArgs;

const MIB: u32 = 1024 * 1024;

/// Busy-wait limits from the command line, keeping the default poll rates
pub fn timeouts(erase_ms: u32, program_ms: u32) -> Timeouts {
    let defaults = Timeouts::default();
    Timeouts {
        erase: Timeout {
            poll_delay_us: defaults.erase.poll_delay_us,
            timeout_us: erase_ms.saturating_mul(1000),
        },
        program: Timeout {
            poll_delay_us: defaults.program.poll_delay_us,
            timeout_us: program_ms.saturating_mul(1000),
        },
    }
}

/// Initial size hint: the command line wins, then the backend's chip size
pub fn size_hint(size_mib: Option<u32>, chip_size: Option<u32>) -> u32 {
    match (size_mib, chip_size) {
        (Some(mib), Some(chip)) if mib * MIB != chip => {
            log::warn!(
                "Size hint of {} MiB does not match the {} byte chip; dumps will wrap",
                mib,
                chip
            );
            mib * MIB
        }
        (Some(mib), _) => mib * MIB,
        (None, Some(chip)) => chip,
        (None, None) => DEFAULT_SIZE,
    }
}

/// Run one console session and hand the flash back
pub fn session<C: Channel, B: SpiBus>(
    channel: C,
    flash: FlashDevice<B>,
) -> (spiprog_core::Error, FlashDevice<B>) {
    let mut dispatcher = Dispatcher::new(channel, flash);
    let reason = dispatcher.run();
    let (_, flash) = dispatcher.into_parts();
    (reason, flash)
}

/// Open the backend and channel and serve until the channel is gone
///
/// TCP goes back to accepting after each client; the other channels end
/// the program when their peer goes away.
pub fn run(args: &ServeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let spec = ChannelSpec::parse(&args.channel)?;
    let bus = backends::open_backend(&args.spi)?;
    let size = size_hint(args.size_mib, bus.chip_size());
    let mut flash = FlashDevice::new(bus)
        .with_size(size)
        .with_timeouts(timeouts(args.erase_timeout_ms, args.program_timeout_ms));

    log::info!(
        "Serving {} on {} (size hint 0x{:X} bytes)",
        args.spi,
        args.channel,
        size
    );

    match spec {
        ChannelSpec::Stdio => {
            let (reason, _) = session(TransportChannel::new(StdioTransport::new()), flash);
            finish(reason)
        }
        ChannelSpec::Serial { device, baud } => {
            let transport = SerialTransport::open(&device, baud)?;
            let (reason, _) = session(TransportChannel::new(transport), flash);
            finish(reason)
        }
        ChannelSpec::Tcp { addr } => {
            let server = TcpServer::bind(&addr)?;
            loop {
                let transport = match server.accept() {
                    Ok(t) => t,
                    Err(e) => {
                        log::warn!("accept failed: {}", e);
                        continue;
                    }
                };
                let (reason, returned) = session(TransportChannel::new(transport), flash);
                log::info!("Client gone: {}", reason);
                flash = returned;
            }
        }
    }
}

fn finish(reason: spiprog_core::Error) -> Result<(), Box<dyn std::error::Error>> {
    match reason {
        spiprog_core::Error::ChannelClosed => {
            log::info!("Channel closed, exiting");
            Ok(())
        }
        e => Err(e.into()),
    }
}
