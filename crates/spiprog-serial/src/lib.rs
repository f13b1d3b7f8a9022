//! spiprog-serial - Host-facing command channels
//!
//! The programmer's command loop reads single characters and writes replies
//! through the core [`spiprog_core::channel::Channel`] trait. This crate
//! provides that channel over a serial port, a TCP socket, or the process's
//! own stdin/stdout.
//!
//! # Example
//!
//! ```no_run
//! use spiprog_serial::{ChannelSpec, SerialTransport, TransportChannel};
//!
//! let spec = ChannelSpec::parse("dev=/dev/ttyUSB0:115200")?;
//! if let ChannelSpec::Serial { device, baud } = spec {
//!     let channel = TransportChannel::new(SerialTransport::open(&device, baud)?);
//!     # let _ = channel;
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod channel;
pub mod error;
pub mod transport;

pub use channel::TransportChannel;
pub use error::{ChannelError, Result};
pub use transport::serial::SerialTransport;
pub use transport::stdio::StdioTransport;
pub use transport::tcp::{TcpServer, TcpTransport};
pub use transport::Transport;

/// Where the command channel comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelSpec {
    /// The process's own stdin/stdout
    Stdio,
    /// Serial port
    Serial {
        /// Device path (e.g., "/dev/ttyUSB0" or "COM1")
        device: String,
        /// Baud rate (None for the 115200 default)
        baud: Option<u32>,
    },
    /// TCP listener, one client at a time
    Tcp {
        /// Address to bind, `host:port`
        addr: String,
    },
}

impl ChannelSpec {
    /// Parse a channel string
    ///
    /// Formats:
    /// - `stdio` - stdin/stdout
    /// - `dev=/dev/ttyUSB0` - Serial with default baud
    /// - `dev=/dev/ttyUSB0:115200` - Serial with specified baud
    /// - `ip=host:port` - TCP listener
    pub fn parse(s: &str) -> Result<Self> {
        if s == "stdio" {
            Ok(ChannelSpec::Stdio)
        } else if let Some(dev) = s.strip_prefix("dev=") {
            match dev.rsplit_once(':') {
                Some((device, baud_str)) if !device.is_empty() => {
                    let baud = baud_str.parse().map_err(|_| {
                        ChannelError::InvalidParameter(format!("Invalid baud rate: {}", baud_str))
                    })?;
                    Ok(ChannelSpec::Serial {
                        device: device.to_string(),
                        baud: Some(baud),
                    })
                }
                _ if dev.is_empty() => Err(ChannelError::InvalidParameter(
                    "Missing device path in dev= parameter".to_string(),
                )),
                _ => Ok(ChannelSpec::Serial {
                    device: dev.to_string(),
                    baud: None,
                }),
            }
        } else if let Some(ip) = s.strip_prefix("ip=") {
            let (_, port_str) = ip.rsplit_once(':').ok_or_else(|| {
                ChannelError::InvalidParameter("Missing port in ip= parameter".to_string())
            })?;
            port_str.parse::<u16>().map_err(|_| {
                ChannelError::InvalidParameter(format!("Invalid port: {}", port_str))
            })?;
            Ok(ChannelSpec::Tcp {
                addr: ip.to_string(),
            })
        } else {
            Err(ChannelError::InvalidParameter(format!(
                "Invalid channel string: {}. Use stdio, dev=... or ip=...",
                s
            )))
        }
    }
}
