//! Byte transports the command channel can run over
//!
//! Each transport offers blocking writes and reads bounded by a timeout, so
//! the channel above can both wait for the operator indefinitely and poll for
//! stray handshake bytes without blocking.

use crate::error::Result;

/// Transport trait for reading and writing bytes
pub trait Transport {
    /// Write all bytes to the transport
    fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Read up to `buf.len()` bytes, waiting up to `timeout_ms` milliseconds
    ///
    /// Returns the number of bytes read, or 0 on timeout. A peer that has
    /// gone away is `ChannelError::Closed`, never `Ok(0)`.
    fn read_nonblock(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize>;

    /// Flush any buffered data
    fn flush(&mut self) -> Result<()>;
}

pub mod serial {
    //! Serial port transport implementation

    use super::*;
    use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
    use std::io::{Read, Write};
    use std::time::Duration;

    /// Default baud rate when none is given
    pub const DEFAULT_BAUD: u32 = 115_200;

    /// Serial port transport
    pub struct SerialTransport {
        port: Box<dyn SerialPort>,
    }

    impl SerialTransport {
        /// Open a serial port, 8N1 without flow control
        pub fn open(device: &str, baud: Option<u32>) -> Result<Self> {
            let baud_rate = baud.unwrap_or(DEFAULT_BAUD);

            let port = serialport::new(device, baud_rate)
                .data_bits(DataBits::Eight)
                .parity(Parity::None)
                .stop_bits(StopBits::One)
                .flow_control(FlowControl::None)
                .timeout(Duration::from_secs(1))
                .open()?;

            log::info!("Opened serial port {} at {} baud", device, baud_rate);

            Ok(Self { port })
        }
    }

    impl Transport for SerialTransport {
        fn write(&mut self, data: &[u8]) -> Result<()> {
            self.port.write_all(data)?;
            Ok(())
        }

        fn read_nonblock(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize> {
            if self.port.bytes_to_read()? == 0 {
                let timeout = Duration::from_millis(timeout_ms as u64);
                if self.port.timeout() != timeout {
                    self.port.set_timeout(timeout)?;
                }
            }

            match self.port.read(buf) {
                Ok(n) => Ok(n),
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(0),
                Err(e) => Err(e.into()),
            }
        }

        fn flush(&mut self) -> Result<()> {
            self.port.flush()?;
            Ok(())
        }
    }
}

pub mod tcp {
    //! TCP socket transport implementation
    //!
    //! The programmer is the listening side: one client at a time, and the
    //! server goes back to accepting once that client disconnects.

    use super::*;
    use crate::error::ChannelError;
    use std::io::{Read, Write};
    use std::net::{SocketAddr, TcpListener, TcpStream};
    use std::time::Duration;

    /// Listening socket handing out one [`TcpTransport`] per client
    pub struct TcpServer {
        listener: TcpListener,
    }

    impl TcpServer {
        /// Bind to `addr` (e.g. "0.0.0.0:2222")
        pub fn bind(addr: &str) -> Result<Self> {
            let listener = TcpListener::bind(addr)
                .map_err(|e| ChannelError::ConnectionFailed(format!("bind {}: {}", addr, e)))?;
            log::info!("Listening on {}", listener.local_addr()?);
            Ok(Self { listener })
        }

        /// Address actually bound (useful with port 0)
        pub fn local_addr(&self) -> Result<SocketAddr> {
            Ok(self.listener.local_addr()?)
        }

        /// Block until the next client connects
        pub fn accept(&self) -> Result<TcpTransport> {
            let (stream, peer) = self
                .listener
                .accept()
                .map_err(|e| ChannelError::ConnectionFailed(e.to_string()))?;
            log::info!("Client connected from {}", peer);
            TcpTransport::new(stream)
        }
    }

    /// TCP socket transport
    pub struct TcpTransport {
        stream: TcpStream,
        read_timeout_ms: u32,
    }

    impl TcpTransport {
        /// Wrap a connected stream
        pub fn new(stream: TcpStream) -> Result<Self> {
            // Set TCP_NODELAY to reduce latency
            stream.set_nodelay(true).map_err(|e| {
                ChannelError::ConnectionFailed(format!("Failed to set TCP_NODELAY: {}", e))
            })?;
            Ok(Self {
                stream,
                read_timeout_ms: 0,
            })
        }
    }

    impl Transport for TcpTransport {
        fn write(&mut self, data: &[u8]) -> Result<()> {
            self.stream.write_all(data)?;
            Ok(())
        }

        fn read_nonblock(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize> {
            // A zero timeout is rejected by the socket API
            let timeout_ms = timeout_ms.max(1);
            if self.read_timeout_ms != timeout_ms {
                self.stream
                    .set_read_timeout(Some(Duration::from_millis(timeout_ms as u64)))?;
                self.read_timeout_ms = timeout_ms;
            }

            match self.stream.read(buf) {
                Ok(0) if !buf.is_empty() => Err(ChannelError::Closed),
                Ok(n) => Ok(n),
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(0),
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(0),
                Err(e) => Err(e.into()),
            }
        }

        fn flush(&mut self) -> Result<()> {
            self.stream.flush()?;
            Ok(())
        }
    }
}

pub mod stdio {
    //! Standard input/output transport
    //!
    //! Stdin has no read timeout, so a reader thread forwards chunks over a
    //! channel and reads with a timeout become `recv_timeout`.

    use super::*;
    use crate::error::ChannelError;
    use std::collections::VecDeque;
    use std::io::{Read, Write};
    use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
    use std::thread;
    use std::time::Duration;

    const CHUNK: usize = 512;

    /// Transport over a reader thread and a writer
    pub struct StdioTransport {
        rx: Receiver<Vec<u8>>,
        pending: VecDeque<u8>,
        writer: Box<dyn Write>,
    }

    impl StdioTransport {
        /// Use the process's stdin and stdout
        pub fn new() -> Self {
            Self::with_io(std::io::stdin(), Box::new(std::io::stdout()))
        }

        /// Use an arbitrary reader and writer
        pub fn with_io<R: Read + Send + 'static>(mut reader: R, writer: Box<dyn Write>) -> Self {
            let (tx, rx) = mpsc::channel();
            thread::spawn(move || {
                let mut buf = [0u8; CHUNK];
                loop {
                    match reader.read(&mut buf) {
                        Ok(0) => break,
                        Ok(n) => {
                            if tx.send(buf[..n].to_vec()).is_err() {
                                break;
                            }
                        }
                        Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                        Err(e) => {
                            log::error!("stdio: read failed: {}", e);
                            break;
                        }
                    }
                }
                log::debug!("stdio: input closed");
            });
            Self {
                rx,
                pending: VecDeque::new(),
                writer,
            }
        }
    }

    impl Default for StdioTransport {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Transport for StdioTransport {
        fn write(&mut self, data: &[u8]) -> Result<()> {
            self.writer.write_all(data)?;
            Ok(())
        }

        fn read_nonblock(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize> {
            if self.pending.is_empty() {
                let chunk = if timeout_ms == 0 {
                    match self.rx.try_recv() {
                        Ok(chunk) => chunk,
                        Err(mpsc::TryRecvError::Empty) => return Ok(0),
                        Err(mpsc::TryRecvError::Disconnected) => return Err(ChannelError::Closed),
                    }
                } else {
                    match self
                        .rx
                        .recv_timeout(Duration::from_millis(timeout_ms as u64))
                    {
                        Ok(chunk) => chunk,
                        Err(RecvTimeoutError::Timeout) => return Ok(0),
                        Err(RecvTimeoutError::Disconnected) => return Err(ChannelError::Closed),
                    }
                };
                self.pending.extend(chunk);
            }

            let n = buf.len().min(self.pending.len());
            for (slot, byte) in buf.iter_mut().zip(self.pending.drain(..n)) {
                *slot = byte;
            }
            Ok(n)
        }

        fn flush(&mut self) -> Result<()> {
            self.writer.flush()?;
            Ok(())
        }
    }
}
