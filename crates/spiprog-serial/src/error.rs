//! Error types for command channels

use thiserror::Error;

/// Channel-specific errors
#[derive(Debug, Error)]
pub enum ChannelError {
    /// Failed to open or accept a connection
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The peer went away
    #[error("Channel closed by peer")]
    Closed,

    /// I/O error during communication
    #[error("I/O error: {0}")]
    IoError(String),

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Serial port error
    #[error("Serial port error: {0}")]
    SerialError(#[from] serialport::Error),
}

/// Result type for channel operations
pub type Result<T> = std::result::Result<T, ChannelError>;

impl From<std::io::Error> for ChannelError {
    fn from(e: std::io::Error) -> Self {
        use std::io::ErrorKind;
        match e.kind() {
            ErrorKind::UnexpectedEof
            | ErrorKind::BrokenPipe
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted => ChannelError::Closed,
            _ => ChannelError::IoError(e.to_string()),
        }
    }
}

impl From<ChannelError> for spiprog_core::Error {
    fn from(e: ChannelError) -> Self {
        match e {
            ChannelError::Closed => spiprog_core::Error::ChannelClosed,
            other => {
                log::error!("channel: {}", other);
                spiprog_core::Error::ChannelIo
            }
        }
    }
}
