//! Bulk transfers
//!
//! Whole-chip extraction goes through a retry-capable block-transfer
//! protocol ([`BlockTransfer`], implemented by [`Xmodem`]); uploads are a plain
//! byte push from the host on the raw command channel. [`bulk`] drives the
//! flash protocol for both directions.

pub mod bulk;
pub mod xmodem;

pub use bulk::{dump, upload, UPLOAD_BLOCK_SIZE};
pub use xmodem::Xmodem;

use crate::error::Result;

/// Fixed block size of the block-transfer protocol
pub const BLOCK_SIZE: usize = 128;

/// Sending half of a block-transfer protocol
///
/// A transfer is `begin_send`, any number of `send_block`, then either
/// `end_send` or `abort`. `end_send` is also the teardown after a failed
/// `send_block`; `abort` ends a transfer the sender itself could not finish.
pub trait BlockTransfer {
    /// Start a transfer
    ///
    /// With `retransmit_allowed` false, the first negative acknowledgement
    /// fails the transfer instead of triggering a resend.
    fn begin_send(&mut self, retransmit_allowed: bool) -> Result<()>;

    /// Send one block, retrying per the protocol's budget
    ///
    /// Fails with `Error::TransferAborted` once the budget is exhausted or
    /// the receiver cancels. Any failure ends the transfer.
    fn send_block(&mut self, block: &[u8; BLOCK_SIZE]) -> Result<()>;

    /// Finish (or tear down) the transfer
    fn end_send(&mut self) -> Result<()>;

    /// Tear the transfer down without marking it complete
    ///
    /// The receiver must not be left believing the data it holds is whole.
    fn abort(&mut self) -> Result<()>;
}
