//! Bus collaborators.
//!
//! The client never touches CAN hardware. It sends through [`CanBus`], hands
//! the object pool to [`BulkTransfer`] and learns addresses from
//! [`ControlFunction`]. Received frames are pushed in by the embedding
//! application via
//! [`TaskControllerClient::process_rx_frame`](crate::protocol::TaskControllerClient::process_rx_frame).
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │          TaskControllerClient           │
//! └───────┬──────────────┬──────────────────┘
//!         │ send         │ begin_transfer       ▲ process_rx_frame
//!         ▼              ▼                      │
//! ┌──────────────┐ ┌──────────────┐     ┌──────────────┐
//! │    CanBus    │ │ BulkTransfer │     │ receive path │
//! └──────────────┘ └──────────────┘     └──────────────┘
//! ```
//!
//! [`virtual_bus`] provides in-memory implementations of all three for
//! tests and the `tc-client simulate` command.

pub mod virtual_bus;

pub use virtual_bus::{SentFrame, VirtualCanBus, VirtualControlFunction};

use crate::codec::NULL_ADDRESS;

/// Completion callback of a bulk transfer, `true` on success
pub type TransferCompleteCallback = Box<dyn FnOnce(bool) + Send>;

/// Single-frame send path
pub trait CanBus: Send + Sync {
    /// Queue a frame; `true` if the lower layer accepted it
    fn send(&self, pgn: u32, destination: u8, data: &[u8]) -> bool;
}

/// Multi-frame transport (TP / ETP) used for the object pool
pub trait BulkTransfer: Send + Sync {
    /// Start a transfer; `on_complete` fires later from the transport's context.
    /// Returns `false` if the transfer could not be started, in which case
    /// `on_complete` is dropped without being called.
    fn begin_transfer(
        &self,
        pgn: u32,
        destination: u8,
        data: Vec<u8>,
        on_complete: TransferCompleteCallback,
    ) -> bool;
}

/// A node on the bus: the server partner or our own internal function
pub trait ControlFunction: Send + Sync {
    /// Claimed address, `None` until address claim succeeds
    fn address(&self) -> Option<u8>;

    /// Whether the function currently holds a usable address
    fn is_address_valid(&self) -> bool {
        matches!(self.address(), Some(addr) if addr < NULL_ADDRESS)
    }
}
