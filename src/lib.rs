//! # tc-client - ISO 11783-10 Task Controller Client
//!
//! Client side of the ISOBUS task controller protocol: an implement announces
//! itself to a task controller, negotiates versions, makes sure the server
//! holds its device descriptor object pool (DDOP), activates it and then
//! exchanges process data.
//!
//! ## Features
//!
//! - **Connection state machine**: 28 states, per-state timeouts, automatic
//!   reconnection after a server disappears
//! - **DDOP reconciliation**: structure and localization labels decide
//!   between reuse, delete and retransfer
//! - **Process data**: value requests and value commands dispatched to
//!   registered callbacks, with PDACK replies
//! - **Transport-agnostic**: the bus, bulk transfer and address claim are
//!   traits; an in-memory [`transport::VirtualCanBus`] is included
//!
//! ## Architecture
//!
//! ```text
//!            ┌──────────────────────────────────────────┐
//!  rx frames │            TaskControllerClient          │
//! ──────────►│  queue ─► update() ─► state machine      │
//!            │                  └──► process-data cbs   │
//!            └───────┬──────────────────┬───────────────┘
//!                    │ CanBus::send     │ BulkTransfer
//!                    ▼                  ▼
//!            ┌──────────────┐   ┌──────────────┐
//!            │  8-byte CAN  │   │   TP / ETP   │
//!            └──────────────┘   └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tc_client::{ClientCapabilities, SerializedObjectPool, TaskControllerClient};
//! use tc_client::transport::{VirtualCanBus, VirtualControlFunction};
//!
//! let bus = Arc::new(VirtualCanBus::new());
//! let client = TaskControllerClient::new(
//!     bus.clone(),
//!     bus.clone(),
//!     Arc::new(VirtualControlFunction::new(0xF7)),
//!     Arc::new(VirtualControlFunction::new(0x83)),
//! );
//! client.configure(
//!     Arc::new(SerializedObjectPool::new(*b"I++1.0 ", [1, 0, 0, 0, 0, 0, 0], ddop)),
//!     ClientCapabilities::new(1, 32, 16),
//! );
//! client.initialize(false);
//!
//! loop {
//!     client.update();
//! }
//! ```
//!
//! ## Modules
//!
//! - [`codec`]: Frame encoding and decoding
//! - [`protocol`]: State machine, labels, callbacks, capabilities
//! - [`transport`]: Bus collaborator traits and the virtual bus
//! - [`clock`]: Millisecond time source
//! - [`config`]: Configuration management
//! - [`error`]: Error types and result aliases

pub mod clock;
pub mod codec;
pub mod config;
pub mod error;
pub mod protocol;
pub mod transport;

// Re-exports for convenience
pub use clock::{Clock, ManualClock, SystemClock};
pub use codec::{ClientMessage, ProcessDataCommand, ProcessDataFrame, ServerMessage, ServerOption};
pub use config::Config;
pub use error::{Result, TcError};
pub use protocol::{
    ClientCapabilities, ObjectPool, SerializedObjectPool, StateMachineState, TaskControllerClient,
};
pub use transport::{BulkTransfer, CanBus, ControlFunction};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
