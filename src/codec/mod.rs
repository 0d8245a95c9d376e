//! Wire codec for task controller traffic.
//!
//! All messages between a task controller client and server are single
//! 8-byte CAN frames, except the object pool itself, which goes through the
//! bulk-transfer collaborator. This module only converts between bytes and
//! typed messages; it never touches session state.
//!
//! # Layout
//!
//! | Part            | Module                | Contents                          |
//! |-----------------|-----------------------|-----------------------------------|
//! | Process data    | [`process_data`]      | element / DDI / value frames, PDACK |
//! | Negotiation     | [`message`]           | mux-byte messages, NACK, builders |
//! | Version options | [`options`]           | option bitfield                   |
//! | Language        | [`language`]          | language command decoding         |
//!
//! # Usage
//!
//! ```rust,ignore
//! use tc_client::codec::{ClientMessage, ProcessDataFrame, ServerMessage};
//!
//! let frame = ProcessDataFrame::value_command(1234, 567, 8910)?;
//! let bytes = ClientMessage::ProcessData(frame).encode();
//!
//! match ServerMessage::decode(&received)? {
//!     ServerMessage::Status(status) => { /* liveness */ }
//!     ServerMessage::ProcessData(frame) => { /* dispatch */ }
//!     _ => {}
//! }
//! ```

pub mod language;
pub mod message;
pub mod options;
pub mod process_data;

pub use language::{DecimalSymbol, LanguageCommand, TimeFormat};
pub use message::{
    mux, object_pool_transfer_payload, pgn, request_pgn_payload, Acknowledgement,
    AcknowledgementType, ClientMessage, Label, ServerMessage, ServerStatus, Version, VersionInfo,
    CLIENT_VERSION, LABEL_LENGTH,
};
pub use options::{ServerOption, ServerOptions};
pub use process_data::{
    AcknowledgeErrorCodes, ProcessDataAcknowledge, ProcessDataCommand, ProcessDataFrame,
    MAX_ELEMENT_NUMBER,
};

/// Data length of every single-frame message
pub const CAN_DATA_LENGTH: usize = 8;

/// Global (broadcast) destination address
pub const GLOBAL_ADDRESS: u8 = 0xFF;

/// Null address, used by control functions that have not claimed one
pub const NULL_ADDRESS: u8 = 0xFE;
