//! Negotiation and status messages.
//!
//! Inbound frames from the server decode into [`ServerMessage`]; outbound
//! frames are built from [`ClientMessage`]. Both use the fixed 8-byte
//! process-data layout, with the technical-capabilities (0x0) and
//! device-descriptor (0x1) commands multiplexed by the full byte 0:
//!
//! | Mux  | Direction | Message                                  |
//! |------|-----------|------------------------------------------|
//! | 0x00 | both      | Request version                          |
//! | 0x10 | both      | Version                                  |
//! | 0x01 | C → S     | Request structure label                  |
//! | 0x11 | S → C     | Structure label                          |
//! | 0x21 | C → S     | Request localization label               |
//! | 0x31 | S → C     | Localization label                       |
//! | 0x41 | C → S     | Request object-pool transfer             |
//! | 0x51 | S → C     | Request object-pool transfer response    |
//! | 0x61 | C → S     | Object-pool transfer (bulk)              |
//! | 0x71 | S → C     | Object-pool transfer response            |
//! | 0x81 | C → S     | Activate / deactivate object pool        |
//! | 0x91 | S → C     | Activate / deactivate response           |
//! | 0xA1 | C → S     | Delete object pool                       |
//! | 0xB1 | S → C     | Delete object pool response              |
//! | 0xFE | S → C     | Task controller status                   |
//! | 0xFF | C → S     | Client task                              |

use serde::Serialize;

use super::options::ServerOptions;
use super::process_data::{ProcessDataAcknowledge, ProcessDataCommand, ProcessDataFrame};
use super::{CAN_DATA_LENGTH, GLOBAL_ADDRESS};
use crate::error::{Result, TcError};

/// Parameter group numbers used by the client
pub mod pgn {
    /// Process data (all task controller traffic)
    pub const PROCESS_DATA: u32 = 0xCB00;
    /// Working set master announcement
    pub const WORKING_SET_MASTER: u32 = 0xFE0D;
    /// Language command
    pub const LANGUAGE_COMMAND: u32 = 0xFE0F;
    /// Request for a PGN
    pub const REQUEST: u32 = 0xEA00;
    /// Acknowledgement (ACK / NACK)
    pub const ACKNOWLEDGE: u32 = 0xE800;
}

/// Multiplexor bytes of negotiation messages
pub mod mux {
    /// Request version
    pub const REQUEST_VERSION: u8 = 0x00;
    /// Version
    pub const VERSION: u8 = 0x10;
    /// Request structure label
    pub const REQUEST_STRUCTURE_LABEL: u8 = 0x01;
    /// Structure label
    pub const STRUCTURE_LABEL: u8 = 0x11;
    /// Request localization label
    pub const REQUEST_LOCALIZATION_LABEL: u8 = 0x21;
    /// Localization label
    pub const LOCALIZATION_LABEL: u8 = 0x31;
    /// Request object-pool transfer
    pub const REQUEST_OBJECT_POOL_TRANSFER: u8 = 0x41;
    /// Request object-pool transfer response
    pub const REQUEST_OBJECT_POOL_TRANSFER_RESPONSE: u8 = 0x51;
    /// Object-pool transfer
    pub const OBJECT_POOL_TRANSFER: u8 = 0x61;
    /// Object-pool transfer response
    pub const OBJECT_POOL_TRANSFER_RESPONSE: u8 = 0x71;
    /// Activate / deactivate object pool
    pub const OBJECT_POOL_ACTIVATE_DEACTIVATE: u8 = 0x81;
    /// Activate / deactivate response
    pub const OBJECT_POOL_ACTIVATE_DEACTIVATE_RESPONSE: u8 = 0x91;
    /// Delete object pool
    pub const DELETE_OBJECT_POOL: u8 = 0xA1;
    /// Delete object pool response
    pub const DELETE_OBJECT_POOL_RESPONSE: u8 = 0xB1;
    /// Task controller status
    pub const SERVER_STATUS: u8 = 0xFE;
    /// Client task
    pub const CLIENT_TASK: u8 = 0xFF;
}

/// Length of structure and localization labels
pub const LABEL_LENGTH: usize = 7;

/// Structure or localization label
pub type Label = [u8; LABEL_LENGTH];

/// Version advertised by this client in its version response
pub const CLIENT_VERSION: Version = Version::SecondEditionDraft;

/// Task controller protocol version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Version {
    /// Draft international standard
    DraftInternationalStandard,
    /// Final draft international standard, first edition
    FinalDraftInternationalStandardFirstEdition,
    /// First published edition
    FirstPublishedEdition,
    /// Second edition draft
    SecondEditionDraft,
    /// Second published edition
    SecondPublishedEdition,
    /// Not yet negotiated or not recognised
    #[default]
    Unknown,
}

impl Version {
    /// Decode from the version byte
    pub fn from_byte(b: u8) -> Self {
        match b {
            0 => Version::DraftInternationalStandard,
            1 => Version::FinalDraftInternationalStandardFirstEdition,
            2 => Version::FirstPublishedEdition,
            3 => Version::SecondEditionDraft,
            4 => Version::SecondPublishedEdition,
            _ => Version::Unknown,
        }
    }

    /// Encode, `0xFF` for unknown
    pub fn as_byte(&self) -> u8 {
        match self {
            Version::DraftInternationalStandard => 0,
            Version::FinalDraftInternationalStandardFirstEdition => 1,
            Version::FirstPublishedEdition => 2,
            Version::SecondEditionDraft => 3,
            Version::SecondPublishedEdition => 4,
            Version::Unknown => 0xFF,
        }
    }
}

/// Contents of a version message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VersionInfo {
    /// Protocol version
    pub version: Version,
    /// Maximum boot time in seconds, `0xFF` if not available
    pub max_boot_time: u8,
    /// Supported options
    pub options: ServerOptions,
    /// Reserved options byte
    pub reserved_options: u8,
    /// Booms for section control
    pub booms: u8,
    /// Sections for section control
    pub sections: u8,
    /// Channels for position based control
    pub channels: u8,
}

impl VersionInfo {
    fn from_frame(data: &[u8]) -> Self {
        Self {
            version: Version::from_byte(data[1]),
            max_boot_time: data[2],
            options: ServerOptions::from_bits(data[3]),
            reserved_options: data[4],
            booms: data[5],
            sections: data[6],
            channels: data[7],
        }
    }
}

/// Task controller status broadcast
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ServerStatus {
    /// Raw status bits
    pub status: u8,
    /// Address of the client the current command is directed at
    pub command_address: u8,
    /// Command in progress
    pub command: u8,
}

impl ServerStatus {
    /// Bit 0: a task is active
    pub fn is_task_active(&self) -> bool {
        self.status & 0x01 != 0
    }
}

/// Frame received from the server on the process-data PGN
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Server requests our version
    RequestVersion,
    /// Server's version response
    Version(VersionInfo),
    /// Structure label held by the server
    StructureLabel {
        /// Label bytes, all `0xFF` when the server holds none
        label: Label,
    },
    /// Localization label held by the server
    LocalizationLabel {
        /// Label bytes, all `0xFF` when the server holds none
        label: Label,
    },
    /// Answer to a request to transfer the object pool
    RequestObjectPoolTransferResponse {
        /// 0 when the server has room for the pool
        code: u8,
    },
    /// Answer to the object pool transfer
    ObjectPoolTransferResponse {
        /// 0 when the pool was accepted
        code: u8,
        /// Pool size as seen by the server
        size: u32,
    },
    /// Answer to activate or deactivate
    ActivateDeactivateResponse {
        /// 0 on success
        code: u8,
        /// Parent object of a faulty object
        parent_object: u16,
        /// Faulty object
        faulty_object: u16,
        /// Object pool error codes
        pool_error: u8,
    },
    /// Answer to delete object pool
    DeleteObjectPoolResponse {
        /// 0 on success
        code: u8,
        /// Error details
        details: u8,
    },
    /// Status broadcast
    Status(ServerStatus),
    /// Process-data command
    ProcessData(ProcessDataFrame),
}

impl ServerMessage {
    /// Decode a process-data PGN frame
    pub fn decode(data: &[u8]) -> Result<Self> {
        let frame = ProcessDataFrame::decode(data)?;

        match frame.command {
            command if command.is_negotiation() => Self::decode_negotiation(data),
            ProcessDataCommand::Status => Ok(ServerMessage::Status(ServerStatus {
                status: data[4],
                command_address: data[5],
                command: data[6],
            })),
            _ => Ok(ServerMessage::ProcessData(frame)),
        }
    }

    fn decode_negotiation(data: &[u8]) -> Result<Self> {
        let label = || {
            let mut label = [0u8; LABEL_LENGTH];
            label.copy_from_slice(&data[1..8]);
            label
        };

        let msg = match data[0] {
            mux::REQUEST_VERSION => ServerMessage::RequestVersion,
            mux::VERSION => ServerMessage::Version(VersionInfo::from_frame(data)),
            mux::STRUCTURE_LABEL => ServerMessage::StructureLabel { label: label() },
            mux::LOCALIZATION_LABEL => ServerMessage::LocalizationLabel { label: label() },
            mux::REQUEST_OBJECT_POOL_TRANSFER_RESPONSE => {
                ServerMessage::RequestObjectPoolTransferResponse { code: data[1] }
            }
            mux::OBJECT_POOL_TRANSFER_RESPONSE => ServerMessage::ObjectPoolTransferResponse {
                code: data[1],
                size: u32::from_le_bytes([data[2], data[3], data[4], data[5]]),
            },
            mux::OBJECT_POOL_ACTIVATE_DEACTIVATE_RESPONSE => {
                ServerMessage::ActivateDeactivateResponse {
                    code: data[1],
                    parent_object: u16::from_le_bytes([data[2], data[3]]),
                    faulty_object: u16::from_le_bytes([data[4], data[5]]),
                    pool_error: data[6],
                }
            }
            mux::DELETE_OBJECT_POOL_RESPONSE => ServerMessage::DeleteObjectPoolResponse {
                code: data[1],
                details: data[2],
            },
            other => return Err(TcError::UnknownMux(other)),
        };
        Ok(msg)
    }
}

/// Acknowledgement control byte values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum AcknowledgementType {
    /// Positive acknowledgement
    Positive = 0,
    /// Negative acknowledgement
    Negative = 1,
    /// Access denied
    AccessDenied = 2,
    /// Cannot respond
    CannotRespond = 3,
    /// Anything else
    Unknown = 0xFF,
}

impl AcknowledgementType {
    /// Decode the control byte
    pub fn from_byte(b: u8) -> Self {
        match b {
            0 => Self::Positive,
            1 => Self::Negative,
            2 => Self::AccessDenied,
            3 => Self::CannotRespond,
            _ => Self::Unknown,
        }
    }
}

/// Acknowledgement PGN payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Acknowledgement {
    /// ACK / NACK
    pub kind: AcknowledgementType,
    /// Group function value
    pub group_function: u8,
    /// Address the acknowledgement is about
    pub address: u8,
    /// PGN being acknowledged
    pub pgn: u32,
}

impl Acknowledgement {
    /// Decode an acknowledgement frame
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() != CAN_DATA_LENGTH {
            return Err(TcError::InvalidLength {
                expected: CAN_DATA_LENGTH,
                actual: data.len(),
            });
        }
        Ok(Self {
            kind: AcknowledgementType::from_byte(data[0]),
            group_function: data[1],
            address: data[4],
            pgn: u32::from_le_bytes([data[5], data[6], data[7], 0]),
        })
    }

    /// Negative acknowledgement of `pgn` directed at `address`
    pub fn is_nack_for(&self, pgn: u32, address: u8) -> bool {
        self.kind == AcknowledgementType::Negative && self.pgn == pgn && self.address == address
    }
}

/// Frame sent by the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// Working set master announcement
    WorkingSetMaster {
        /// Members of the working set, this client always reports 1
        members: u8,
    },
    /// Client task status
    Status {
        /// Task status bits
        status: u8,
    },
    /// Request the server's version
    RequestVersion,
    /// Our version, in answer to the server's request
    Version {
        /// Advertised version
        version: Version,
        /// Supported options
        options: ServerOptions,
        /// Booms
        booms: u8,
        /// Sections
        sections: u8,
        /// Position based control channels
        channels: u8,
    },
    /// Request the structure label of the server's copy of our pool
    RequestStructureLabel,
    /// Request the localization label of the server's copy of our pool
    RequestLocalizationLabel,
    /// Ask the server to delete its copy of our pool
    DeleteObjectPool,
    /// Ask for room to transfer a pool of `pool_size` bytes
    RequestObjectPoolTransfer {
        /// Size of the serialized pool
        pool_size: u32,
    },
    /// Activate the transferred pool
    ActivateObjectPool,
    /// Deactivate the pool
    DeactivateObjectPool,
    /// Value command or value reply
    ProcessData(ProcessDataFrame),
    /// Process data acknowledge
    Acknowledge(ProcessDataAcknowledge),
}

impl ClientMessage {
    /// PGN the message is sent on
    pub fn pgn(&self) -> u32 {
        match self {
            ClientMessage::WorkingSetMaster { .. } => pgn::WORKING_SET_MASTER,
            _ => pgn::PROCESS_DATA,
        }
    }

    /// Whether the message goes to the global address
    pub fn is_broadcast(&self) -> bool {
        matches!(
            self,
            ClientMessage::WorkingSetMaster { .. } | ClientMessage::Status { .. }
        )
    }

    /// Destination address given the server's address, if it has one
    pub fn destination(&self, server: Option<u8>) -> Option<u8> {
        if self.is_broadcast() {
            Some(GLOBAL_ADDRESS)
        } else {
            server
        }
    }

    /// Encode to 8 data bytes
    pub fn encode(&self) -> [u8; CAN_DATA_LENGTH] {
        let mut buf = [0xFFu8; CAN_DATA_LENGTH];
        match self {
            ClientMessage::WorkingSetMaster { members } => {
                buf[0] = *members;
            }
            ClientMessage::Status { status } => {
                buf[0] = mux::CLIENT_TASK;
                buf[4] = *status;
                buf[5..8].fill(0x00);
            }
            ClientMessage::RequestVersion => {
                buf[0] = mux::REQUEST_VERSION;
            }
            ClientMessage::Version {
                version,
                options,
                booms,
                sections,
                channels,
            } => {
                buf = [
                    mux::VERSION,
                    version.as_byte(),
                    0xFF,
                    options.bits(),
                    0x00,
                    *booms,
                    *sections,
                    *channels,
                ];
            }
            ClientMessage::RequestStructureLabel => {
                buf[0] = mux::REQUEST_STRUCTURE_LABEL;
            }
            ClientMessage::RequestLocalizationLabel => {
                buf[0] = mux::REQUEST_LOCALIZATION_LABEL;
            }
            ClientMessage::DeleteObjectPool => {
                buf[0] = mux::DELETE_OBJECT_POOL;
            }
            ClientMessage::RequestObjectPoolTransfer { pool_size } => {
                buf[0] = mux::REQUEST_OBJECT_POOL_TRANSFER;
                buf[1..5].copy_from_slice(&pool_size.to_le_bytes());
            }
            ClientMessage::ActivateObjectPool => {
                buf[0] = mux::OBJECT_POOL_ACTIVATE_DEACTIVATE;
                buf[1] = 0xFF;
            }
            ClientMessage::DeactivateObjectPool => {
                buf[0] = mux::OBJECT_POOL_ACTIVATE_DEACTIVATE;
                buf[1] = 0x00;
            }
            ClientMessage::ProcessData(frame) => {
                buf = frame.encode();
            }
            ClientMessage::Acknowledge(ack) => {
                buf = ack.encode();
            }
        }
        buf
    }
}

/// Bulk payload for the object-pool transfer: mux byte then the pool
pub fn object_pool_transfer_payload(pool: &[u8]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(pool.len() + 1);
    payload.push(mux::OBJECT_POOL_TRANSFER);
    payload.extend_from_slice(pool);
    payload
}

/// Payload of a request for `requested` on the request PGN
pub fn request_pgn_payload(requested: u32) -> [u8; 3] {
    let bytes = requested.to_le_bytes();
    [bytes[0], bytes[1], bytes[2]]
}
