//! Process-data frame layout.
//!
//! Every task controller message travels on the process-data PGN as a fixed
//! 8-byte frame:
//!
//! ```text
//! ┌──────────────────────────┬──────────────┬──────────────────────────┐
//! │ word0 (LE u16)           │ word1 (LE)   │ bytes 4..8               │
//! │ element << 4 | command   │ DDI          │ value (LE u32) or 0xFF   │
//! └──────────────────────────┴──────────────┴──────────────────────────┘
//! ```
//!
//! Commands 0x0 and 0x1 reuse byte 0 as a multiplexor for the negotiation
//! messages in [`super::message`]; everything else is a process-data command.

use serde::Serialize;

use super::CAN_DATA_LENGTH;
use crate::error::{Result, TcError};

/// Largest element number that fits in the 12-bit field
pub const MAX_ELEMENT_NUMBER: u16 = 0x0FFF;

/// Command nibble (low 4 bits of byte 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ProcessDataCommand {
    /// Technical capabilities (negotiation, mux in byte 0)
    TechnicalCapabilities = 0x0,
    /// Device descriptor (negotiation, mux in byte 0)
    DeviceDescriptor = 0x1,
    /// Request value
    RequestValue = 0x2,
    /// Value, or value command when sent by the server
    Value = 0x3,
    /// Measurement time interval
    MeasurementTimeInterval = 0x4,
    /// Measurement distance interval
    MeasurementDistanceInterval = 0x5,
    /// Measurement minimum within threshold
    MeasurementMinimumWithinThreshold = 0x6,
    /// Measurement maximum within threshold
    MeasurementMaximumWithinThreshold = 0x7,
    /// Measurement change threshold
    MeasurementChangeThreshold = 0x8,
    /// Peer control assignment
    PeerControlAssignment = 0x9,
    /// Set value and acknowledge
    SetValueAndAcknowledge = 0xA,
    /// Reserved
    Reserved1 = 0xB,
    /// Reserved
    Reserved2 = 0xC,
    /// Process data acknowledge (PDACK)
    Acknowledge = 0xD,
    /// Task controller status
    Status = 0xE,
    /// Client task
    ClientTask = 0xF,
}

impl ProcessDataCommand {
    /// Decode from the low nibble of `b`
    pub fn from_nibble(b: u8) -> Self {
        match b & 0x0F {
            0x0 => Self::TechnicalCapabilities,
            0x1 => Self::DeviceDescriptor,
            0x2 => Self::RequestValue,
            0x3 => Self::Value,
            0x4 => Self::MeasurementTimeInterval,
            0x5 => Self::MeasurementDistanceInterval,
            0x6 => Self::MeasurementMinimumWithinThreshold,
            0x7 => Self::MeasurementMaximumWithinThreshold,
            0x8 => Self::MeasurementChangeThreshold,
            0x9 => Self::PeerControlAssignment,
            0xA => Self::SetValueAndAcknowledge,
            0xB => Self::Reserved1,
            0xC => Self::Reserved2,
            0xD => Self::Acknowledge,
            0xE => Self::Status,
            _ => Self::ClientTask,
        }
    }

    /// Nibble value
    pub fn as_nibble(&self) -> u8 {
        *self as u8
    }

    /// Whether byte 0 is a negotiation multiplexor rather than element bits
    pub fn is_negotiation(&self) -> bool {
        matches!(self, Self::TechnicalCapabilities | Self::DeviceDescriptor)
    }

    /// Measurement trigger setup commands (0x4 to 0x8)
    pub fn is_measurement(&self) -> bool {
        matches!(
            self,
            Self::MeasurementTimeInterval
                | Self::MeasurementDistanceInterval
                | Self::MeasurementMinimumWithinThreshold
                | Self::MeasurementMaximumWithinThreshold
                | Self::MeasurementChangeThreshold
        )
    }
}

/// A decoded or to-be-encoded process-data frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProcessDataFrame {
    /// Command nibble
    pub command: ProcessDataCommand,
    /// Element number (12 bits)
    pub element: u16,
    /// Data dictionary identifier
    pub ddi: u16,
    /// Value, `u32::MAX` when the command carries none
    pub value: u32,
}

impl ProcessDataFrame {
    /// Build a frame, rejecting element numbers wider than 12 bits
    pub fn new(command: ProcessDataCommand, element: u16, ddi: u16, value: u32) -> Result<Self> {
        if element > MAX_ELEMENT_NUMBER {
            return Err(TcError::ElementOutOfRange(element));
        }
        Ok(Self {
            command,
            element,
            ddi,
            value,
        })
    }

    /// Value command (nibble 0x3)
    pub fn value_command(element: u16, ddi: u16, value: u32) -> Result<Self> {
        Self::new(ProcessDataCommand::Value, element, ddi, value)
    }

    /// Encode to the 8-byte wire layout
    pub fn encode(&self) -> [u8; CAN_DATA_LENGTH] {
        let word0 = ((self.element & MAX_ELEMENT_NUMBER) << 4) | u16::from(self.command.as_nibble());
        let mut buf = [0u8; CAN_DATA_LENGTH];
        buf[0..2].copy_from_slice(&word0.to_le_bytes());
        buf[2..4].copy_from_slice(&self.ddi.to_le_bytes());
        buf[4..8].copy_from_slice(&self.value.to_le_bytes());
        buf
    }

    /// Decode from exactly 8 data bytes
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() != CAN_DATA_LENGTH {
            return Err(TcError::InvalidLength {
                expected: CAN_DATA_LENGTH,
                actual: data.len(),
            });
        }
        let word0 = u16::from_le_bytes([data[0], data[1]]);
        Ok(Self {
            command: ProcessDataCommand::from_nibble(data[0]),
            element: word0 >> 4,
            ddi: u16::from_le_bytes([data[2], data[3]]),
            value: u32::from_le_bytes([data[4], data[5], data[6], data[7]]),
        })
    }
}

/// PDACK error code bits (byte 4)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AcknowledgeErrorCodes(u8);

impl AcknowledgeErrorCodes {
    /// No error
    pub const NONE: u8 = 0x00;
    /// Process data command not supported
    pub const COMMAND_NOT_SUPPORTED: u8 = 0x01;
    /// Invalid element number
    pub const INVALID_ELEMENT_NUMBER: u8 = 0x02;
    /// DDI not supported by element
    pub const DDI_NOT_SUPPORTED: u8 = 0x04;
    /// Trigger method not supported
    pub const TRIGGER_METHOD_NOT_SUPPORTED: u8 = 0x08;
    /// Process data not settable
    pub const NOT_SETTABLE: u8 = 0x10;
    /// Invalid or unsupported interval or threshold
    pub const INVALID_INTERVAL_OR_THRESHOLD: u8 = 0x20;
    /// Process data value does not conform to DDI definition
    pub const VALUE_NOT_CONFORMING: u8 = 0x40;
    /// Process data value outside operational range
    pub const VALUE_OUT_OF_RANGE: u8 = 0x80;

    /// Create from raw bits
    pub fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    /// Get raw bits
    pub fn bits(&self) -> u8 {
        self.0
    }

    /// Set an error bit
    pub fn set(&mut self, code: u8) {
        self.0 |= code;
    }

    /// Check an error bit
    pub fn has(&self, code: u8) -> bool {
        self.0 & code != 0
    }
}

/// Process data acknowledge sent in answer to a set-value-and-acknowledge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProcessDataAcknowledge {
    /// Element number being acknowledged
    pub element: u16,
    /// DDI being acknowledged
    pub ddi: u16,
    /// Error bits, zero on success
    pub error_codes: AcknowledgeErrorCodes,
    /// Command that triggered the acknowledge
    pub acknowledged: ProcessDataCommand,
}

impl ProcessDataAcknowledge {
    /// Successful acknowledge of a set-value-and-acknowledge
    pub fn new(element: u16, ddi: u16) -> Result<Self> {
        if element > MAX_ELEMENT_NUMBER {
            return Err(TcError::ElementOutOfRange(element));
        }
        Ok(Self {
            element,
            ddi,
            error_codes: AcknowledgeErrorCodes::default(),
            acknowledged: ProcessDataCommand::SetValueAndAcknowledge,
        })
    }

    /// Encode: word0, DDI, error codes, `0xF0 | command`, two 0xFF bytes
    pub fn encode(&self) -> [u8; CAN_DATA_LENGTH] {
        let word0 = ((self.element & MAX_ELEMENT_NUMBER) << 4)
            | u16::from(ProcessDataCommand::Acknowledge.as_nibble());
        let mut buf = [0xFFu8; CAN_DATA_LENGTH];
        buf[0..2].copy_from_slice(&word0.to_le_bytes());
        buf[2..4].copy_from_slice(&self.ddi.to_le_bytes());
        buf[4] = self.error_codes.bits();
        buf[5] = 0xF0 | self.acknowledged.as_nibble();
        buf
    }
}
