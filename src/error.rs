//! Task controller client error types.
//!
//! Only fallible *library* operations surface a [`TcError`]: frame decoding,
//! frame construction with out-of-range arguments, and configuration loading.
//! Protocol-level failures (timeouts, NACKs, negative response codes) are not
//! errors from the caller's point of view; they are state transitions of the
//! client and are reported through `tracing`.
//!
//! Programmer errors (entering `ProcessDDOP` without a valid object pool)
//! panic instead of returning an error.

use thiserror::Error;

/// Task controller client errors.
#[derive(Error, Debug)]
pub enum TcError {
    /// A fixed-layout frame had the wrong number of data bytes.
    #[error("Invalid frame length: expected {expected} bytes, got {actual}")]
    InvalidLength {
        /// Required data length.
        expected: usize,
        /// Data length that was received.
        actual: usize,
    },

    /// Negotiation frame with a multiplexor byte this client does not handle.
    #[error("Unknown multiplexor: 0x{0:02X}")]
    UnknownMux(u8),

    /// Frame arrived on a PGN the decoder does not understand.
    #[error("Unexpected PGN: 0x{0:05X}")]
    UnexpectedPgn(u32),

    /// Element numbers are 12 bits wide.
    #[error("Element number {0} out of range (0-4095)")]
    ElementOutOfRange(u16),

    /// Hex input could not be parsed.
    #[error("Invalid hex: {0}")]
    InvalidHex(String),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for task controller client operations
pub type Result<T> = std::result::Result<T, TcError>;

impl From<toml::de::Error> for TcError {
    fn from(err: toml::de::Error) -> Self {
        TcError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for TcError {
    fn from(err: toml::ser::Error) -> Self {
        TcError::Config(err.to_string())
    }
}

impl From<hex::FromHexError> for TcError {
    fn from(err: hex::FromHexError) -> Self {
        TcError::InvalidHex(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = TcError::InvalidLength {
            expected: 8,
            actual: 3,
        };
        assert_eq!(
            err.to_string(),
            "Invalid frame length: expected 8 bytes, got 3"
        );
        assert_eq!(
            TcError::UnknownMux(0x40).to_string(),
            "Unknown multiplexor: 0x40"
        );
        assert_eq!(
            TcError::UnexpectedPgn(0xCB00).to_string(),
            "Unexpected PGN: 0x0CB00"
        );
    }

    #[test]
    fn test_toml_error_converts_to_config() {
        let err: TcError = toml::from_str::<toml::Value>("= broken")
            .unwrap_err()
            .into();
        assert!(matches!(err, TcError::Config(_)));
    }
}
