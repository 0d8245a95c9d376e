//! Language command (PGN 0xFE0F) decoding.
//!
//! The server answers our request for the language command during
//! negotiation. Only the presence of the answer drives the state machine;
//! the decoded settings are kept for the application.

use serde::Serialize;

use super::CAN_DATA_LENGTH;
use crate::error::{Result, TcError};

/// Decimal symbol (byte 2, bits 7-6)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecimalSymbol {
    /// `,`
    Comma,
    /// `.`
    Point,
    /// Reserved or not available
    Unknown,
}

/// Time format (byte 2, bits 5-4)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeFormat {
    /// 24 hour clock
    TwentyFourHour,
    /// 12 hour clock
    TwelveHourAmPm,
    /// Reserved or not available
    Unknown,
}

/// Decoded language command
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LanguageCommand {
    /// Two-letter language code, e.g. `en`
    pub language_code: String,
    /// Decimal symbol
    pub decimal_symbol: DecimalSymbol,
    /// Time format
    pub time_format: TimeFormat,
    /// Raw date format byte
    pub date_format: u8,
    /// Raw unit system bytes (distance, area, volume, mass, temperature, pressure, force, generic)
    pub units: [u8; 2],
    /// Two-letter country code, empty when not available
    pub country_code: String,
}

impl LanguageCommand {
    /// Decode from 8 data bytes
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() != CAN_DATA_LENGTH {
            return Err(TcError::InvalidLength {
                expected: CAN_DATA_LENGTH,
                actual: data.len(),
            });
        }

        let decimal_symbol = match data[2] >> 6 {
            0 => DecimalSymbol::Comma,
            1 => DecimalSymbol::Point,
            _ => DecimalSymbol::Unknown,
        };
        let time_format = match (data[2] >> 4) & 0x03 {
            0 => TimeFormat::TwentyFourHour,
            1 => TimeFormat::TwelveHourAmPm,
            _ => TimeFormat::Unknown,
        };

        Ok(Self {
            language_code: ascii_code(&data[0..2]),
            decimal_symbol,
            time_format,
            date_format: data[3],
            units: [data[4], data[5]],
            country_code: ascii_code(&data[6..8]),
        })
    }
}

fn ascii_code(bytes: &[u8]) -> String {
    bytes
        .iter()
        .filter(|b| b.is_ascii_graphic())
        .map(|b| char::from(*b))
        .collect()
}
