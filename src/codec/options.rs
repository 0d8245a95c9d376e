//! Option bits exchanged in the version message.
//!
//! Both directions of the version exchange carry the same one-byte
//! bitfield in byte 3:
//! - Bits 0-4: feature support (documentation, section control, ...)
//! - Bits 5-7: reserved, preserved on decode but never set by this client

use serde::{Deserialize, Serialize};

/// A single option bit of the version message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ServerOption {
    /// Documentation (task data logging)
    SupportsDocumentation = 0x01,
    /// TC-SC, implement section control
    SupportsImplementSectionControl = 0x02,
    /// Peer control assignment
    SupportsPeerControlAssignment = 0x04,
    /// TC-GEO with position based control
    SupportsTcgeoWithPositionBasedControl = 0x08,
    /// TC-GEO without position based control
    SupportsTcgeoWithoutPositionBasedControl = 0x10,
    /// Reserved bit 5
    ReservedOption1 = 0x20,
    /// Reserved bit 6
    ReservedOption2 = 0x40,
    /// Reserved bit 7
    ReservedOption3 = 0x80,
}

impl ServerOption {
    /// Bit mask of this option
    pub fn mask(self) -> u8 {
        self as u8
    }
}

/// Option bitfield of a version message (bits 0-7)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerOptions(u8);

impl ServerOptions {
    /// Create new empty options
    pub fn new() -> Self {
        Self(0)
    }

    /// Create from raw bits
    pub fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    /// Get raw bits
    pub fn bits(&self) -> u8 {
        self.0
    }

    /// Set an option
    pub fn set(&mut self, option: ServerOption) {
        self.0 |= option.mask();
    }

    /// Set or clear an option
    pub fn set_to(&mut self, option: ServerOption, enabled: bool) {
        if enabled {
            self.set(option);
        } else {
            self.clear(option);
        }
    }

    /// Builder form of [`ServerOptions::set_to`]
    pub fn with(mut self, option: ServerOption, enabled: bool) -> Self {
        self.set_to(option, enabled);
        self
    }

    /// Clear an option
    pub fn clear(&mut self, option: ServerOption) {
        self.0 &= !option.mask();
    }

    /// Check if option is set
    pub fn has(&self, option: ServerOption) -> bool {
        self.0 & option.mask() != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_bits() {
        let mut options = ServerOptions::new();
        assert!(!options.has(ServerOption::SupportsDocumentation));

        options.set(ServerOption::SupportsDocumentation);
        options.set(ServerOption::SupportsTcgeoWithoutPositionBasedControl);

        assert_eq!(options.bits(), 0x11);
        assert!(options.has(ServerOption::SupportsDocumentation));
        assert!(!options.has(ServerOption::SupportsPeerControlAssignment));

        options.clear(ServerOption::SupportsDocumentation);
        assert_eq!(options.bits(), 0x10);
    }

    #[test]
    fn test_reserved_bits_preserved() {
        let options = ServerOptions::from_bits(0xFF);
        assert!(options.has(ServerOption::ReservedOption1));
        assert!(options.has(ServerOption::ReservedOption2));
        assert!(options.has(ServerOption::ReservedOption3));
        assert_eq!(options.bits(), 0xFF);
    }

    #[test]
    fn test_builder() {
        let options = ServerOptions::new()
            .with(ServerOption::SupportsImplementSectionControl, true)
            .with(ServerOption::SupportsPeerControlAssignment, false);
        assert_eq!(options.bits(), 0x02);
    }
}
