//! Client and server capabilities.
//!
//! The client advertises its capabilities in the version response; the
//! server's capabilities arrive in its own version message and are kept as
//! [`ServerCapabilities`] for the rest of the session.

use serde::{Deserialize, Serialize};

use crate::codec::{ServerOption, ServerOptions, Version, VersionInfo};

/// What this implement supports, advertised in the version response
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientCapabilities {
    /// Booms available for section control
    pub booms: u8,
    /// Sections available for section control
    pub sections: u8,
    /// Channels for position based control
    pub channels: u8,
    /// Documentation
    pub supports_documentation: bool,
    /// TC-SC implement section control
    pub supports_implement_section_control: bool,
    /// Peer control assignment
    pub supports_peer_control_assignment: bool,
    /// TC-GEO with position based control
    pub supports_tcgeo_with_position_based_control: bool,
    /// TC-GEO without position based control
    pub supports_tcgeo_without_position_based_control: bool,
}

impl ClientCapabilities {
    /// Capabilities with the given counts and no optional features
    pub fn new(booms: u8, sections: u8, channels: u8) -> Self {
        Self {
            booms,
            sections,
            channels,
            ..Self::default()
        }
    }

    /// Enable documentation
    pub fn with_documentation(mut self, enabled: bool) -> Self {
        self.supports_documentation = enabled;
        self
    }

    /// Enable implement section control
    pub fn with_implement_section_control(mut self, enabled: bool) -> Self {
        self.supports_implement_section_control = enabled;
        self
    }

    /// Enable peer control assignment
    pub fn with_peer_control_assignment(mut self, enabled: bool) -> Self {
        self.supports_peer_control_assignment = enabled;
        self
    }

    /// Enable TC-GEO with position based control
    pub fn with_tcgeo_with_position_based_control(mut self, enabled: bool) -> Self {
        self.supports_tcgeo_with_position_based_control = enabled;
        self
    }

    /// Enable TC-GEO without position based control
    pub fn with_tcgeo_without_position_based_control(mut self, enabled: bool) -> Self {
        self.supports_tcgeo_without_position_based_control = enabled;
        self
    }

    /// Options byte of the version response
    pub fn options(&self) -> ServerOptions {
        ServerOptions::new()
            .with(ServerOption::SupportsDocumentation, self.supports_documentation)
            .with(
                ServerOption::SupportsImplementSectionControl,
                self.supports_implement_section_control,
            )
            .with(
                ServerOption::SupportsPeerControlAssignment,
                self.supports_peer_control_assignment,
            )
            .with(
                ServerOption::SupportsTcgeoWithPositionBasedControl,
                self.supports_tcgeo_with_position_based_control,
            )
            .with(
                ServerOption::SupportsTcgeoWithoutPositionBasedControl,
                self.supports_tcgeo_without_position_based_control,
            )
    }
}

/// What the connected server reported in its version message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ServerCapabilities {
    /// Server protocol version
    pub version: Version,
    /// Maximum boot time in seconds
    pub max_boot_time: u8,
    /// Supported options
    pub options: ServerOptions,
    /// Booms for section control
    pub booms: u8,
    /// Sections for section control
    pub sections: u8,
    /// Channels for position based control
    pub channels: u8,
}

impl Default for ServerCapabilities {
    fn default() -> Self {
        Self {
            version: Version::Unknown,
            max_boot_time: 0xFF,
            options: ServerOptions::new(),
            booms: 0,
            sections: 0,
            channels: 0,
        }
    }
}

impl ServerCapabilities {
    /// Check if the server supports an option
    pub fn supports(&self, option: ServerOption) -> bool {
        self.options.has(option)
    }
}

impl From<VersionInfo> for ServerCapabilities {
    fn from(info: VersionInfo) -> Self {
        Self {
            version: info.version,
            max_boot_time: info.max_boot_time,
            options: info.options,
            booms: info.booms,
            sections: info.sections,
            channels: info.channels,
        }
    }
}
