//! Configuration management.
//!
//! Supports configuration from:
//! - TOML config files
//! - Environment variables (`TC_CLIENT_*`)
//! - CLI arguments (for the `tc-client` binary)
//!
//! ```toml
//! [client]
//! booms = 1
//! sections = 32
//! channels = 16
//! supports_documentation = true
//!
//! [timing]
//! startup_delay_ms = 6000
//! state_timeout_ms = 6000
//! status_interval_ms = 2000
//! server_status_timeout_ms = 6000
//! worker_interval_ms = 50
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TcError};
use crate::protocol::ClientCapabilities;

/// Main configuration struct
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Capabilities advertised to the server
    #[serde(default)]
    pub client: ClientConfig,

    /// State machine timing
    #[serde(default)]
    pub timing: TimingConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| TcError::Config(format!("Failed to read config file: {e}")))?;

        toml::from_str(&content)
            .map_err(|e| TcError::Config(format!("Failed to parse config: {e}")))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Explicit file, else the default file if present, else defaults;
    /// environment variables override either
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let base = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path() {
                Some(default) if default.exists() => Self::from_file(default)?,
                _ => Self::default(),
            },
        };
        Ok(base.with_env_overrides())
    }

    /// `<config dir>/tc-client/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("tc-client").join("config.toml"))
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    fn with_env_overrides(mut self) -> Self {
        // Capabilities
        env_parse("TC_CLIENT_BOOMS", &mut self.client.booms);
        env_parse("TC_CLIENT_SECTIONS", &mut self.client.sections);
        env_parse("TC_CLIENT_CHANNELS", &mut self.client.channels);
        env_parse(
            "TC_CLIENT_SUPPORTS_DOCUMENTATION",
            &mut self.client.supports_documentation,
        );
        env_parse(
            "TC_CLIENT_SUPPORTS_IMPLEMENT_SECTION_CONTROL",
            &mut self.client.supports_implement_section_control,
        );
        env_parse(
            "TC_CLIENT_SUPPORTS_PEER_CONTROL_ASSIGNMENT",
            &mut self.client.supports_peer_control_assignment,
        );
        env_parse(
            "TC_CLIENT_SUPPORTS_TCGEO_WITH_POSITION_BASED_CONTROL",
            &mut self.client.supports_tcgeo_with_position_based_control,
        );
        env_parse(
            "TC_CLIENT_SUPPORTS_TCGEO_WITHOUT_POSITION_BASED_CONTROL",
            &mut self.client.supports_tcgeo_without_position_based_control,
        );

        // Timing
        env_parse("TC_CLIENT_STARTUP_DELAY_MS", &mut self.timing.startup_delay_ms);
        env_parse("TC_CLIENT_STATE_TIMEOUT_MS", &mut self.timing.state_timeout_ms);
        env_parse(
            "TC_CLIENT_STATUS_INTERVAL_MS",
            &mut self.timing.status_interval_ms,
        );
        env_parse(
            "TC_CLIENT_SERVER_STATUS_TIMEOUT_MS",
            &mut self.timing.server_status_timeout_ms,
        );
        env_parse(
            "TC_CLIENT_WORKER_INTERVAL_MS",
            &mut self.timing.worker_interval_ms,
        );

        self
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, target: &mut T) {
    if let Ok(val) = std::env::var(key) {
        if let Ok(val) = val.parse() {
            *target = val;
        }
    }
}

/// Capabilities section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Booms for section control
    pub booms: u8,

    /// Sections for section control
    pub sections: u8,

    /// Channels for position based control
    pub channels: u8,

    /// Documentation
    pub supports_documentation: bool,

    /// Implement section control
    pub supports_implement_section_control: bool,

    /// Peer control assignment
    pub supports_peer_control_assignment: bool,

    /// TC-GEO with position based control
    pub supports_tcgeo_with_position_based_control: bool,

    /// TC-GEO without position based control
    pub supports_tcgeo_without_position_based_control: bool,
}

impl From<&ClientConfig> for ClientCapabilities {
    fn from(config: &ClientConfig) -> Self {
        ClientCapabilities::new(config.booms, config.sections, config.channels)
            .with_documentation(config.supports_documentation)
            .with_implement_section_control(config.supports_implement_section_control)
            .with_peer_control_assignment(config.supports_peer_control_assignment)
            .with_tcgeo_with_position_based_control(
                config.supports_tcgeo_with_position_based_control,
            )
            .with_tcgeo_without_position_based_control(
                config.supports_tcgeo_without_position_based_control,
            )
    }
}

impl ClientConfig {
    /// Capabilities described by this section
    pub fn capabilities(&self) -> ClientCapabilities {
        ClientCapabilities::from(self)
    }
}

/// Timing section, all values in milliseconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Delay after initialization before looking for a server
    pub startup_delay_ms: u64,

    /// Timeout of every non-hold negotiation state
    pub state_timeout_ms: u64,

    /// Client task message period while connected
    pub status_interval_ms: u64,

    /// Disconnect when no server status arrives for this long
    pub server_status_timeout_ms: u64,

    /// Tick period of the worker thread
    pub worker_interval_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            startup_delay_ms: 6000,
            state_timeout_ms: 6000,
            status_interval_ms: 2000,
            server_status_timeout_ms: 6000,
            worker_interval_ms: 50,
        }
    }
}

impl TimingConfig {
    /// Worker tick period
    pub fn worker_interval(&self) -> Duration {
        Duration::from_millis(self.worker_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.timing.state_timeout_ms, 6000);
        assert_eq!(config.timing.status_interval_ms, 2000);
        assert_eq!(config.timing.worker_interval(), Duration::from_millis(50));
        assert_eq!(config.client.capabilities(), ClientCapabilities::default());
    }

    #[test]
    fn test_config_from_toml() {
        let toml = r#"
            [client]
            booms = 1
            sections = 32
            channels = 16
            supports_documentation = true

            [timing]
            state_timeout_ms = 3000
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        let caps = config.client.capabilities();
        assert_eq!((caps.booms, caps.sections, caps.channels), (1, 32, 16));
        assert!(caps.supports_documentation);
        assert!(!caps.supports_peer_control_assignment);
        assert_eq!(config.timing.state_timeout_ms, 3000);
        assert_eq!(config.timing.startup_delay_ms, 6000);
    }

    #[test]
    fn test_from_file_roundtrip() {
        let mut config = Config::default();
        config.client.sections = 64;
        config.timing.worker_interval_ms = 10;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(config.to_toml().unwrap().as_bytes()).unwrap();

        let loaded = Config::from_file(file.path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_from_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        assert!(matches!(
            Config::from_file(&missing),
            Err(TcError::Config(_))
        ));

        let bad = dir.path().join("bad.toml");
        std::fs::write(&bad, "[client]\nbooms = \"many\"\n").unwrap();
        assert!(matches!(Config::from_file(&bad), Err(TcError::Config(_))));
    }

    #[test]
    fn test_env_overrides() {
        std::env::set_var("TC_CLIENT_WORKER_INTERVAL_MS", "25");
        std::env::set_var("TC_CLIENT_SUPPORTS_PEER_CONTROL_ASSIGNMENT", "true");
        let config = Config::from_env();
        std::env::remove_var("TC_CLIENT_WORKER_INTERVAL_MS");
        std::env::remove_var("TC_CLIENT_SUPPORTS_PEER_CONTROL_ASSIGNMENT");

        assert_eq!(config.timing.worker_interval_ms, 25);
        assert!(config.client.supports_peer_control_assignment);
    }
}
