//! Device configuration.

use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::{ConfigError, DEACTIVATION_GRACE};

/// Address the device answers on until the controller assigns one.
pub const DEFAULT_ADDRESS: u32 = 0xFFFF_FFFE;

/// Default TCP port standing in for the wireless link.
pub const DEFAULT_PORT: u16 = 7890;

/// Device configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeviceConfig {
    /// Device address used as the source of every message.
    pub address: u32,

    /// Where session state is persisted.
    pub state_file: PathBuf,

    /// Ignore any stored state and pair from scratch.
    pub fresh: bool,

    /// Listen address of the stream transport.
    pub listen: SocketAddr,

    /// Pause between the last acknowledgment and the end of a deactivated session.
    #[serde(with = "millis", rename = "deactivation_grace_ms")]
    pub deactivation_grace: Duration,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS,
            state_file: PathBuf::from("pod-state.toml"),
            fresh: false,
            listen: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_PORT)),
            deactivation_grace: DEACTIVATION_GRACE,
        }
    }
}

impl DeviceConfig {
    /// Load from a TOML file. Missing keys take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Start building a configuration from the defaults.
    pub fn builder() -> DeviceConfigBuilder {
        DeviceConfigBuilder::new()
    }
}

/// Builder for [`DeviceConfig`].
#[derive(Debug, Default)]
pub struct DeviceConfigBuilder {
    config: DeviceConfig,
}

impl DeviceConfigBuilder {
    /// Start from the defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration.
    pub fn from_config(config: DeviceConfig) -> Self {
        Self { config }
    }

    /// Set the device address.
    pub fn address(mut self, address: u32) -> Self {
        self.config.address = address;
        self
    }

    /// Set the state file.
    pub fn state_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.state_file = path.into();
        self
    }

    /// Ignore stored state.
    pub fn fresh(mut self, fresh: bool) -> Self {
        self.config.fresh = fresh;
        self
    }

    /// Set the listen address.
    pub fn listen(mut self, addr: SocketAddr) -> Self {
        self.config.listen = addr;
        self
    }

    /// Set the deactivation grace delay.
    pub fn deactivation_grace(mut self, grace: Duration) -> Self {
        self.config.deactivation_grace = grace;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> DeviceConfig {
        self.config
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
