//! Engine connection configuration

use crate::error::{ComposeError, Result};
use bollard::ClientVersion;

/// Default Docker socket
pub const DEFAULT_DOCKER_HOST: &str = "unix:///var/run/docker.sock";

/// Docker Engine API version requests are pinned to
pub const DEFAULT_API_VERSION: &str = "v1.41";

/// Seconds to wait for an engine response
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Engine connection configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Engine address, in `DOCKER_HOST` syntax
    pub host: String,
    /// API version, e.g. `v1.41`
    pub api_version: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_DOCKER_HOST.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl EngineConfig {
    /// Read `DOCKER_HOST` and `DOCKER_API_VERSION`, falling back to defaults
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(host) = std::env::var("DOCKER_HOST") {
            if !host.trim().is_empty() {
                config.host = host;
            }
        }
        if let Ok(version) = std::env::var("DOCKER_API_VERSION") {
            if !version.trim().is_empty() {
                config.api_version = version;
            }
        }

        config
    }

    /// Override host
    pub fn host(mut self, host: &str) -> Self {
        self.host = host.to_string();
        self
    }

    /// Override API version
    pub fn api_version(mut self, version: &str) -> Self {
        self.api_version = version.to_string();
        self
    }

    /// Whether the host names a Unix socket
    pub fn is_unix_socket(&self) -> bool {
        self.host.trim().starts_with("unix://")
    }

    /// API version in the form the client pins requests to
    pub fn client_version(&self) -> Result<ClientVersion> {
        let version = self.api_version.trim().trim_start_matches('v');
        let invalid = || ComposeError::InvalidConfig(format!("Invalid API version '{}'", version));

        let (major, minor) = version.split_once('.').ok_or_else(invalid)?;
        Ok(ClientVersion {
            major_version: major.parse().map_err(|_| invalid())?,
            minor_version: minor.parse().map_err(|_| invalid())?,
        })
    }
}
