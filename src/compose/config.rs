//! Normalized compose service model

use crate::error::{ComposeError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One service from a compose file, with every field already normalized
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDefinition {
    /// Service key in the `services` mapping
    pub name: String,
    /// Image reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Container name override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_name: Option<String>,
    /// Working directory override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
    /// Bind mounts in `host:container[:mode]` form
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<String>,
    /// Command tokens
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,
    /// Entrypoint tokens
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entrypoint: Vec<String>,
    /// Environment variables
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environment: BTreeMap<String, String>,
    /// Networks to attach to
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub networks: Vec<String>,
    /// Explicit network mode; takes precedence over `networks`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_mode: Option<String>,
    /// Port rules
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<PortMapping>,
    /// Set when the service looks like it runs a managed runtime
    #[serde(default)]
    pub runtime_hint: bool,
}

impl ServiceDefinition {
    /// Create an empty service definition
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    /// Set image reference
    pub fn image(mut self, image: &str) -> Self {
        self.image = Some(image.to_string());
        self
    }

    /// Add port mapping
    pub fn port(mut self, port: PortMapping) -> Self {
        self.ports.push(port);
        self
    }

    /// Add network
    pub fn network(mut self, network: &str) -> Self {
        self.networks.push(network.to_string());
        self
    }

    /// Add environment variable
    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.environment.insert(key.to_string(), value.to_string());
        self
    }

    /// Name the container will be created under
    pub fn resolved_container_name(&self) -> &str {
        match self.container_name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => &self.name,
        }
    }

    /// Explicit network mode, ignoring blank values
    pub fn explicit_network_mode(&self) -> Option<&str> {
        self.network_mode
            .as_deref()
            .filter(|mode| !mode.trim().is_empty())
    }
}

/// Port mapping
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMapping {
    /// Host interface to bind
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_ip: Option<String>,
    /// Host port; absent lets the engine allocate one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_port: Option<String>,
    /// Container port; mappings without one are not applied
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_port: Option<String>,
    /// Transport protocol
    #[serde(default)]
    pub protocol: Protocol,
}

impl PortMapping {
    /// Create a mapping for a container port
    pub fn new(container_port: &str) -> Self {
        Self {
            container_port: Some(container_port.to_string()),
            ..Self::default()
        }
    }

    /// Set host port
    pub fn host_port(mut self, port: &str) -> Self {
        self.host_port = Some(port.to_string());
        self
    }

    /// Set host IP
    pub fn host_ip(mut self, ip: &str) -> Self {
        self.host_ip = Some(ip.to_string());
        self
    }

    /// Set protocol
    pub fn protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    /// Key used in the engine's exposed-port table, e.g. `80/tcp`
    pub fn exposed_key(&self) -> Option<String> {
        self.container_port
            .as_deref()
            .map(|port| format!("{}/{}", port, self.protocol))
    }

    /// Whether the mapping pins a host port or interface
    pub fn has_binding(&self) -> bool {
        self.host_port.is_some() || self.host_ip.is_some()
    }
}

/// Network protocol
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
    Sctp,
}

impl Protocol {
    /// Parse a protocol token; blank means tcp
    pub fn parse(token: &str) -> Result<Self> {
        let token = token.trim();
        if token.is_empty() {
            return Ok(Protocol::Tcp);
        }

        match token.to_ascii_lowercase().as_str() {
            "tcp" => Ok(Protocol::Tcp),
            "udp" => Ok(Protocol::Udp),
            "sctp" => Ok(Protocol::Sctp),
            _ => Err(ComposeError::InvalidPortSyntax {
                spec: token.to_string(),
                reason: "unknown protocol".to_string(),
            }),
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "tcp"),
            Protocol::Udp => write!(f, "udp"),
            Protocol::Sctp => write!(f, "sctp"),
        }
    }
}
