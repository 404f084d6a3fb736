//! Container engine capability
//!
//! The orchestrator only talks to an engine through the [`Engine`] trait.
//! Request and response types follow the Docker Engine API JSON layout, so
//! dry runs print what the engine would receive.

pub mod config;
pub mod docker;
pub mod memory;

pub use config::EngineConfig;
pub use docker::DockerEngine;
pub use memory::MemoryEngine;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Driver used for networks created on demand
pub const DEFAULT_NETWORK_DRIVER: &str = "bridge";

/// Operations the orchestrator needs from a container engine
#[async_trait]
pub trait Engine: Send + Sync {
    /// List networks
    async fn list_networks(&self) -> Result<Vec<NetworkSummary>>;

    /// Create a network
    async fn create_network(&self, name: &str, driver: &str) -> Result<()>;

    /// Create a container, returning its ID
    async fn create_container(&self, request: &ContainerCreateRequest) -> Result<String>;

    /// Start a created container
    async fn start_container(&self, id: &str) -> Result<()>;

    /// List containers; `all` includes stopped ones
    async fn list_containers(&self, all: bool) -> Result<Vec<ContainerSummary>>;

    /// Stop a container using the engine's default timeout
    async fn stop_container(&self, id: &str) -> Result<()>;

    /// Remove a container
    async fn remove_container(&self, id: &str, force: bool) -> Result<()>;
}

/// Network list item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NetworkSummary {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub driver: String,
}

/// Container list item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerSummary {
    pub id: String,
    /// Names with the engine's leading slash, e.g. `/web`
    #[serde(default)]
    pub names: Vec<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl ContainerSummary {
    /// Whether the container is named exactly `name`
    pub fn has_name(&self, name: &str) -> bool {
        let wanted = format!("/{}", name);
        self.names.iter().any(|n| *n == wanted)
    }
}

/// Container creation parameters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerCreateRequest {
    /// Container name; sent as a query parameter, not in the body
    #[serde(skip)]
    pub name: String,
    #[serde(default)]
    pub image: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cmd: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entrypoint: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exposed_ports: Option<BTreeMap<String, EmptyObject>>,
    #[serde(default)]
    pub host_config: HostConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub networking_config: Option<NetworkingConfig>,
}

/// Serializes as `{}`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmptyObject {}

/// Host-side container configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HostConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binds: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port_bindings: Option<BTreeMap<String, Vec<PortBinding>>>,
}

/// One host binding for an exposed port
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortBinding {
    #[serde(rename = "HostIp", default, skip_serializing_if = "Option::is_none")]
    pub host_ip: Option<String>,
    #[serde(rename = "HostPort", default, skip_serializing_if = "Option::is_none")]
    pub host_port: Option<String>,
}

/// Network attachments made at creation time
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NetworkingConfig {
    pub endpoints_config: BTreeMap<String, EndpointSettings>,
}

/// Per-network endpoint settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EndpointSettings {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
}
