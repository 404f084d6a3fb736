//! Docker Engine API binding
//!
//! Thin adapter from the [`Engine`] trait onto a `bollard` client. The
//! crate's own request types are translated into bollard's models here so
//! the orchestrator and the memory engine never depend on bollard.

use super::config::EngineConfig;
use super::{ContainerCreateRequest, ContainerSummary, Engine, NetworkSummary};
use crate::error::{ComposeError, Result};
use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, ListContainersOptions, RemoveContainerOptions,
    StartContainerOptions, StopContainerOptions,
};
use bollard::errors::Error as DockerError;
use bollard::models::{EndpointSettings, HostConfig, PortBinding, PortMap};
use bollard::network::{CreateNetworkOptions, ListNetworksOptions};
use bollard::Docker;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Docker Engine API client
#[derive(Clone)]
pub struct DockerEngine {
    docker: Docker,
}

impl DockerEngine {
    /// Connect to the configured engine
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let version = config.client_version()?;
        let host = config.host.trim();

        let docker = if config.is_unix_socket() {
            Docker::connect_with_unix(host, config.timeout_secs, &version)
        } else {
            Docker::connect_with_http(host, config.timeout_secs, &version)
        }
        .map_err(|e| engine_error("connect", e))?;

        debug!("Engine client for {} (API {})", host, config.api_version);
        Ok(Self { docker })
    }
}

#[async_trait]
impl Engine for DockerEngine {
    async fn list_networks(&self) -> Result<Vec<NetworkSummary>> {
        let networks = self
            .docker
            .list_networks(None::<ListNetworksOptions<String>>)
            .await
            .map_err(|e| engine_error("list networks", e))?;

        Ok(networks
            .into_iter()
            .map(|network| NetworkSummary {
                id: network.id.unwrap_or_default(),
                name: network.name.unwrap_or_default(),
                driver: network.driver.unwrap_or_default(),
            })
            .collect())
    }

    async fn create_network(&self, name: &str, driver: &str) -> Result<()> {
        let options = CreateNetworkOptions {
            name,
            driver,
            ..Default::default()
        };
        self.docker
            .create_network(options)
            .await
            .map_err(|e| engine_error("create network", e))?;
        Ok(())
    }

    async fn create_container(&self, request: &ContainerCreateRequest) -> Result<String> {
        let options = CreateContainerOptions {
            name: request.name.as_str(),
            ..Default::default()
        };
        let created = self
            .docker
            .create_container(Some(options), container_config(request))
            .await
            .map_err(|e| engine_error("create container", e))?;

        for warning in &created.warnings {
            warn!("Engine warning for {}: {}", request.name, warning);
        }
        Ok(created.id)
    }

    async fn start_container(&self, id: &str) -> Result<()> {
        let result = self
            .docker
            .start_container(id, None::<StartContainerOptions<String>>)
            .await;
        already_done(result).map_err(|e| engine_error("start container", e))
    }

    async fn list_containers(&self, all: bool) -> Result<Vec<ContainerSummary>> {
        let options = ListContainersOptions::<String> {
            all,
            ..Default::default()
        };
        let containers = self
            .docker
            .list_containers(Some(options))
            .await
            .map_err(|e| engine_error("list containers", e))?;

        Ok(containers
            .into_iter()
            .map(|container| ContainerSummary {
                id: container.id.unwrap_or_default(),
                names: container.names.unwrap_or_default(),
                labels: container.labels.unwrap_or_default().into_iter().collect(),
            })
            .collect())
    }

    async fn stop_container(&self, id: &str) -> Result<()> {
        let result = self
            .docker
            .stop_container(id, None::<StopContainerOptions>)
            .await;
        already_done(result).map_err(|e| engine_error("stop container", e))
    }

    async fn remove_container(&self, id: &str, force: bool) -> Result<()> {
        let options = RemoveContainerOptions {
            force,
            ..Default::default()
        };
        self.docker
            .remove_container(id, Some(options))
            .await
            .map_err(|e| engine_error("remove container", e))
    }
}

/// HTTP 304 on start/stop means the container is already in that state
fn already_done(
    result: std::result::Result<(), DockerError>,
) -> std::result::Result<(), DockerError> {
    match result {
        Err(DockerError::DockerResponseServerError {
            status_code: 304, ..
        }) => Ok(()),
        other => other,
    }
}

fn engine_error(operation: &'static str, err: DockerError) -> ComposeError {
    match err {
        DockerError::DockerResponseServerError {
            status_code,
            message,
        } => ComposeError::engine(operation, format!("{} (HTTP {})", message, status_code)),
        other => ComposeError::engine(operation, other.to_string()),
    }
}

/// Translate a create request into bollard's container config
fn container_config(request: &ContainerCreateRequest) -> Config<String> {
    let host = &request.host_config;

    let port_bindings: Option<PortMap> = host.port_bindings.as_ref().map(|bindings| {
        bindings
            .iter()
            .map(|(key, list)| {
                let list: Vec<PortBinding> = list
                    .iter()
                    .map(|binding| PortBinding {
                        host_ip: binding.host_ip.clone(),
                        host_port: binding.host_port.clone(),
                    })
                    .collect();
                (key.clone(), Some(list))
            })
            .collect()
    });

    let networking_config = request.networking_config.as_ref().map(|networking| {
        bollard::container::NetworkingConfig {
            endpoints_config: networking
                .endpoints_config
                .iter()
                .map(|(name, settings)| {
                    let endpoint = EndpointSettings {
                        aliases: (!settings.aliases.is_empty()).then(|| settings.aliases.clone()),
                        ..Default::default()
                    };
                    (name.clone(), endpoint)
                })
                .collect(),
        }
    });

    Config {
        image: Some(request.image.clone()),
        labels: (!request.labels.is_empty())
            .then(|| request.labels.clone().into_iter().collect::<HashMap<_, _>>()),
        env: (!request.env.is_empty()).then(|| request.env.clone()),
        cmd: request.cmd.clone(),
        entrypoint: request.entrypoint.clone(),
        working_dir: request.working_dir.clone(),
        exposed_ports: request.exposed_ports.as_ref().map(|ports| {
            ports
                .keys()
                .map(|key| (key.clone(), HashMap::new()))
                .collect()
        }),
        host_config: Some(HostConfig {
            binds: host.binds.clone(),
            network_mode: host.network_mode.clone(),
            port_bindings,
            ..Default::default()
        }),
        networking_config,
        ..Default::default()
    }
}
