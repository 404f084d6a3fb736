//! In-process engine
//!
//! Keeps containers and networks in memory and records every call made
//! against it. Used by `--dry-run` and by tests that need to observe what
//! the orchestrator asked the engine to do.

use super::{ContainerCreateRequest, ContainerSummary, Engine, NetworkSummary};
use crate::error::{ComposeError, Result};
use async_trait::async_trait;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

/// Container state inside the memory engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryStatus {
    /// Created but never started
    Created,
    /// Running
    Running,
    /// Stopped
    Exited,
}

/// A container held by the memory engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryContainer {
    pub id: String,
    pub request: ContainerCreateRequest,
    pub status: MemoryStatus,
}

/// One call received by the memory engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    ListNetworks,
    CreateNetwork { name: String, driver: String },
    CreateContainer { name: String },
    StartContainer { id: String },
    ListContainers { all: bool },
    StopContainer { id: String },
    RemoveContainer { id: String, force: bool },
}

#[derive(Debug, Default)]
struct State {
    containers: Vec<MemoryContainer>,
    networks: Vec<NetworkSummary>,
    calls: Vec<EngineCall>,
    failures: Vec<(&'static str, String)>,
    lenient_networks: bool,
}

impl State {
    /// Fail if a failure was injected for this operation and target
    fn check_failure(&self, operation: &'static str, target: &str) -> Result<()> {
        if self
            .failures
            .iter()
            .any(|(op, name)| *op == operation && name == target)
        {
            return Err(ComposeError::engine(
                operation,
                format!("injected failure for {}", target),
            ));
        }
        Ok(())
    }

    fn position(&self, operation: &'static str, id: &str) -> Result<usize> {
        self.containers
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| ComposeError::engine(operation, format!("No such container: {}", id)))
    }

    fn network_exists(&self, name: &str) -> bool {
        self.networks.iter().any(|n| n.name == name)
    }
}

/// Engine that lives entirely in memory
#[derive(Debug, Default)]
pub struct MemoryEngine {
    state: RwLock<State>,
}

impl MemoryEngine {
    /// Create an empty engine with the engine's built-in networks
    pub fn new() -> Self {
        let engine = Self::default();
        if let Ok(mut state) = engine.state.write() {
            for (name, driver) in [("bridge", "bridge"), ("host", "host"), ("none", "null")] {
                state.networks.push(NetworkSummary {
                    id: new_id(),
                    name: name.to_string(),
                    driver: driver.to_string(),
                });
            }
        }
        engine
    }

    /// Seed an existing network
    pub fn with_network(self, name: &str) -> Self {
        if let Ok(mut state) = self.state.write() {
            state.networks.push(NetworkSummary {
                id: new_id(),
                name: name.to_string(),
                driver: "bridge".to_string(),
            });
        }
        self
    }

    /// Seed an existing container
    pub fn with_container(self, name: &str, status: MemoryStatus) -> Self {
        if let Ok(mut state) = self.state.write() {
            state.containers.push(MemoryContainer {
                id: new_id(),
                request: ContainerCreateRequest {
                    name: name.to_string(),
                    ..Default::default()
                },
                status,
            });
        }
        self
    }

    /// Accept `network_mode` values naming networks this engine has never seen
    pub fn lenient_networks(self) -> Self {
        if let Ok(mut state) = self.state.write() {
            state.lenient_networks = true;
        }
        self
    }

    /// Make `operation` fail for the named container or network
    pub fn fail_on(self, operation: &'static str, target: &str) -> Self {
        if let Ok(mut state) = self.state.write() {
            state.failures.push((operation, target.to_string()));
        }
        self
    }

    /// Calls received so far
    pub fn calls(&self) -> Result<Vec<EngineCall>> {
        Ok(self.read()?.calls.clone())
    }

    /// Containers currently known
    pub fn containers(&self) -> Result<Vec<MemoryContainer>> {
        Ok(self.read()?.containers.clone())
    }

    /// Networks currently known
    pub fn networks(&self) -> Result<Vec<NetworkSummary>> {
        Ok(self.read()?.networks.clone())
    }

    /// Find a container by name
    pub fn find_by_name(&self, name: &str) -> Result<Option<MemoryContainer>> {
        Ok(self
            .read()?
            .containers
            .iter()
            .find(|c| c.request.name == name)
            .cloned())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| ComposeError::Lock("Failed to acquire read lock".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| ComposeError::Lock("Failed to acquire write lock".to_string()))
    }
}

#[async_trait]
impl Engine for MemoryEngine {
    async fn list_networks(&self) -> Result<Vec<NetworkSummary>> {
        let mut state = self.write()?;
        state.calls.push(EngineCall::ListNetworks);
        Ok(state.networks.clone())
    }

    async fn create_network(&self, name: &str, driver: &str) -> Result<()> {
        let mut state = self.write()?;
        state.calls.push(EngineCall::CreateNetwork {
            name: name.to_string(),
            driver: driver.to_string(),
        });
        state.check_failure("create network", name)?;

        if state.network_exists(name) {
            return Err(ComposeError::engine(
                "create network",
                format!("network with name {} already exists", name),
            ));
        }

        state.networks.push(NetworkSummary {
            id: new_id(),
            name: name.to_string(),
            driver: driver.to_string(),
        });
        Ok(())
    }

    async fn create_container(&self, request: &ContainerCreateRequest) -> Result<String> {
        let mut state = self.write()?;
        state.calls.push(EngineCall::CreateContainer {
            name: request.name.clone(),
        });
        state.check_failure("create container", &request.name)?;

        if request.image.trim().is_empty() {
            return Err(ComposeError::engine("create container", "No image specified"));
        }
        if state.containers.iter().any(|c| c.request.name == request.name) {
            return Err(ComposeError::engine(
                "create container",
                format!("Conflict. The container name \"/{}\" is already in use", request.name),
            ));
        }

        let mut attached: Vec<&str> = Vec::new();
        if let Some(mode) = request.host_config.network_mode.as_deref() {
            if !is_builtin_mode(mode) && !state.lenient_networks {
                attached.push(mode);
            }
        }
        if let Some(networking) = &request.networking_config {
            attached.extend(networking.endpoints_config.keys().map(String::as_str));
        }
        if let Some(missing) = attached.into_iter().find(|n| !state.network_exists(n)) {
            return Err(ComposeError::engine(
                "create container",
                format!("network {} not found", missing),
            ));
        }

        let id = new_id();
        state.containers.push(MemoryContainer {
            id: id.clone(),
            request: request.clone(),
            status: MemoryStatus::Created,
        });
        Ok(id)
    }

    async fn start_container(&self, id: &str) -> Result<()> {
        let mut state = self.write()?;
        state.calls.push(EngineCall::StartContainer { id: id.to_string() });

        let index = state.position("start container", id)?;
        let name = state.containers[index].request.name.clone();
        state.check_failure("start container", &name)?;

        state.containers[index].status = MemoryStatus::Running;
        Ok(())
    }

    async fn list_containers(&self, all: bool) -> Result<Vec<ContainerSummary>> {
        let mut state = self.write()?;
        state.calls.push(EngineCall::ListContainers { all });

        Ok(state
            .containers
            .iter()
            .filter(|c| all || c.status == MemoryStatus::Running)
            .map(|c| ContainerSummary {
                id: c.id.clone(),
                names: vec![format!("/{}", c.request.name)],
                labels: c.request.labels.clone(),
            })
            .collect())
    }

    async fn stop_container(&self, id: &str) -> Result<()> {
        let mut state = self.write()?;
        state.calls.push(EngineCall::StopContainer { id: id.to_string() });

        let index = state.position("stop container", id)?;
        let name = state.containers[index].request.name.clone();
        state.check_failure("stop container", &name)?;

        if state.containers[index].status == MemoryStatus::Running {
            state.containers[index].status = MemoryStatus::Exited;
        }
        Ok(())
    }

    async fn remove_container(&self, id: &str, force: bool) -> Result<()> {
        let mut state = self.write()?;
        state.calls.push(EngineCall::RemoveContainer {
            id: id.to_string(),
            force,
        });

        let index = state.position("remove container", id)?;
        let name = state.containers[index].request.name.clone();
        state.check_failure("remove container", &name)?;

        if state.containers[index].status == MemoryStatus::Running && !force {
            return Err(ComposeError::engine(
                "remove container",
                format!("You cannot remove a running container {}", id),
            ));
        }

        state.containers.remove(index);
        Ok(())
    }
}

/// Network modes that do not name a user network
fn is_builtin_mode(mode: &str) -> bool {
    let mode = mode.to_lowercase();
    matches!(mode.as_str(), "host" | "bridge" | "none" | "default") || mode.starts_with("container:")
}

fn new_id() -> String {
    Uuid::new_v4().simple().to_string()[..12].to_string()
}
