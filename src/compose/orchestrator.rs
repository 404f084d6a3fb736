//! Docker Compose orchestrator
//!
//! Turns parsed service definitions into engine calls. `up` creates and
//! starts one container per service in document order; `down` stops and
//! force-removes every container named after a service. Both stop at the
//! first engine error and leave whatever was already done in place.

use super::config::ServiceDefinition;
use super::runtime::RuntimeRules;
use crate::engine::{
    ContainerCreateRequest, EmptyObject, EndpointSettings, Engine, HostConfig, NetworkingConfig,
    PortBinding, DEFAULT_NETWORK_DRIVER,
};
use crate::error::Result;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Label carrying the project name
pub const PROJECT_LABEL: &str = "com.docker.compose.project";

/// Label carrying the service name
pub const SERVICE_LABEL: &str = "com.docker.compose.service";

/// What `up` will ask the engine for one service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServicePlan {
    /// Service name
    pub service: String,
    /// Networks that must exist before the container is created
    pub networks: Vec<String>,
    /// Container creation parameters
    pub request: ContainerCreateRequest,
}

/// Compose orchestrator
pub struct ComposeOrchestrator {
    /// Engine handle
    engine: Arc<dyn Engine>,
    /// Runtime rules used for default entrypoints
    rules: RuntimeRules,
}

impl ComposeOrchestrator {
    /// Create a new orchestrator
    pub fn new(engine: Arc<dyn Engine>) -> Self {
        Self {
            engine,
            rules: RuntimeRules::default(),
        }
    }

    /// Use a custom runtime rule table
    pub fn with_rules(mut self, rules: RuntimeRules) -> Self {
        self.rules = rules;
        self
    }

    /// Create and start a container for every service, in order
    pub async fn up(&self, services: &[ServiceDefinition], project: &str) -> Result<()> {
        tracing::info!("Starting compose project: {}", project);

        for service in services {
            let plan = self.plan(service, project);
            self.ensure_networks(&plan.networks).await?;

            tracing::info!(
                "Creating container {} for service {}",
                plan.request.name,
                plan.service
            );
            let id = self.engine.create_container(&plan.request).await?;
            self.engine.start_container(&id).await?;
            tracing::info!("Started container {} ({})", plan.request.name, id);
        }

        Ok(())
    }

    /// Stop and remove every container named after one of the services
    pub async fn down(&self, services: &[ServiceDefinition]) -> Result<()> {
        let containers = self.engine.list_containers(true).await?;

        for service in services {
            for container in containers.iter().filter(|c| c.has_name(&service.name)) {
                tracing::info!(
                    "Removing container {} for service {}",
                    container.id,
                    service.name
                );
                self.engine.stop_container(&container.id).await?;
                self.engine.remove_container(&container.id, true).await?;
            }
        }

        Ok(())
    }

    /// Translate one service into engine parameters
    pub fn plan(&self, service: &ServiceDefinition, project: &str) -> ServicePlan {
        let mut host_config = HostConfig {
            binds: (!service.volumes.is_empty()).then(|| service.volumes.clone()),
            ..Default::default()
        };

        let explicit_mode = service.explicit_network_mode();
        let mut networks = Vec::new();
        let mut networking_config = None;

        if let Some(mode) = explicit_mode {
            host_config.network_mode = Some(mode.to_string());
        } else if let [network] = service.networks.as_slice() {
            host_config.network_mode = Some(network.clone());
            networks.push(network.clone());
        } else if !service.networks.is_empty() {
            networking_config = Some(NetworkingConfig {
                endpoints_config: service
                    .networks
                    .iter()
                    .map(|n| (n.clone(), EndpointSettings::default()))
                    .collect(),
            });
            networks.extend(service.networks.iter().cloned());
        }

        let (entrypoint, cmd) = match self.rules.default_invocation(service) {
            Some((entrypoint, cmd)) => {
                tracing::debug!(
                    "Using default entrypoint {:?} and command {:?} for {}",
                    entrypoint,
                    cmd,
                    service.name
                );
                (Some(entrypoint), Some(cmd))
            }
            None => (non_empty(&service.entrypoint), non_empty(&service.command)),
        };

        let mut exposed_ports = BTreeMap::new();
        let mut port_bindings: BTreeMap<String, Vec<PortBinding>> = BTreeMap::new();

        if skips_ports(host_config.network_mode.as_deref()) {
            if !service.ports.is_empty() {
                tracing::warn!(
                    "Ignoring ports of {}: network mode {} does not publish ports",
                    service.name,
                    host_config.network_mode.as_deref().unwrap_or_default()
                );
            }
        } else {
            for port in &service.ports {
                let Some(key) = port.exposed_key() else {
                    continue;
                };
                exposed_ports.insert(key.clone(), EmptyObject {});

                if port.has_binding() {
                    port_bindings.entry(key).or_default().push(PortBinding {
                        host_ip: port.host_ip.clone(),
                        host_port: port.host_port.clone(),
                    });
                }
            }
        }

        host_config.port_bindings = (!port_bindings.is_empty()).then_some(port_bindings);

        let labels = BTreeMap::from([
            (PROJECT_LABEL.to_string(), project.to_string()),
            (SERVICE_LABEL.to_string(), service.name.clone()),
        ]);

        let request = ContainerCreateRequest {
            name: service.resolved_container_name().to_string(),
            image: service.image.clone().unwrap_or_default(),
            labels,
            env: service
                .environment
                .iter()
                .map(|(key, value)| format!("{}={}", key, value))
                .collect(),
            cmd,
            entrypoint,
            working_dir: service
                .working_dir
                .clone()
                .filter(|dir| !dir.trim().is_empty()),
            exposed_ports: (!exposed_ports.is_empty()).then_some(exposed_ports),
            host_config,
            networking_config,
        };

        ServicePlan {
            service: service.name.clone(),
            networks,
            request,
        }
    }

    /// Create any of the networks the engine does not know yet
    async fn ensure_networks(&self, networks: &[String]) -> Result<()> {
        if networks.is_empty() {
            return Ok(());
        }

        let existing = self.engine.list_networks().await?;
        for network in networks {
            if existing.iter().any(|n| n.name == *network) {
                tracing::debug!("Network {} already exists", network);
                continue;
            }

            self.engine
                .create_network(network, DEFAULT_NETWORK_DRIVER)
                .await?;
            tracing::info!("Network {} created", network);
        }

        Ok(())
    }
}

/// Network modes in which the engine does not publish ports
fn skips_ports(mode: Option<&str>) -> bool {
    let Some(mode) = mode else {
        return false;
    };
    let mode = mode.to_lowercase();
    mode == "host" || mode.starts_with("container:")
}

fn non_empty(tokens: &[String]) -> Option<Vec<String>> {
    (!tokens.is_empty()).then(|| tokens.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::config::{PortMapping, Protocol};
    use crate::compose::parser::ComposeParser;
    use crate::engine::memory::{EngineCall, MemoryEngine, MemoryStatus};
    use crate::error::ComposeError;

    fn orchestrator(engine: &Arc<MemoryEngine>) -> ComposeOrchestrator {
        ComposeOrchestrator::new(engine.clone())
    }

    fn plan_for(service: &ServiceDefinition) -> ServicePlan {
        ComposeOrchestrator::new(Arc::new(MemoryEngine::new())).plan(service, "demo")
    }

    #[test]
    fn test_plan_single_port_binding() {
        let service = ServiceDefinition::new("web")
            .image("nginx")
            .port(PortMapping::new("80").host_port("8080"));
        let request = plan_for(&service).request;

        let exposed = request.exposed_ports.unwrap();
        assert_eq!(exposed.keys().collect::<Vec<_>>(), vec!["80/tcp"]);

        let bindings = request.host_config.port_bindings.unwrap();
        assert_eq!(
            bindings["80/tcp"],
            vec![PortBinding {
                host_ip: None,
                host_port: Some("8080".to_string()),
            }]
        );
    }

    #[test]
    fn test_plan_port_without_host_side() {
        let service = ServiceDefinition::new("web")
            .image("nginx")
            .port(PortMapping::new("53").protocol(Protocol::Udp))
            .port(PortMapping::default().host_port("9000"));
        let request = plan_for(&service).request;

        let exposed = request.exposed_ports.unwrap();
        assert_eq!(exposed.len(), 1);
        assert!(exposed.contains_key("53/udp"));
        assert_eq!(request.host_config.port_bindings, None);
    }

    #[test]
    fn test_plan_host_mode_drops_ports() {
        let mut service = ServiceDefinition::new("web")
            .image("nginx")
            .port(PortMapping::new("80").host_port("8080"));
        service.network_mode = Some("host".to_string());
        let request = plan_for(&service).request;

        assert_eq!(request.host_config.network_mode.as_deref(), Some("host"));
        assert_eq!(request.exposed_ports, None);
        assert_eq!(request.host_config.port_bindings, None);

        service.network_mode = Some("container:sidecar".to_string());
        let request = plan_for(&service).request;
        assert_eq!(request.exposed_ports, None);
    }

    #[test]
    fn test_plan_explicit_mode_wins_over_networks() {
        let mut service = ServiceDefinition::new("web")
            .image("nginx")
            .network("front")
            .network("back");
        service.network_mode = Some("bridge".to_string());
        let plan = plan_for(&service);

        assert_eq!(plan.request.host_config.network_mode.as_deref(), Some("bridge"));
        assert_eq!(plan.request.networking_config, None);
        assert!(plan.networks.is_empty());
    }

    #[test]
    fn test_plan_single_network_becomes_mode() {
        let service = ServiceDefinition::new("web").image("nginx").network("backend");
        let plan = plan_for(&service);

        assert_eq!(
            plan.request.host_config.network_mode.as_deref(),
            Some("backend")
        );
        assert_eq!(plan.request.networking_config, None);
        assert_eq!(plan.networks, vec!["backend"]);
    }

    #[test]
    fn test_plan_many_networks_attach_explicitly() {
        let service = ServiceDefinition::new("web")
            .image("nginx")
            .network("front")
            .network("back");
        let plan = plan_for(&service);

        assert_eq!(plan.request.host_config.network_mode, None);
        let endpoints = plan.request.networking_config.unwrap().endpoints_config;
        assert_eq!(endpoints.keys().collect::<Vec<_>>(), vec!["back", "front"]);
        assert_eq!(plan.networks, vec!["front", "back"]);
    }

    #[test]
    fn test_plan_name_labels_env_and_workdir() {
        let mut service = ServiceDefinition::new("api")
            .image("app:1")
            .env("A", "1")
            .env("B", "x=y");
        service.container_name = Some("api-main".to_string());
        service.working_dir = Some("  ".to_string());
        service.volumes = vec!["./data:/data".to_string()];
        let request = plan_for(&service).request;

        assert_eq!(request.name, "api-main");
        assert_eq!(request.labels[PROJECT_LABEL], "demo");
        assert_eq!(request.labels[SERVICE_LABEL], "api");
        assert_eq!(request.env, vec!["A=1", "B=x=y"]);
        assert_eq!(request.working_dir, None);
        assert_eq!(request.host_config.binds, Some(vec!["./data:/data".to_string()]));
        assert_eq!(request.cmd, None);
        assert_eq!(request.entrypoint, None);
    }

    #[test]
    fn test_plan_sdk_default_invocation() {
        let services = ComposeParser::new()
            .parse_str(
                r#"
services:
  api:
    image: mcr.microsoft.com/dotnet/sdk:8.0
  runtime:
    image: mcr.microsoft.com/dotnet/aspnet:8.0
  custom:
    image: mcr.microsoft.com/dotnet/sdk:8.0
    command: ["dotnet", "watch"]
"#,
            )
            .unwrap();

        let api = plan_for(&services[0]).request;
        assert_eq!(api.entrypoint, Some(vec!["dotnet".to_string()]));
        assert_eq!(
            api.cmd,
            Some(vec!["run".to_string(), "--no-restore".to_string()])
        );

        let runtime = plan_for(&services[1]).request;
        assert_eq!(runtime.entrypoint, None);
        assert_eq!(runtime.cmd, None);

        let custom = plan_for(&services[2]).request;
        assert_eq!(custom.entrypoint, None);
        assert_eq!(
            custom.cmd,
            Some(vec!["dotnet".to_string(), "watch".to_string()])
        );
    }

    #[tokio::test]
    async fn test_up_creates_and_starts_in_order() {
        let engine = Arc::new(MemoryEngine::new());
        let services = vec![
            ServiceDefinition::new("db").image("postgres"),
            ServiceDefinition::new("web").image("nginx"),
        ];

        orchestrator(&engine).up(&services, "shop").await.unwrap();

        let containers = engine.containers().unwrap();
        assert_eq!(containers.len(), 2);
        assert_eq!(containers[0].request.name, "db");
        assert_eq!(containers[1].request.name, "web");
        assert!(containers.iter().all(|c| c.status == MemoryStatus::Running));
        assert_eq!(containers[1].request.labels[PROJECT_LABEL], "shop");
    }

    #[tokio::test]
    async fn test_up_creates_missing_networks() {
        let engine = Arc::new(MemoryEngine::new().with_network("front"));
        let services = vec![ServiceDefinition::new("web")
            .image("nginx")
            .network("front")
            .network("back")];

        orchestrator(&engine).up(&services, "shop").await.unwrap();

        let created: Vec<_> = engine
            .calls()
            .unwrap()
            .into_iter()
            .filter_map(|call| match call {
                EngineCall::CreateNetwork { name, driver } => Some((name, driver)),
                _ => None,
            })
            .collect();
        assert_eq!(created, vec![("back".to_string(), "bridge".to_string())]);
        assert!(engine.find_by_name("web").unwrap().is_some());
    }

    #[tokio::test]
    async fn test_up_never_creates_explicit_mode_network() {
        let engine = Arc::new(MemoryEngine::new());
        let mut service = ServiceDefinition::new("web").image("nginx");
        service.network_mode = Some("host".to_string());

        orchestrator(&engine).up(&[service], "shop").await.unwrap();

        let calls = engine.calls().unwrap();
        assert!(!calls.contains(&EngineCall::ListNetworks));
    }

    #[tokio::test]
    async fn test_up_fails_fast() {
        let engine = Arc::new(MemoryEngine::new().fail_on("create container", "b"));
        let services = vec![
            ServiceDefinition::new("a").image("busybox"),
            ServiceDefinition::new("b").image("busybox"),
            ServiceDefinition::new("c").image("busybox"),
        ];

        let err = orchestrator(&engine).up(&services, "batch").await.unwrap_err();
        assert!(matches!(err, ComposeError::Engine { operation: "create container", .. }));

        let a = engine.find_by_name("a").unwrap().unwrap();
        assert_eq!(a.status, MemoryStatus::Running);
        assert!(engine.find_by_name("b").unwrap().is_none());
        assert!(!engine
            .calls()
            .unwrap()
            .contains(&EngineCall::CreateContainer { name: "c".to_string() }));
    }

    #[tokio::test]
    async fn test_up_missing_image_is_engine_error() {
        let engine = Arc::new(MemoryEngine::new());
        let err = orchestrator(&engine)
            .up(&[ServiceDefinition::new("web")], "shop")
            .await
            .unwrap_err();
        assert!(!err.is_client_error());
    }

    #[tokio::test]
    async fn test_down_removes_matching_names_only() {
        let engine = Arc::new(
            MemoryEngine::new()
                .with_container("web", MemoryStatus::Running)
                .with_container("web-old", MemoryStatus::Exited)
                .with_container("db", MemoryStatus::Exited),
        );

        orchestrator(&engine)
            .down(&[ServiceDefinition::new("web"), ServiceDefinition::new("db")])
            .await
            .unwrap();

        let left: Vec<_> = engine
            .containers()
            .unwrap()
            .into_iter()
            .map(|c| c.request.name)
            .collect();
        assert_eq!(left, vec!["web-old"]);

        let calls = engine.calls().unwrap();
        assert_eq!(calls[0], EngineCall::ListContainers { all: true });
        assert!(calls.iter().any(|c| matches!(c, EngineCall::RemoveContainer { force: true, .. })));
    }

    #[tokio::test]
    async fn test_down_stops_before_remove_and_aborts_on_error() {
        let engine = Arc::new(
            MemoryEngine::new()
                .with_container("a", MemoryStatus::Running)
                .with_container("b", MemoryStatus::Running)
                .fail_on("stop container", "a"),
        );

        let result = orchestrator(&engine)
            .down(&[ServiceDefinition::new("a"), ServiceDefinition::new("b")])
            .await;
        assert!(result.is_err());
        assert_eq!(engine.containers().unwrap().len(), 2);
    }
}
