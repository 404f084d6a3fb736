//! Docker Compose file parser

use super::config::ServiceDefinition;
use super::decode::{
    decode_environment, decode_networks, decode_scalar, decode_tokens, decode_volumes, Node,
};
use super::ports::parse_port_entry;
use super::runtime::RuntimeRules;
use crate::error::{ComposeError, Result};
use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};

/// Default compose file names
pub const DEFAULT_COMPOSE_FILES: &[&str] = &[
    "compose.yaml",
    "compose.yml",
    "docker-compose.yaml",
    "docker-compose.yml",
];

/// Compose file parser
#[derive(Debug, Clone, Default)]
pub struct ComposeParser {
    rules: RuntimeRules,
}

impl ComposeParser {
    /// Create a parser with the default runtime rules
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a custom runtime rule table
    pub fn with_rules(rules: RuntimeRules) -> Self {
        Self { rules }
    }

    /// Find compose file in directory
    pub fn find_compose_file(dir: &Path) -> Option<PathBuf> {
        for name in DEFAULT_COMPOSE_FILES {
            let path = dir.join(name);
            if path.exists() {
                return Some(path);
            }
        }
        None
    }

    /// Parse compose file from path
    pub fn parse_file(&self, path: &Path) -> Result<Vec<ServiceDefinition>> {
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::InvalidData => ComposeError::MalformedDocument(format!(
                "{}: not valid UTF-8 text",
                path.display()
            )),
            _ => ComposeError::NotFound(format!("{}: {}", path.display(), e)),
        })?;

        self.parse_str(&content)
    }

    /// Parse compose file from string
    ///
    /// A document without a `services` mapping yields an empty list.
    pub fn parse_str(&self, content: &str) -> Result<Vec<ServiceDefinition>> {
        let root: Value = serde_yaml::from_str(content)
            .map_err(|e| ComposeError::MalformedDocument(format!("Failed to parse YAML: {}", e)))?;

        let Node::Mapping(root) = Node::of(&root) else {
            return Err(ComposeError::MalformedDocument(
                "Top-level element must be a mapping".to_string(),
            ));
        };

        let Some(Node::Mapping(services)) = root.get("services").map(Node::of) else {
            tracing::debug!("No services mapping in compose file");
            return Ok(Vec::new());
        };

        let mut definitions = Vec::with_capacity(services.len());
        for (key, value) in services {
            let Some(name) = decode_scalar(key) else {
                tracing::warn!("Skipping service with non-scalar key");
                continue;
            };
            let Node::Mapping(fields) = Node::of(value) else {
                tracing::warn!("Skipping service '{}': definition is not a mapping", name);
                continue;
            };

            definitions.push(self.parse_service(&name, fields)?);
        }

        Ok(definitions)
    }

    /// Build a service definition from its mapping
    fn parse_service(&self, name: &str, fields: &Mapping) -> Result<ServiceDefinition> {
        let mut service = ServiceDefinition::new(name);

        service.image = fields.get("image").and_then(decode_scalar);
        service.container_name = fields.get("container_name").and_then(decode_scalar);
        service.working_dir = fields.get("working_dir").and_then(decode_scalar);
        service.network_mode = fields.get("network_mode").and_then(decode_scalar);

        if let Some(volumes) = fields.get("volumes") {
            service.volumes = decode_volumes(volumes);
        }
        if let Some(command) = fields.get("command") {
            service.command = decode_tokens(command);
        }
        if let Some(entrypoint) = fields.get("entrypoint") {
            service.entrypoint = decode_tokens(entrypoint);
        }
        if let Some(environment) = fields.get("environment") {
            service.environment = decode_environment(environment);
        }
        if let Some(networks) = fields.get("networks") {
            service.networks = decode_networks(networks);
        }

        if let Some(Node::Sequence(ports)) = fields.get("ports").map(Node::of) {
            for entry in ports {
                if let Some(port) = parse_port_entry(entry)? {
                    service.ports.push(port);
                }
            }
        }

        if let Some(rule) = self.rules.detect(&service) {
            tracing::debug!("Service '{}' detected as {} runtime", name, rule.name);
            service.runtime_hint = true;
        }

        Ok(service)
    }
}
