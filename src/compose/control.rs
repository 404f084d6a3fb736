//! Entry points for callers that work with compose file paths

use super::config::ServiceDefinition;
use super::orchestrator::ComposeOrchestrator;
use super::parser::ComposeParser;
use super::runtime::RuntimeRules;
use crate::engine::Engine;
use crate::error::{ComposeError, Result};
use std::path::Path;
use std::sync::Arc;

/// Parses a compose file and drives the orchestrator with it
pub struct ComposeControl {
    parser: ComposeParser,
    orchestrator: ComposeOrchestrator,
}

impl ComposeControl {
    /// Create a controller for an engine, with the default runtime rules
    pub fn new(engine: Arc<dyn Engine>) -> Self {
        Self::with_rules(engine, RuntimeRules::default())
    }

    /// Create a controller with a custom runtime rule table
    pub fn with_rules(engine: Arc<dyn Engine>, rules: RuntimeRules) -> Self {
        Self {
            parser: ComposeParser::with_rules(rules.clone()),
            orchestrator: ComposeOrchestrator::new(engine).with_rules(rules),
        }
    }

    /// Parse the file, failing if it defines no usable services
    pub fn load(&self, path: &Path) -> Result<Vec<ServiceDefinition>> {
        if !path.is_file() {
            return Err(ComposeError::NotFound(path.display().to_string()));
        }

        let services = self.parser.parse_file(path)?;
        if services.is_empty() {
            return Err(ComposeError::EmptyServiceSet(path.display().to_string()));
        }

        tracing::debug!("Loaded {} services from {}", services.len(), path.display());
        Ok(services)
    }

    /// Bring up every service in the file under the given project name
    pub async fn up(&self, path: &Path, project: &str) -> Result<()> {
        let services = self.load(path)?;
        self.orchestrator.up(&services, project).await
    }

    /// Tear down every container named after a service in the file
    pub async fn down(&self, path: &Path) -> Result<()> {
        let services = self.load(path)?;
        self.orchestrator.down(&services).await
    }
}
