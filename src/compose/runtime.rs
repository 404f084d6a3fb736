//! Managed-runtime detection rules
//!
//! A service is flagged as running a managed runtime when its image, its
//! command line or its environment matches one of the rules below. The
//! flag only matters when the service gives no entrypoint or command: for
//! SDK images the orchestrator then fills in a "run from source" default.

use super::config::ServiceDefinition;

/// One managed runtime
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeRule {
    /// Runtime name, used in logs
    pub name: String,
    /// Substrings identifying the runtime's images (matched case-insensitively)
    pub image_markers: Vec<String>,
    /// CLI name looked for in command and entrypoint tokens
    pub cli_token: String,
    /// Conventional environment variable prefix
    pub env_prefix: String,
    /// Substring identifying the SDK (development) image variant
    pub sdk_image_marker: String,
    /// Entrypoint used for SDK images when none is given
    pub default_entrypoint: Vec<String>,
    /// Command used for SDK images when none is given
    pub default_command: Vec<String>,
}

impl RuntimeRule {
    /// The .NET runtime
    pub fn dotnet() -> Self {
        Self {
            name: "dotnet".to_string(),
            image_markers: vec![
                "mcr.microsoft.com/dotnet".to_string(),
                "microsoft/dotnet".to_string(),
            ],
            cli_token: "dotnet".to_string(),
            env_prefix: "DOTNET_".to_string(),
            sdk_image_marker: "dotnet/sdk".to_string(),
            default_entrypoint: vec!["dotnet".to_string()],
            default_command: vec!["run".to_string(), "--no-restore".to_string()],
        }
    }

    /// Whether the service looks like it runs this runtime
    pub fn matches(&self, service: &ServiceDefinition) -> bool {
        let image = service
            .image
            .as_deref()
            .unwrap_or_default()
            .to_lowercase();
        if self
            .image_markers
            .iter()
            .any(|marker| image.contains(&marker.to_lowercase()))
        {
            return true;
        }

        let token = self.cli_token.to_lowercase();
        if !token.is_empty()
            && service
                .command
                .iter()
                .chain(service.entrypoint.iter())
                .any(|arg| arg.to_lowercase().contains(&token))
        {
            return true;
        }

        !self.env_prefix.is_empty()
            && service
                .environment
                .keys()
                .any(|key| key.starts_with(&self.env_prefix))
    }

    /// Whether the image is this runtime's SDK variant
    pub fn is_sdk_image(&self, image: &str) -> bool {
        !self.sdk_image_marker.is_empty()
            && image
                .to_lowercase()
                .contains(&self.sdk_image_marker.to_lowercase())
    }
}

/// Rule table evaluated by the parser and the orchestrator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeRules {
    rules: Vec<RuntimeRule>,
}

impl Default for RuntimeRules {
    fn default() -> Self {
        Self {
            rules: vec![RuntimeRule::dotnet()],
        }
    }
}

impl RuntimeRules {
    /// An empty table; nothing is ever detected
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Add a rule
    pub fn with_rule(mut self, rule: RuntimeRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// First rule matching the service
    pub fn detect(&self, service: &ServiceDefinition) -> Option<&RuntimeRule> {
        self.rules.iter().find(|rule| rule.matches(service))
    }

    /// Default entrypoint and command for a service that gives neither.
    ///
    /// Only applies to services flagged with a runtime hint whose image is
    /// the SDK image of the rule that detected them.
    pub fn default_invocation(
        &self,
        service: &ServiceDefinition,
    ) -> Option<(Vec<String>, Vec<String>)> {
        if !service.runtime_hint || !service.entrypoint.is_empty() || !service.command.is_empty() {
            return None;
        }

        let image = service.image.as_deref()?;
        self.detect(service)
            .filter(|rule| rule.is_sdk_image(image))
            .map(|rule| (rule.default_entrypoint.clone(), rule.default_command.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_by_image() {
        let rules = RuntimeRules::default();
        let service = ServiceDefinition::new("api").image("MCR.microsoft.com/dotnet/aspnet:8.0");
        assert!(rules.detect(&service).is_some());

        let service = ServiceDefinition::new("web").image("nginx");
        assert!(rules.detect(&service).is_none());
    }

    #[test]
    fn test_detect_by_command_and_env() {
        let rules = RuntimeRules::default();

        let mut service = ServiceDefinition::new("api").image("custom/app");
        service.command = vec!["DotNet".to_string(), "app.dll".to_string()];
        assert!(rules.detect(&service).is_some());

        let service = ServiceDefinition::new("api")
            .image("custom/app")
            .env("DOTNET_ENVIRONMENT", "Development");
        assert!(rules.detect(&service).is_some());

        let service = ServiceDefinition::new("api")
            .image("custom/app")
            .env("MY_DOTNET_FLAG", "1");
        assert!(rules.detect(&service).is_none());
    }

    #[test]
    fn test_custom_rule() {
        let rules = RuntimeRules::empty().with_rule(RuntimeRule {
            name: "node".to_string(),
            image_markers: vec!["node:".to_string()],
            cli_token: "node".to_string(),
            env_prefix: "NODE_".to_string(),
            sdk_image_marker: "node:".to_string(),
            default_entrypoint: vec!["npm".to_string()],
            default_command: vec!["start".to_string()],
        });

        let mut service = ServiceDefinition::new("web").image("node:20");
        assert_eq!(rules.detect(&service).map(|r| r.name.as_str()), Some("node"));

        service.runtime_hint = true;
        let (entrypoint, command) = rules.default_invocation(&service).unwrap();
        assert_eq!(entrypoint, vec!["npm"]);
        assert_eq!(command, vec!["start"]);
    }

    #[test]
    fn test_default_invocation_requires_sdk_image() {
        let rules = RuntimeRules::default();

        let mut sdk = ServiceDefinition::new("api").image("mcr.microsoft.com/dotnet/sdk:8.0");
        sdk.runtime_hint = true;
        let (entrypoint, command) = rules.default_invocation(&sdk).unwrap();
        assert_eq!(entrypoint, vec!["dotnet"]);
        assert_eq!(command, vec!["run", "--no-restore"]);

        let mut runtime_only =
            ServiceDefinition::new("api").image("mcr.microsoft.com/dotnet/aspnet:8.0");
        runtime_only.runtime_hint = true;
        assert!(rules.default_invocation(&runtime_only).is_none());

        sdk.command = vec!["dotnet".to_string(), "watch".to_string()];
        assert!(rules.default_invocation(&sdk).is_none());
    }

    #[test]
    fn test_default_invocation_uses_detecting_rule() {
        // "builder" is detected through its env prefix; the image carries
        // the node rule's SDK marker but node never matches the service.
        let rules = RuntimeRules::empty()
            .with_rule(RuntimeRule {
                name: "builder".to_string(),
                image_markers: vec!["builder/".to_string()],
                cli_token: String::new(),
                env_prefix: "BUILDER_".to_string(),
                sdk_image_marker: "builder/sdk".to_string(),
                default_entrypoint: vec!["build".to_string()],
                default_command: vec!["run".to_string()],
            })
            .with_rule(RuntimeRule {
                name: "node".to_string(),
                image_markers: vec!["library/node".to_string()],
                cli_token: "node".to_string(),
                env_prefix: "NODE_".to_string(),
                sdk_image_marker: "tools-sdk".to_string(),
                default_entrypoint: vec!["npm".to_string()],
                default_command: vec!["start".to_string()],
            });

        let mut service = ServiceDefinition::new("app")
            .image("registry.local/tools-sdk:1")
            .env("BUILDER_MODE", "release");
        service.runtime_hint = true;

        assert_eq!(rules.detect(&service).map(|r| r.name.as_str()), Some("builder"));
        assert!(rules.default_invocation(&service).is_none());

        let mut service = ServiceDefinition::new("app")
            .image("registry.local/builder/sdk:1")
            .env("BUILDER_MODE", "release");
        service.runtime_hint = true;
        let (entrypoint, command) = rules.default_invocation(&service).unwrap();
        assert_eq!(entrypoint, vec!["build"]);
        assert_eq!(command, vec!["run"]);
    }
}
