//! Error types for composectl

use thiserror::Error;

/// Result type for composectl operations
pub type Result<T> = std::result::Result<T, ComposeError>;

/// composectl error types
#[derive(Error, Debug)]
pub enum ComposeError {
    #[error("Compose file not found: {0}")]
    NotFound(String),

    #[error("Malformed compose file: {0}")]
    MalformedDocument(String),

    #[error("No services found in compose file: {0}")]
    EmptyServiceSet(String),

    #[error("Invalid port specification '{spec}': {reason}")]
    InvalidPortSyntax { spec: String, reason: String },

    #[error("Engine {operation} failed: {message}")]
    Engine {
        operation: &'static str,
        message: String,
    },

    #[error("Lock error: {0}")]
    Lock(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl ComposeError {
    /// Build an engine error for the named operation
    pub fn engine(operation: &'static str, message: impl Into<String>) -> Self {
        ComposeError::Engine {
            operation,
            message: message.into(),
        }
    }

    /// Whether the failure was caused by the caller's input rather than the engine.
    ///
    /// A request layer maps these to client errors and everything else to
    /// server errors.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ComposeError::NotFound(_)
                | ComposeError::MalformedDocument(_)
                | ComposeError::EmptyServiceSet(_)
                | ComposeError::InvalidPortSyntax { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_classification() {
        assert!(ComposeError::NotFound("compose.yaml".into()).is_client_error());
        assert!(ComposeError::EmptyServiceSet("compose.yaml".into()).is_client_error());
        assert!(!ComposeError::engine("create container", "no such image").is_client_error());
    }

    #[test]
    fn test_engine_error_message() {
        let err = ComposeError::engine("start container", "port is already allocated");
        assert_eq!(
            err.to_string(),
            "Engine start container failed: port is already allocated"
        );
    }
}
