//! Docker Compose compatible orchestration
//!
//! This module reads compose files into normalized service definitions and
//! realizes them as containers on an engine.

pub mod config;
pub mod control;
pub mod decode;
pub mod orchestrator;
pub mod parser;
pub mod ports;
pub mod runtime;

pub use config::{PortMapping, Protocol, ServiceDefinition};
pub use control::ComposeControl;
pub use orchestrator::{ComposeOrchestrator, ServicePlan};
pub use parser::ComposeParser;
pub use runtime::{RuntimeRule, RuntimeRules};
