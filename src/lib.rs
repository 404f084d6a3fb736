//! composectl - drive a container engine from a compose file
//!
//! composectl reads a compose file, normalizes its services and turns
//! them into container engine calls:
//!
//! - Compose file parsing into service definitions
//! - `up`: network creation, container creation and start, per service
//! - `down`: stop and force-remove containers named after the services
//! - Docker Engine API binding over a Unix socket or HTTP

pub mod compose;
pub mod engine;
pub mod error;

pub use error::{ComposeError, Result};
