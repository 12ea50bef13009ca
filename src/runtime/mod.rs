//! Container runtime capability
//!
//! The controller never talks to the runtime directly; it is handed a
//! [`ContainerRuntime`] at construction. [`docker::DockerCli`] is the
//! production implementation.

pub mod docker;

pub use docker::DockerCli;

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncRead;

/// Raw byte feed of runtime events
pub type EventFeed = Box<dyn AsyncRead + Send + Unpin>;

/// Errors returned by runtime operations
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Runtime unreachable: {0}")]
    Unreachable(String),

    #[error("Runtime command failed: {0}")]
    CommandFailed(String),

    #[error("Container {0} has no network address")]
    NoAddress(String),

    #[error("Failed to parse runtime output: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

// ============================================================================
// SBIO: Trait for abstraction (allows mocking in tests)
// ============================================================================

#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Open the live event feed
    async fn events(&self) -> Result<EventFeed, RuntimeError>;

    /// Current labels of a container
    async fn labels(&self, id: &str) -> Result<HashMap<String, String>, RuntimeError>;

    /// Network address the load balancer should route to
    async fn address(&self, id: &str) -> Result<String, RuntimeError>;

    /// Place the container on the traffic network
    async fn attach(&self, id: &str) -> Result<(), RuntimeError>;

    /// Remove the container from the traffic network
    async fn detach(&self, id: &str) -> Result<(), RuntimeError>;
}

// ============================================================================
// SBIO: Mock implementation for testing (no I/O)
// ============================================================================
