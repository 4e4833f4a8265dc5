// ABOUTME: Container operations trait for container runtimes.
// ABOUTME: Create, start, stop, remove, inspect, and wait on containers.

use super::sealed::Sealed;
use super::shared_types::{ContainerHandle, ContainerSpec};
use crate::types::ContainerId;
use async_trait::async_trait;
use std::time::Duration;

/// Container lifecycle operations.
#[async_trait]
pub trait ContainerOps: Sealed + Send + Sync {
    /// Create a container. The returned handle is in `Created` state.
    async fn create_container(
        &self,
        spec: &ContainerSpec,
    ) -> Result<ContainerHandle, ContainerError>;

    /// Start a created container.
    async fn start_container(&self, id: &ContainerId) -> Result<(), ContainerError>;

    /// Stop a running container, killing it after `timeout`.
    async fn stop_container(
        &self,
        id: &ContainerId,
        timeout: Duration,
    ) -> Result<(), ContainerError>;

    /// Remove a container.
    async fn remove_container(&self, id: &ContainerId, force: bool) -> Result<(), ContainerError>;

    /// Fetch the current state of a container.
    async fn inspect_container(&self, id: &ContainerId) -> Result<ContainerHandle, ContainerError>;

    /// Block until the container stops and return its exit code.
    async fn wait_container(&self, id: &ContainerId) -> Result<i64, ContainerError>;
}

/// Errors from container operations.
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    #[error("container runtime unavailable: {0}")]
    EngineUnavailable(String),

    #[error("image not found: {0}")]
    ImageNotFound(String),

    #[error("container name already in use: {0}")]
    NameConflict(String),

    #[error("container not found: {0}")]
    NotFound(String),

    #[error("container already in requested state: {0}")]
    AlreadyInState(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}

impl ContainerError {
    /// Errors that mean the requested transition already happened.
    ///
    /// Teardown treats these as success.
    pub fn is_benign(&self) -> bool {
        matches!(
            self,
            ContainerError::NotFound(_) | ContainerError::AlreadyInState(_)
        )
    }
}
