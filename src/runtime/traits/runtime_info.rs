// ABOUTME: Runtime info trait for container runtimes.
// ABOUTME: Reachability check plus version and container counts for the summary.

use super::sealed::Sealed;
use super::shared_types::RuntimeMetadata;
use async_trait::async_trait;

#[async_trait]
pub trait RuntimeInfo: Sealed + Send + Sync {
    /// Name, version, platform, and container and image counts.
    async fn info(&self) -> Result<RuntimeMetadata, RuntimeInfoError>;

    /// Cheapest request that proves the API answers.
    async fn ping(&self) -> Result<(), RuntimeInfoError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RuntimeInfoError {
    /// Socket missing, refused, or not speaking the API.
    #[error("cannot reach runtime: {0}")]
    ConnectionFailed(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}
