// ABOUTME: Image operations trait for container runtimes.
// ABOUTME: Pull, build, inspect, list, and remove container images.

use super::sealed::Sealed;
use super::shared_types::{BuildSpec, ImageHandle};
use crate::types::ImageRef;
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::StreamExt;

/// Image operations.
#[async_trait]
pub trait ImageOps: Sealed + Send + Sync {
    /// Pull an image from its registry.
    async fn pull_image(&self, reference: &ImageRef) -> Result<ImageHandle, ImageError>;

    /// Start a build. Nothing is sent to the runtime until the returned log
    /// is read.
    async fn build_image(&self, spec: &BuildSpec) -> Result<BuildLog, ImageError>;

    /// Check if an image exists locally.
    async fn image_exists(&self, reference: &ImageRef) -> Result<bool, ImageError>;

    /// Remove an image.
    async fn remove_image(&self, reference: &ImageRef, force: bool) -> Result<(), ImageError>;

    /// List local images.
    async fn list_images(&self) -> Result<Vec<ImageHandle>, ImageError>;
}

/// Output of an image build.
///
/// The log is lazy and finite, delivered in the runtime's order, and can be
/// read only once. `finish` drains what is left and resolves the image.
pub struct BuildLog {
    lines: BoxStream<'static, Result<String, ImageError>>,
    image: BoxFuture<'static, Result<ImageHandle, ImageError>>,
}

impl BuildLog {
    /// `image` is polled only after `lines` is exhausted.
    pub fn new(
        lines: BoxStream<'static, Result<String, ImageError>>,
        image: BoxFuture<'static, Result<ImageHandle, ImageError>>,
    ) -> Self {
        Self { lines, image }
    }

    /// Next build log line, or `None` once the build output ends.
    pub async fn next_line(&mut self) -> Option<Result<String, ImageError>> {
        self.lines.next().await
    }

    /// Drain the remaining log and return the built image.
    pub async fn finish(mut self) -> Result<ImageHandle, ImageError> {
        while let Some(line) = self.lines.next().await {
            line?;
        }
        self.image.await
    }
}

impl std::fmt::Debug for BuildLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildLog").finish_non_exhaustive()
    }
}

/// Errors from image operations.
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("container runtime unavailable: {0}")]
    EngineUnavailable(String),

    #[error("image not found: {0}")]
    NotFound(String),

    #[error("pull failed: {0}")]
    PullFailed(String),

    #[error("build failed: {0}")]
    BuildFailed(String),

    #[error("image in use, cannot remove: {0}")]
    InUse(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}
