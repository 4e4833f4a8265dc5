// ABOUTME: Error types for lifecycle runs.
// ABOUTME: Folds engine and probe failures into one error with a stable kind.

use serde::Serialize;

use crate::probe::ProbeError;
use crate::runtime::{ContainerError, ImageError, LogError, StatusRegression};

/// Errors that end a lifecycle run.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("container runtime unavailable: {0}")]
    EngineUnavailable(String),

    #[error("image not found: {0}")]
    ImageNotFound(String),

    #[error("failed to pull image: {0}")]
    PullFailed(String),

    #[error("failed to build image: {0}")]
    BuildFailed(String),

    #[error("container name already in use: {0}")]
    NameConflict(String),

    #[error("container not found: {0}")]
    NotFound(String),

    #[error("container already in requested state: {0}")]
    AlreadyInState(String),

    /// The container did not become ready in time, or exited first.
    #[error("container not ready: {0}")]
    NotReady(String),

    #[error("probe timed out: {0}")]
    ProbeTimeout(String),

    #[error("probe failed: {0}")]
    ProbeFailed(String),

    /// The probe got an answer outside the accepted status range.
    #[error("probe rejected with HTTP status {status}")]
    ProbeRejected { status: u16 },

    #[error("container exited with code {code}")]
    NonZeroExit { code: i64 },

    #[error(transparent)]
    StatusRegression(#[from] StatusRegression),

    #[error("run cancelled")]
    Cancelled,

    #[error("runtime error: {0}")]
    Runtime(String),
}

/// Coarse classification of [`LifecycleError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleErrorKind {
    EngineUnavailable,
    ImageNotFound,
    PullFailed,
    BuildFailed,
    NameConflict,
    NotFound,
    AlreadyInState,
    NotReady,
    ProbeTimeout,
    ProbeFailed,
    ProbeRejected,
    NonZeroExit,
    StatusRegression,
    Cancelled,
    Runtime,
}

impl LifecycleError {
    pub fn kind(&self) -> LifecycleErrorKind {
        match self {
            LifecycleError::EngineUnavailable(_) => LifecycleErrorKind::EngineUnavailable,
            LifecycleError::ImageNotFound(_) => LifecycleErrorKind::ImageNotFound,
            LifecycleError::PullFailed(_) => LifecycleErrorKind::PullFailed,
            LifecycleError::BuildFailed(_) => LifecycleErrorKind::BuildFailed,
            LifecycleError::NameConflict(_) => LifecycleErrorKind::NameConflict,
            LifecycleError::NotFound(_) => LifecycleErrorKind::NotFound,
            LifecycleError::AlreadyInState(_) => LifecycleErrorKind::AlreadyInState,
            LifecycleError::NotReady(_) => LifecycleErrorKind::NotReady,
            LifecycleError::ProbeTimeout(_) => LifecycleErrorKind::ProbeTimeout,
            LifecycleError::ProbeFailed(_) => LifecycleErrorKind::ProbeFailed,
            LifecycleError::ProbeRejected { .. } => LifecycleErrorKind::ProbeRejected,
            LifecycleError::NonZeroExit { .. } => LifecycleErrorKind::NonZeroExit,
            LifecycleError::StatusRegression(_) => LifecycleErrorKind::StatusRegression,
            LifecycleError::Cancelled => LifecycleErrorKind::Cancelled,
            LifecycleError::Runtime(_) => LifecycleErrorKind::Runtime,
        }
    }

    /// Failures that happen before any container exists.
    pub fn is_setup(&self) -> bool {
        matches!(
            self.kind(),
            LifecycleErrorKind::ImageNotFound
                | LifecycleErrorKind::PullFailed
                | LifecycleErrorKind::BuildFailed
                | LifecycleErrorKind::NameConflict
        )
    }
}

impl From<ImageError> for LifecycleError {
    fn from(err: ImageError) -> Self {
        match err {
            ImageError::EngineUnavailable(m) => LifecycleError::EngineUnavailable(m),
            ImageError::NotFound(m) => LifecycleError::ImageNotFound(m),
            ImageError::PullFailed(m) => LifecycleError::PullFailed(m),
            ImageError::BuildFailed(m) => LifecycleError::BuildFailed(m),
            ImageError::InUse(m) | ImageError::Runtime(m) => LifecycleError::Runtime(m),
        }
    }
}

impl From<ContainerError> for LifecycleError {
    fn from(err: ContainerError) -> Self {
        match err {
            ContainerError::EngineUnavailable(m) => LifecycleError::EngineUnavailable(m),
            ContainerError::ImageNotFound(m) => LifecycleError::ImageNotFound(m),
            ContainerError::NameConflict(m) => LifecycleError::NameConflict(m),
            ContainerError::NotFound(m) => LifecycleError::NotFound(m),
            ContainerError::AlreadyInState(m) => LifecycleError::AlreadyInState(m),
            ContainerError::InvalidConfig(m) => {
                LifecycleError::Runtime(format!("invalid configuration: {m}"))
            }
            ContainerError::Runtime(m) => LifecycleError::Runtime(m),
        }
    }
}

impl From<LogError> for LifecycleError {
    fn from(err: LogError) -> Self {
        match err {
            LogError::ContainerNotFound(m) => LifecycleError::NotFound(m),
            LogError::StreamError(m) | LogError::Runtime(m) => LifecycleError::Runtime(m),
        }
    }
}

impl From<ProbeError> for LifecycleError {
    fn from(err: ProbeError) -> Self {
        match err {
            ProbeError::Cancelled => LifecycleError::Cancelled,
            e @ ProbeError::ProbeTimeout { .. } => LifecycleError::ProbeTimeout(e.to_string()),
            e => LifecycleError::ProbeFailed(e.to_string()),
        }
    }
}
