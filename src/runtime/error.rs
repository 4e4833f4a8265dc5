// ABOUTME: Runtime error types with SNAFU pattern.
// ABOUTME: Unifies detection and connection failures behind one error with a kind.

use snafu::Snafu;

use super::detection::DetectionError;
use super::traits::RuntimeInfoError;

/// Why no usable runtime could be reached.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum RuntimeError {
    #[snafu(display("runtime detection failed: {source}"))]
    Detection { source: DetectionError },

    #[snafu(display("runtime connection failed: {source}"))]
    Connection { source: RuntimeInfoError },
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeErrorKind {
    /// No socket found and nothing configured.
    NoRuntimeFound,
    /// Configured endpoint is not a unix or tcp address.
    UnsupportedEndpoint,
    /// The endpoint did not answer.
    ConnectionFailed,
    /// The runtime answered with an error.
    RuntimeOperation,
}

impl RuntimeError {
    pub fn kind(&self) -> RuntimeErrorKind {
        match self {
            RuntimeError::Detection { source } => match source {
                DetectionError::NoRuntimeFound => RuntimeErrorKind::NoRuntimeFound,
                DetectionError::UnsupportedEndpoint(_) => RuntimeErrorKind::UnsupportedEndpoint,
            },
            RuntimeError::Connection { source } => match source {
                RuntimeInfoError::ConnectionFailed(_) => RuntimeErrorKind::ConnectionFailed,
                RuntimeInfoError::Runtime(_) => RuntimeErrorKind::RuntimeOperation,
            },
        }
    }

    /// What the user can change to get past this error, if anything.
    pub fn hint(&self) -> Option<&'static str> {
        match self.kind() {
            RuntimeErrorKind::NoRuntimeFound => Some(
                "start Docker or Podman, or set runtime.socket in berth.yml or DOCKER_HOST",
            ),
            RuntimeErrorKind::UnsupportedEndpoint => {
                Some("use a unix:// or tcp:// endpoint")
            }
            RuntimeErrorKind::ConnectionFailed => {
                Some("check that the runtime is running and the socket is readable")
            }
            RuntimeErrorKind::RuntimeOperation => None,
        }
    }
}

impl From<DetectionError> for RuntimeError {
    fn from(source: DetectionError) -> Self {
        RuntimeError::Detection { source }
    }
}

impl From<RuntimeInfoError> for RuntimeError {
    fn from(source: RuntimeInfoError) -> Self {
        RuntimeError::Connection { source }
    }
}
