// ABOUTME: Container runtime access for Docker and Podman.
// ABOUTME: Detection, the bollard-backed engine, capability traits, and the CLI wrapper.

mod bollard;
mod cli;
mod detection;
mod error;
#[cfg(test)]
pub(crate) mod fake;
pub mod traits;
mod types;

pub use self::bollard::{BollardRuntime, MANAGED_LABEL, connect_local};
pub use cli::{CliError, CliOutput, RuntimeCli};
pub use detection::{DetectionError, detect_local};
pub use error::{RuntimeError, RuntimeErrorKind};
pub use traits::*;
pub use types::{DetectedRuntime, Endpoint, RuntimeConfig, RuntimeType};
