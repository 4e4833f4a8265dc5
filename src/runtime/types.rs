// ABOUTME: Runtime type definitions for Docker and Podman.
// ABOUTME: Includes RuntimeType, the runtime Endpoint, and explicit RuntimeConfig.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The container runtime type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeType {
    Docker,
    Podman,
}

impl RuntimeType {
    /// Name of the runtime's command-line binary.
    pub fn cli_binary(&self) -> &'static str {
        match self {
            RuntimeType::Docker => "docker",
            RuntimeType::Podman => "podman",
        }
    }
}

impl fmt::Display for RuntimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.cli_binary())
    }
}

/// Where the runtime API listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Unix domain socket path.
    Unix(String),
    /// `host:port` of a plain-HTTP TCP endpoint.
    Tcp(String),
}

impl Endpoint {
    /// Parse `unix:///path`, `tcp://host:port`, or a bare socket path.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if let Some(path) = value.strip_prefix("unix://") {
            return (!path.is_empty()).then(|| Endpoint::Unix(path.to_string()));
        }
        if let Some(addr) = value.strip_prefix("tcp://") {
            let addr = addr.trim_end_matches('/');
            return (!addr.is_empty()).then(|| Endpoint::Tcp(addr.to_string()));
        }
        if value.starts_with('/') {
            return Some(Endpoint::Unix(value.to_string()));
        }
        None
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Unix(path) => write!(f, "unix://{path}"),
            Endpoint::Tcp(addr) => write!(f, "tcp://{addr}"),
        }
    }
}

/// A runtime found on this machine or named in configuration.
#[derive(Debug, Clone)]
pub struct DetectedRuntime {
    pub runtime_type: RuntimeType,
    pub endpoint: Endpoint,
}

/// Configuration for explicit runtime override.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RuntimeConfig {
    /// Explicit runtime type (overrides auto-detection).
    pub runtime: Option<RuntimeType>,
    /// Explicit endpoint, `unix://` or `tcp://` (overrides default).
    pub socket: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_parses_schemes() {
        assert_eq!(
            Endpoint::parse("unix:///var/run/docker.sock"),
            Some(Endpoint::Unix("/var/run/docker.sock".to_string()))
        );
        assert_eq!(
            Endpoint::parse("tcp://10.0.0.5:2375/"),
            Some(Endpoint::Tcp("10.0.0.5:2375".to_string()))
        );
        assert_eq!(
            Endpoint::parse("/run/podman/podman.sock"),
            Some(Endpoint::Unix("/run/podman/podman.sock".to_string()))
        );
        assert_eq!(Endpoint::parse("ssh://host"), None);
        assert_eq!(Endpoint::parse("unix://"), None);
    }
}
