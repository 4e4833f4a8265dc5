// ABOUTME: Runtime detection logic for the local system.
// ABOUTME: Honours explicit config and DOCKER_HOST, then checks Podman and Docker sockets.

use super::types::{DetectedRuntime, Endpoint, RuntimeConfig, RuntimeType};
use std::path::Path;

/// Error during runtime detection.
#[derive(Debug, thiserror::Error)]
pub enum DetectionError {
    #[error("no container runtime found (checked Podman and Docker sockets)")]
    NoRuntimeFound,

    #[error("unsupported runtime endpoint: {0}")]
    UnsupportedEndpoint(String),
}

const ROOTFUL_PODMAN: &str = "/run/podman/podman.sock";
const DOCKER_SOCKET: &str = "/var/run/docker.sock";

/// Detect the container runtime on the local system.
///
/// Detection order:
/// 1. Explicit `config` (runtime type and/or socket)
/// 2. `DOCKER_HOST`
/// 3. Rootless Podman socket (`/run/user/$UID/podman/podman.sock`)
/// 4. Rootful Podman socket (`/run/podman/podman.sock`)
/// 5. Docker socket (`/var/run/docker.sock`)
pub fn detect_local(config: Option<&RuntimeConfig>) -> Result<DetectedRuntime, DetectionError> {
    if let Some(cfg) = config {
        match (cfg.runtime, cfg.socket.as_deref()) {
            (runtime, Some(socket)) => {
                let endpoint = Endpoint::parse(socket)
                    .ok_or_else(|| DetectionError::UnsupportedEndpoint(socket.to_string()))?;
                let runtime_type = runtime.unwrap_or_else(|| guess_runtime(&endpoint));
                return Ok(DetectedRuntime {
                    runtime_type,
                    endpoint,
                });
            }
            (Some(runtime_type), None) => {
                return Ok(DetectedRuntime {
                    runtime_type,
                    endpoint: Endpoint::Unix(default_socket_path(runtime_type)),
                });
            }
            (None, None) => {}
        }
    }

    if let Ok(host) = std::env::var("DOCKER_HOST")
        && !host.trim().is_empty()
    {
        let endpoint =
            Endpoint::parse(&host).ok_or_else(|| DetectionError::UnsupportedEndpoint(host.clone()))?;
        return Ok(DetectedRuntime {
            runtime_type: guess_runtime(&endpoint),
            endpoint,
        });
    }

    if let Some(uid) = get_uid() {
        let rootless_socket = format!("/run/user/{}/podman/podman.sock", uid);
        if Path::new(&rootless_socket).exists() {
            return Ok(DetectedRuntime {
                runtime_type: RuntimeType::Podman,
                endpoint: Endpoint::Unix(rootless_socket),
            });
        }
    }

    if Path::new(ROOTFUL_PODMAN).exists() {
        return Ok(DetectedRuntime {
            runtime_type: RuntimeType::Podman,
            endpoint: Endpoint::Unix(ROOTFUL_PODMAN.to_string()),
        });
    }

    if Path::new(DOCKER_SOCKET).exists() {
        return Ok(DetectedRuntime {
            runtime_type: RuntimeType::Docker,
            endpoint: Endpoint::Unix(DOCKER_SOCKET.to_string()),
        });
    }

    Err(DetectionError::NoRuntimeFound)
}

fn guess_runtime(endpoint: &Endpoint) -> RuntimeType {
    match endpoint {
        Endpoint::Unix(path) if path.contains("podman") => RuntimeType::Podman,
        _ => RuntimeType::Docker,
    }
}

fn get_uid() -> Option<String> {
    std::env::var("UID").ok().or_else(|| {
        std::fs::read_to_string("/proc/self/status")
            .ok()
            .and_then(|s| {
                s.lines()
                    .find(|l| l.starts_with("Uid:"))
                    .and_then(|l| l.split_whitespace().nth(1))
                    .map(|s| s.to_string())
            })
    })
}

fn default_socket_path(runtime: RuntimeType) -> String {
    match runtime {
        RuntimeType::Docker => DOCKER_SOCKET.to_string(),
        RuntimeType::Podman => ROOTFUL_PODMAN.to_string(),
    }
}
