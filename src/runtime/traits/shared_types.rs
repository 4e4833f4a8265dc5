// ABOUTME: Shared types used across runtime trait definitions.
// ABOUTME: ContainerSpec, ContainerHandle, BuildSpec, ImageHandle, RuntimeMetadata.

use crate::types::{ContainerId, ContainerName, ImageId, ImageRef};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

/// Everything needed to create one container.
///
/// Built once with the consuming setters and never changed afterwards.
#[derive(Debug, Clone)]
pub struct ContainerSpec {
    image: ImageRef,
    command: Option<String>,
    name: Option<ContainerName>,
    exposed_ports: BTreeSet<u16>,
    detach: bool,
    auto_remove: bool,
    env: BTreeMap<String, String>,
    labels: BTreeMap<String, String>,
}

impl ContainerSpec {
    pub fn new(image: ImageRef) -> Self {
        Self {
            image,
            command: None,
            name: None,
            exposed_ports: BTreeSet::new(),
            detach: false,
            auto_remove: false,
            env: BTreeMap::new(),
            labels: BTreeMap::new(),
        }
    }

    /// Command line to run instead of the image default.
    pub fn command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn name(mut self, name: ContainerName) -> Self {
        self.name = Some(name);
        self
    }

    /// Expose a container TCP port on an ephemeral host port.
    pub fn expose(mut self, port: u16) -> Self {
        self.exposed_ports.insert(port);
        self
    }

    pub fn detach(mut self, detach: bool) -> Self {
        self.detach = detach;
        self
    }

    pub fn auto_remove(mut self, auto_remove: bool) -> Self {
        self.auto_remove = auto_remove;
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn image(&self) -> &ImageRef {
        &self.image
    }

    pub fn command_line(&self) -> Option<&str> {
        self.command.as_deref()
    }

    pub fn container_name(&self) -> Option<&ContainerName> {
        self.name.as_ref()
    }

    pub fn exposed_ports(&self) -> &BTreeSet<u16> {
        &self.exposed_ports
    }

    pub fn is_detached(&self) -> bool {
        self.detach
    }

    pub fn is_auto_remove(&self) -> bool {
        self.auto_remove
    }

    pub fn env_vars(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.labels
    }

    /// The command as an argv vector.
    ///
    /// Plain words are split on whitespace. Anything using quoting,
    /// expansion, or operators runs through `sh -c`.
    pub fn argv(&self) -> Option<Vec<String>> {
        let command = self.command.as_deref()?.trim();
        if command.is_empty() {
            return None;
        }

        if command.chars().any(|c| SHELL_CHARS.contains(c)) {
            Some(vec!["sh".to_string(), "-c".to_string(), command.to_string()])
        } else {
            Some(command.split_whitespace().map(str::to_string).collect())
        }
    }
}

const SHELL_CHARS: &str = "'\"`$|&;<>()*?[]{}~#\\\n";

/// Lifecycle status of a container as seen by this crate.
///
/// Ordered: a handle may only move forward through these states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerStatus {
    Created,
    Running,
    Exited,
    Removed,
}

impl std::fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ContainerStatus::Created => "created",
            ContainerStatus::Running => "running",
            ContainerStatus::Exited => "exited",
            ContainerStatus::Removed => "removed",
        };
        write!(f, "{s}")
    }
}

/// A status observation that would move a handle backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("container status cannot move from {from} to {to}")]
pub struct StatusRegression {
    pub from: ContainerStatus,
    pub to: ContainerStatus,
}

/// A container known to the runtime.
#[derive(Debug, Clone, Serialize)]
pub struct ContainerHandle {
    pub id: ContainerId,
    pub name: String,
    pub status: ContainerStatus,
    /// Container port to published host port.
    pub ports: BTreeMap<u16, u16>,
}

impl ContainerHandle {
    pub fn new(id: ContainerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            status: ContainerStatus::Created,
            ports: BTreeMap::new(),
        }
    }

    /// Move to `next`, refusing to go backwards. Re-observing the current
    /// status is a no-op.
    pub fn advance(&mut self, next: ContainerStatus) -> Result<(), StatusRegression> {
        if next < self.status {
            return Err(StatusRegression {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Merge a fresh inspect result into this handle.
    pub fn refresh(&mut self, observed: ContainerHandle) -> Result<(), StatusRegression> {
        self.advance(observed.status)?;
        if !observed.name.is_empty() {
            self.name = observed.name;
        }
        if !observed.ports.is_empty() {
            self.ports = observed.ports;
        }
        Ok(())
    }

    /// Host port published for `container_port`, if any.
    pub fn host_port(&self, container_port: u16) -> Option<u16> {
        self.ports.get(&container_port).copied()
    }

    /// Name if known, otherwise the short id.
    pub fn label(&self) -> &str {
        if self.name.is_empty() {
            self.id.short()
        } else {
            &self.name
        }
    }

    pub fn is_removed(&self) -> bool {
        self.status == ContainerStatus::Removed
    }
}

/// An image build request: a context directory plus Dockerfile text.
#[derive(Debug, Clone)]
pub struct BuildSpec {
    /// Directory sent as the build context. Missing directories send an
    /// empty context.
    pub context: PathBuf,
    /// Dockerfile contents.
    pub dockerfile: String,
    /// Tag applied to the result.
    pub tag: ImageRef,
}

/// An image present in the runtime.
#[derive(Debug, Clone, Serialize)]
pub struct ImageHandle {
    pub id: ImageId,
    /// Repository tags in the order the runtime reports them.
    pub tags: Vec<String>,
}

impl ImageHandle {
    /// First tag, or `<none>` for dangling images.
    pub fn primary_tag(&self) -> &str {
        self.tags.first().map(String::as_str).unwrap_or("<none>")
    }
}

/// Runtime metadata.
#[derive(Debug, Clone)]
pub struct RuntimeMetadata {
    /// Runtime name (e.g., "Docker", "Podman").
    pub name: String,
    /// Server version.
    pub version: String,
    /// API version.
    pub api_version: String,
    pub os: String,
    pub arch: String,
    /// Total containers known to the runtime.
    pub containers: u64,
    /// Containers currently running.
    pub containers_running: u64,
    pub images: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alpine() -> ImageRef {
        ImageRef::parse("alpine:latest").unwrap()
    }

    #[test]
    fn argv_splits_plain_words() {
        let spec = ContainerSpec::new(alpine()).command("echo hi");
        assert_eq!(spec.argv(), Some(vec!["echo".to_string(), "hi".to_string()]));
    }

    #[test]
    fn argv_uses_shell_for_quoting() {
        let spec = ContainerSpec::new(alpine()).command("echo 'Hello from a container!'");
        let argv = spec.argv().unwrap();
        assert_eq!(argv[0], "sh");
        assert_eq!(argv[1], "-c");
        assert_eq!(argv[2], "echo 'Hello from a container!'");
    }

    #[test]
    fn argv_is_none_without_command() {
        assert!(ContainerSpec::new(alpine()).argv().is_none());
        assert!(ContainerSpec::new(alpine()).command("   ").argv().is_none());
    }

    #[test]
    fn advance_moves_forward() {
        let mut handle = ContainerHandle::new(ContainerId::new("c1"), "web");
        handle.advance(ContainerStatus::Running).unwrap();
        handle.advance(ContainerStatus::Running).unwrap();
        handle.advance(ContainerStatus::Removed).unwrap();
        assert!(handle.is_removed());
    }

    #[test]
    fn advance_rejects_regression() {
        let mut handle = ContainerHandle::new(ContainerId::new("c1"), "web");
        handle.advance(ContainerStatus::Exited).unwrap();
        let err = handle.advance(ContainerStatus::Running).unwrap_err();
        assert_eq!(err.from, ContainerStatus::Exited);
        assert_eq!(err.to, ContainerStatus::Running);
        assert_eq!(handle.status, ContainerStatus::Exited);
    }

    #[test]
    fn refresh_keeps_known_ports_when_observation_has_none() {
        let mut handle = ContainerHandle::new(ContainerId::new("c1"), "web");
        handle.ports.insert(80, 49153);

        let observed = ContainerHandle {
            id: ContainerId::new("c1"),
            name: String::new(),
            status: ContainerStatus::Exited,
            ports: BTreeMap::new(),
        };
        handle.refresh(observed).unwrap();

        assert_eq!(handle.host_port(80), Some(49153));
        assert_eq!(handle.name, "web");
        assert_eq!(handle.status, ContainerStatus::Exited);
    }
}
