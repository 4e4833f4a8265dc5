// ABOUTME: In-memory engine used by unit tests of the lifecycle controller.
// ABOUTME: Tracks containers and images in a mutex and supports failure injection.

use super::traits::sealed::Sealed;
use super::traits::{
    BuildLog, BuildSpec, ContainerError, ContainerHandle, ContainerOps, ContainerSpec,
    ContainerStatus, ImageError, ImageHandle, ImageOps, LogError, LogLine, LogLines, LogOps,
    LogOptions, LogStream, RuntimeInfo, RuntimeInfoError, RuntimeMetadata,
};
use crate::types::{ContainerId, ImageId, ImageRef};
use async_trait::async_trait;
use futures::{FutureExt, StreamExt};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
struct FakeContainer {
    handle: ContainerHandle,
    spec: ContainerSpec,
    /// Inspect calls left before published ports show up.
    port_delay: u32,
}

#[derive(Debug, Default)]
struct State {
    /// Images present locally.
    local: BTreeSet<String>,
    /// Images a pull can fetch.
    registry: BTreeSet<String>,
    containers: BTreeMap<String, FakeContainer>,
    next_id: u64,
    next_port: u16,
    /// Every status handed out by inspect, per container.
    observed: BTreeMap<String, Vec<ContainerStatus>>,
    calls: Vec<String>,
}

/// Tunable behaviour of the fake.
#[derive(Debug, Clone, Default)]
pub struct FakeBehavior {
    pub unreachable: bool,
    pub exit_code: i64,
    pub output: String,
    /// Inspect calls that report no ports after start.
    pub port_delay: u32,
    /// Never publish ports.
    pub no_ports: bool,
    /// Publish every exposed port on this host port.
    pub host_port: Option<u16>,
    pub fail_stop: bool,
    pub fail_remove: bool,
    pub fail_image_remove: bool,
    pub fail_build: bool,
    /// Make `wait_container` hang until cancelled.
    pub hang_wait: bool,
}

/// A scriptable in-memory runtime.
#[derive(Debug, Clone, Default)]
pub struct FakeEngine {
    state: Arc<Mutex<State>>,
    behavior: Arc<Mutex<FakeBehavior>>,
}

impl FakeEngine {
    pub fn new() -> Self {
        let engine = Self::default();
        engine.state.lock().next_port = 49153;
        engine
    }

    /// Make `reference` available locally.
    pub fn with_local_image(self, reference: &str) -> Self {
        self.state.lock().local.insert(normalize(reference));
        self
    }

    /// Make `reference` pullable.
    pub fn with_registry_image(self, reference: &str) -> Self {
        self.state.lock().registry.insert(normalize(reference));
        self
    }

    pub fn configure(&self, f: impl FnOnce(&mut FakeBehavior)) {
        f(&mut self.behavior.lock());
    }

    /// Containers still known to the engine.
    pub fn live_containers(&self) -> usize {
        self.state.lock().containers.len()
    }

    pub fn has_image(&self, reference: &str) -> bool {
        self.state.lock().local.contains(&normalize(reference))
    }

    /// Statuses reported by inspect for `id`, in order.
    pub fn observed(&self, id: &ContainerId) -> Vec<ContainerStatus> {
        self.state
            .lock()
            .observed
            .get(id.as_str())
            .cloned()
            .unwrap_or_default()
    }

    /// Operation names in call order.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    fn record(&self, call: &str) {
        self.state.lock().calls.push(call.to_string());
    }

    fn behavior(&self) -> FakeBehavior {
        self.behavior.lock().clone()
    }

    fn check_reachable_container(&self) -> Result<(), ContainerError> {
        if self.behavior.lock().unreachable {
            return Err(ContainerError::EngineUnavailable(
                "connection refused".to_string(),
            ));
        }
        Ok(())
    }

    fn check_reachable_image(&self) -> Result<(), ImageError> {
        if self.behavior.lock().unreachable {
            return Err(ImageError::EngineUnavailable(
                "connection refused".to_string(),
            ));
        }
        Ok(())
    }
}

fn normalize(reference: &str) -> String {
    ImageRef::parse(reference)
        .map(|r| r.to_string())
        .unwrap_or_else(|_| reference.to_string())
}

impl Sealed for FakeEngine {}

#[async_trait]
impl ContainerOps for FakeEngine {
    async fn create_container(
        &self,
        spec: &ContainerSpec,
    ) -> Result<ContainerHandle, ContainerError> {
        self.record("create");
        self.check_reachable_container()?;

        let mut state = self.state.lock();
        let image = spec.image().to_string();
        if !state.local.contains(&image) {
            return Err(ContainerError::ImageNotFound(image));
        }

        let name = spec
            .container_name()
            .map(|n| n.to_string())
            .unwrap_or_else(|| format!("fake_{}", state.next_id));
        if state.containers.values().any(|c| c.handle.name == name) {
            return Err(ContainerError::NameConflict(name));
        }

        state.next_id += 1;
        let id = ContainerId::new(format!("{:064x}", state.next_id));
        let handle = ContainerHandle::new(id.clone(), name);
        let port_delay = self.behavior.lock().port_delay;
        state.containers.insert(
            id.as_str().to_string(),
            FakeContainer {
                handle: handle.clone(),
                spec: spec.clone(),
                port_delay,
            },
        );
        Ok(handle)
    }

    async fn start_container(&self, id: &ContainerId) -> Result<(), ContainerError> {
        self.record("start");
        self.check_reachable_container()?;
        let behavior = self.behavior();

        let mut state = self.state.lock();
        let mut next_port = state.next_port;
        let container = state
            .containers
            .get_mut(id.as_str())
            .ok_or_else(|| ContainerError::NotFound(id.to_string()))?;

        if container.handle.status == ContainerStatus::Running {
            return Err(ContainerError::AlreadyInState(id.to_string()));
        }

        container.handle.status = ContainerStatus::Running;
        if !behavior.no_ports {
            for port in container.spec.exposed_ports() {
                let host = match behavior.host_port {
                    Some(host) => host,
                    None => {
                        next_port += 1;
                        next_port - 1
                    }
                };
                container.handle.ports.insert(*port, host);
            }
        }
        if !container.spec.is_detached() && !behavior.hang_wait {
            container.handle.status = ContainerStatus::Exited;
        }
        state.next_port = next_port;
        Ok(())
    }

    async fn stop_container(
        &self,
        id: &ContainerId,
        _timeout: Duration,
    ) -> Result<(), ContainerError> {
        self.record("stop");
        self.check_reachable_container()?;
        if self.behavior.lock().fail_stop {
            return Err(ContainerError::Runtime("stop refused".to_string()));
        }

        let mut state = self.state.lock();
        let container = state
            .containers
            .get_mut(id.as_str())
            .ok_or_else(|| ContainerError::NotFound(id.to_string()))?;

        if container.handle.status != ContainerStatus::Running {
            return Err(ContainerError::AlreadyInState(id.to_string()));
        }
        container.handle.status = ContainerStatus::Exited;

        if container.spec.is_auto_remove() && container.spec.is_detached() {
            state.containers.remove(id.as_str());
        }
        Ok(())
    }

    async fn remove_container(&self, id: &ContainerId, force: bool) -> Result<(), ContainerError> {
        self.record("remove");
        self.check_reachable_container()?;
        if self.behavior.lock().fail_remove {
            return Err(ContainerError::Runtime("remove refused".to_string()));
        }

        let mut state = self.state.lock();
        let container = state
            .containers
            .get(id.as_str())
            .ok_or_else(|| ContainerError::NotFound(id.to_string()))?;

        if container.handle.status == ContainerStatus::Running && !force {
            return Err(ContainerError::Runtime(format!(
                "cannot remove running container {id}"
            )));
        }
        state.containers.remove(id.as_str());
        Ok(())
    }

    async fn inspect_container(&self, id: &ContainerId) -> Result<ContainerHandle, ContainerError> {
        self.record("inspect");
        self.check_reachable_container()?;

        let mut state = self.state.lock();
        let container = state
            .containers
            .get_mut(id.as_str())
            .ok_or_else(|| ContainerError::NotFound(id.to_string()))?;

        let mut handle = container.handle.clone();
        if container.port_delay > 0 && handle.status == ContainerStatus::Running {
            container.port_delay -= 1;
            handle.ports.clear();
        }

        state
            .observed
            .entry(id.as_str().to_string())
            .or_default()
            .push(handle.status);
        Ok(handle)
    }

    async fn wait_container(&self, id: &ContainerId) -> Result<i64, ContainerError> {
        self.record("wait");
        self.check_reachable_container()?;
        let behavior = self.behavior();

        if behavior.hang_wait {
            futures::future::pending::<()>().await;
        }

        if !self.state.lock().containers.contains_key(id.as_str()) {
            return Err(ContainerError::NotFound(id.to_string()));
        }
        Ok(behavior.exit_code)
    }
}

#[async_trait]
impl ImageOps for FakeEngine {
    async fn pull_image(&self, reference: &ImageRef) -> Result<ImageHandle, ImageError> {
        self.record("pull");
        self.check_reachable_image()?;

        let key = reference.to_string();
        let mut state = self.state.lock();
        if !state.registry.contains(&key) {
            return Err(ImageError::NotFound(key));
        }
        state.local.insert(key.clone());
        Ok(ImageHandle {
            id: ImageId::new(format!("sha256:{:x}", key.len())),
            tags: vec![key],
        })
    }

    async fn build_image(&self, spec: &BuildSpec) -> Result<BuildLog, ImageError> {
        self.record("build");
        self.check_reachable_image()?;

        let fail = self.behavior.lock().fail_build;
        let mut lines: Vec<Result<String, ImageError>> = spec
            .dockerfile
            .lines()
            .filter(|l| !l.trim().is_empty())
            .enumerate()
            .map(|(i, l)| Ok(format!("Step {}: {}\n", i + 1, l.trim())))
            .collect();
        if fail {
            lines.push(Err(ImageError::BuildFailed(
                "returned a non-zero code: 1".to_string(),
            )));
        }

        let state = Arc::clone(&self.state);
        let tag = spec.tag.to_string();
        let image = async move {
            state.lock().local.insert(tag.clone());
            Ok(ImageHandle {
                id: ImageId::new("sha256:feedface"),
                tags: vec![tag],
            })
        }
        .boxed();

        Ok(BuildLog::new(futures::stream::iter(lines).boxed(), image))
    }

    async fn image_exists(&self, reference: &ImageRef) -> Result<bool, ImageError> {
        self.check_reachable_image()?;
        Ok(self.state.lock().local.contains(&reference.to_string()))
    }

    async fn remove_image(&self, reference: &ImageRef, _force: bool) -> Result<(), ImageError> {
        self.record("remove_image");
        self.check_reachable_image()?;
        if self.behavior.lock().fail_image_remove {
            return Err(ImageError::InUse(reference.to_string()));
        }
        if !self.state.lock().local.remove(&reference.to_string()) {
            return Err(ImageError::NotFound(reference.to_string()));
        }
        Ok(())
    }

    async fn list_images(&self) -> Result<Vec<ImageHandle>, ImageError> {
        self.check_reachable_image()?;
        Ok(self
            .state
            .lock()
            .local
            .iter()
            .map(|tag| ImageHandle {
                id: ImageId::new(format!("sha256:{:x}", tag.len())),
                tags: vec![tag.clone()],
            })
            .collect())
    }
}

#[async_trait]
impl LogOps for FakeEngine {
    async fn container_logs(
        &self,
        id: &ContainerId,
        opts: &LogOptions,
    ) -> Result<LogLines, LogError> {
        if !self.state.lock().containers.contains_key(id.as_str()) {
            return Err(LogError::ContainerNotFound(id.to_string()));
        }

        let output = self.behavior.lock().output.clone();
        let mut lines: Vec<String> = output.lines().map(|l| format!("{l}\n")).collect();
        if let Some(tail) = opts.tail {
            let keep = lines.len().saturating_sub(tail as usize);
            lines.drain(..keep);
        }

        let items = lines.into_iter().map(|content| {
            Ok(LogLine {
                content,
                stream: LogStream::Stdout,
            })
        });
        Ok(Box::pin(futures::stream::iter(items)))
    }
}

#[async_trait]
impl RuntimeInfo for FakeEngine {
    async fn info(&self) -> Result<RuntimeMetadata, RuntimeInfoError> {
        if self.behavior.lock().unreachable {
            return Err(RuntimeInfoError::ConnectionFailed(
                "connection refused".to_string(),
            ));
        }
        let state = self.state.lock();
        Ok(RuntimeMetadata {
            name: "Fake".to_string(),
            version: "0.0.0".to_string(),
            api_version: "1.0".to_string(),
            os: "linux".to_string(),
            arch: "x86_64".to_string(),
            containers: state.containers.len() as u64,
            containers_running: state
                .containers
                .values()
                .filter(|c| c.handle.status == ContainerStatus::Running)
                .count() as u64,
            images: state.local.len() as u64,
        })
    }

    async fn ping(&self) -> Result<(), RuntimeInfoError> {
        self.info().await.map(|_| ())
    }
}
