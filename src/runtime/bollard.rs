// ABOUTME: Bollard-based container runtime implementation.
// ABOUTME: Supports both Docker and Podman via the Docker-compatible API.

use crate::runtime::traits::sealed::Sealed;
use crate::runtime::traits::{
    BuildLog, BuildSpec, ContainerError, ContainerHandle, ContainerOps, ContainerSpec,
    ContainerStatus, ImageError, ImageHandle, ImageOps, LogError, LogLine, LogLines, LogOps,
    LogOptions, LogStream, RuntimeInfo, RuntimeInfoError, RuntimeMetadata,
};
use crate::runtime::detection::detect_local;
use crate::runtime::error::RuntimeError;
use crate::runtime::types::{DetectedRuntime, Endpoint, RuntimeConfig, RuntimeType};
use crate::types::{ContainerId, ImageId, ImageRef};
use async_trait::async_trait;
use bollard::Docker;
use bollard::models::{ContainerCreateBody, ContainerStateStatusEnum, HostConfig};
use bollard::query_parameters::{
    BuildImageOptions, CreateContainerOptions, CreateImageOptions, InspectContainerOptions,
    ListImagesOptions, LogsOptions, RemoveContainerOptions, RemoveImageOptions,
    StopContainerOptions, WaitContainerOptions,
};
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::{FutureExt, StreamExt};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc;

/// Name the Dockerfile text is stored under inside the build context.
const DOCKERFILE_NAME: &str = "Dockerfile.berth";

/// Request timeout for every call except waiting on a container.
const REQUEST_TIMEOUT_SECS: u64 = 120;

/// Request timeout while waiting for an attached container to exit.
const WAIT_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// Build log lines buffered ahead of the reader.
const BUILD_LOG_BUFFER: usize = 64;

/// Label applied to every container this crate creates.
pub const MANAGED_LABEL: &str = "berth.managed";

// =============================================================================
// Error Mapping Helpers
// =============================================================================

/// Transport-level failures: the runtime could not be reached at all.
fn is_unreachable(e: &bollard::errors::Error) -> bool {
    matches!(
        e,
        bollard::errors::Error::IOError { .. }
            | bollard::errors::Error::HyperResponseError { .. }
            | bollard::errors::Error::RequestTimeoutError { .. }
    )
}

fn map_image_pull_error(e: bollard::errors::Error, image_name: &str) -> ImageError {
    match &e {
        _ if is_unreachable(&e) => ImageError::EngineUnavailable(e.to_string()),
        bollard::errors::Error::DockerResponseServerError { status_code, .. }
            if *status_code == 404 =>
        {
            ImageError::NotFound(image_name.to_string())
        }
        bollard::errors::Error::DockerStreamError { error } if is_missing_image(error) => {
            ImageError::NotFound(format!("{}: {}", image_name, error))
        }
        _ => ImageError::PullFailed(format!("{}: {}", image_name, e)),
    }
}

fn is_missing_image(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("manifest unknown")
        || message.contains("not found")
        || message.contains("does not exist")
}

fn map_image_inspect_error(e: bollard::errors::Error, image_name: &str) -> ImageError {
    match &e {
        _ if is_unreachable(&e) => ImageError::EngineUnavailable(e.to_string()),
        bollard::errors::Error::DockerResponseServerError { status_code, .. }
            if *status_code == 404 =>
        {
            ImageError::NotFound(image_name.to_string())
        }
        _ => ImageError::Runtime(format!("failed to inspect {}: {}", image_name, e)),
    }
}

fn map_image_remove_error(e: bollard::errors::Error, image_name: &str) -> ImageError {
    match &e {
        _ if is_unreachable(&e) => ImageError::EngineUnavailable(e.to_string()),
        bollard::errors::Error::DockerResponseServerError { status_code, .. }
            if *status_code == 404 =>
        {
            ImageError::NotFound(image_name.to_string())
        }
        bollard::errors::Error::DockerResponseServerError { status_code, .. }
            if *status_code == 409 =>
        {
            ImageError::InUse(image_name.to_string())
        }
        _ => ImageError::Runtime(format!("failed to remove {}: {}", image_name, e)),
    }
}

fn map_build_error(e: bollard::errors::Error) -> ImageError {
    if is_unreachable(&e) {
        ImageError::EngineUnavailable(e.to_string())
    } else {
        ImageError::BuildFailed(e.to_string())
    }
}

fn map_container_create_error(e: bollard::errors::Error) -> ContainerError {
    match &e {
        _ if is_unreachable(&e) => ContainerError::EngineUnavailable(e.to_string()),
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 404 => ContainerError::ImageNotFound(message.clone()),
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 409 => ContainerError::NameConflict(message.clone()),
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 400 => ContainerError::InvalidConfig(message.clone()),
        _ => ContainerError::Runtime(e.to_string()),
    }
}

/// Start and stop answer 304 when the container is already there.
fn map_container_transition_error(e: bollard::errors::Error) -> ContainerError {
    match &e {
        _ if is_unreachable(&e) => ContainerError::EngineUnavailable(e.to_string()),
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 404 => ContainerError::NotFound(message.clone()),
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 304 => ContainerError::AlreadyInState(message.clone()),
        _ => ContainerError::Runtime(e.to_string()),
    }
}

fn map_container_remove_error(e: bollard::errors::Error) -> ContainerError {
    match &e {
        _ if is_unreachable(&e) => ContainerError::EngineUnavailable(e.to_string()),
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 404 => ContainerError::NotFound(message.clone()),
        // Auto-removed containers report a removal already in flight.
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 409 && message.contains("in progress") => {
            ContainerError::AlreadyInState(message.clone())
        }
        _ => ContainerError::Runtime(e.to_string()),
    }
}

fn map_container_not_found_error(e: bollard::errors::Error) -> ContainerError {
    match &e {
        _ if is_unreachable(&e) => ContainerError::EngineUnavailable(e.to_string()),
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 404 => ContainerError::NotFound(message.clone()),
        _ => ContainerError::Runtime(e.to_string()),
    }
}

/// A wait that outlives its request timeout still has a live engine behind it.
fn map_wait_error(e: bollard::errors::Error, id: &ContainerId) -> ContainerError {
    match e {
        bollard::errors::Error::RequestTimeoutError => ContainerError::Runtime(format!(
            "{} still running after {}s",
            id,
            WAIT_TIMEOUT.as_secs()
        )),
        e => map_container_not_found_error(e),
    }
}

fn map_status(status: ContainerStateStatusEnum) -> ContainerStatus {
    match status {
        ContainerStateStatusEnum::CREATED => ContainerStatus::Created,
        ContainerStateStatusEnum::RUNNING
        | ContainerStateStatusEnum::PAUSED
        | ContainerStateStatusEnum::RESTARTING => ContainerStatus::Running,
        _ => ContainerStatus::Exited,
    }
}

/// Parse the `"80/tcp" -> [{HostPort: "49153"}]` port map.
fn published_ports(
    ports: &HashMap<String, Option<Vec<bollard::models::PortBinding>>>,
) -> BTreeMap<u16, u16> {
    let mut published = BTreeMap::new();
    for (key, bindings) in ports {
        let Some(container_port) = key.split('/').next().and_then(|p| p.parse::<u16>().ok())
        else {
            continue;
        };
        let host_port = bindings
            .iter()
            .flatten()
            .filter_map(|b| b.host_port.as_deref())
            .find_map(|p| p.parse::<u16>().ok());
        if let Some(host_port) = host_port {
            published.insert(container_port, host_port);
        }
    }
    published
}

/// Tar up the build context with the Dockerfile text appended.
fn build_context(context: &Path, dockerfile: &str) -> std::io::Result<Vec<u8>> {
    let mut ar = tar::Builder::new(Vec::new());

    if context.is_dir() {
        ar.append_dir_all(".", context)?;
    }

    let mut header = tar::Header::new_gnu();
    header.set_path(DOCKERFILE_NAME)?;
    header.set_size(dockerfile.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    ar.append(&header, dockerfile.as_bytes())?;

    ar.into_inner()
}

/// Split one build stream item into log lines, or the error it carries.
fn build_items(
    item: Result<bollard::models::BuildInfo, bollard::errors::Error>,
) -> Vec<Result<String, ImageError>> {
    match item {
        Ok(info) => match info.error_detail {
            Some(detail) => vec![Err(ImageError::BuildFailed(
                detail
                    .message
                    .unwrap_or_else(|| "unknown build error".to_string()),
            ))],
            None => info
                .stream
                .map(|text| {
                    text.lines()
                        .map(str::trim_end)
                        .filter(|l| !l.is_empty())
                        .map(|l| Ok(l.to_string()))
                        .collect()
                })
                .unwrap_or_default(),
        },
        Err(e) => vec![Err(map_build_error(e))],
    }
}

/// Stream build output from a task that owns its client.
///
/// The build request is sent when the stream is first polled. Dropping the
/// stream ends the task at its next line.
fn build_lines(
    client: Docker,
    options: BuildImageOptions,
    context: Bytes,
) -> BoxStream<'static, Result<String, ImageError>> {
    futures::stream::once(async move {
        let (tx, rx) = mpsc::channel(BUILD_LOG_BUFFER);
        tokio::spawn(async move {
            let mut stream = client.build_image(options, None, Some(bollard::body_full(context)));
            while let Some(item) = stream.next().await {
                for line in build_items(item) {
                    if tx.send(line).await.is_err() {
                        return;
                    }
                }
            }
        });
        futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|line| (line, rx))
        })
    })
    .flatten()
    .boxed()
}

// =============================================================================
// BollardRuntime
// =============================================================================

/// Container runtime implementation using bollard.
///
/// Cheap to share: the underlying client multiplexes requests, so one
/// instance serves any number of concurrent lifecycle runs by reference.
pub struct BollardRuntime {
    client: Docker,
    runtime_type: RuntimeType,
}

impl BollardRuntime {
    /// Create a new BollardRuntime from a Docker client.
    pub fn new(client: Docker, runtime_type: RuntimeType) -> Self {
        Self {
            client,
            runtime_type,
        }
    }

    /// Connect to a detected or configured runtime.
    ///
    /// No request is made here; an unreachable runtime surfaces on first use.
    pub fn connect(runtime: &DetectedRuntime) -> Result<Self, RuntimeInfoError> {
        let client = match &runtime.endpoint {
            Endpoint::Unix(path) => Docker::connect_with_unix(
                path,
                REQUEST_TIMEOUT_SECS,
                bollard::API_DEFAULT_VERSION,
            ),
            Endpoint::Tcp(addr) => Docker::connect_with_http(
                addr,
                REQUEST_TIMEOUT_SECS,
                bollard::API_DEFAULT_VERSION,
            ),
        }
        .map_err(|e| RuntimeInfoError::ConnectionFailed(e.to_string()))?;

        Ok(Self::new(client, runtime.runtime_type))
    }

    /// Get the runtime type (Docker or Podman).
    pub fn runtime_type(&self) -> RuntimeType {
        self.runtime_type
    }
}

impl Sealed for BollardRuntime {}

#[async_trait]
impl RuntimeInfo for BollardRuntime {
    async fn info(&self) -> Result<RuntimeMetadata, RuntimeInfoError> {
        let info = self
            .client
            .info()
            .await
            .map_err(|e| RuntimeInfoError::ConnectionFailed(e.to_string()))?;

        let name = match self.runtime_type {
            RuntimeType::Docker => "Docker".to_string(),
            RuntimeType::Podman => "Podman".to_string(),
        };

        Ok(RuntimeMetadata {
            name,
            version: info.server_version.unwrap_or_default(),
            api_version: bollard::API_DEFAULT_VERSION.to_string(),
            os: info.operating_system.unwrap_or_default(),
            arch: info.architecture.unwrap_or_default(),
            containers: info.containers.unwrap_or_default().max(0) as u64,
            containers_running: info.containers_running.unwrap_or_default().max(0) as u64,
            images: info.images.unwrap_or_default().max(0) as u64,
        })
    }

    async fn ping(&self) -> Result<(), RuntimeInfoError> {
        self.client
            .ping()
            .await
            .map_err(|e| RuntimeInfoError::ConnectionFailed(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl ImageOps for BollardRuntime {
    async fn pull_image(&self, reference: &ImageRef) -> Result<ImageHandle, ImageError> {
        let image_name = reference.to_string();

        let opts = CreateImageOptions {
            from_image: Some(image_name.clone()),
            ..Default::default()
        };

        // Progress updates are not interesting; errors can arrive mid-stream.
        let mut stream = self.client.create_image(Some(opts), None, None);
        while let Some(result) = stream.next().await {
            result.map_err(|e| map_image_pull_error(e, &image_name))?;
        }

        let details = self
            .client
            .inspect_image(&image_name)
            .await
            .map_err(|e| map_image_inspect_error(e, &image_name))?;

        tracing::debug!(image = %image_name, "pulled image");

        Ok(ImageHandle {
            id: ImageId::new(details.id.unwrap_or_default()),
            tags: details.repo_tags.unwrap_or_default(),
        })
    }

    async fn build_image(&self, spec: &BuildSpec) -> Result<BuildLog, ImageError> {
        let context = spec.context.clone();
        let dockerfile = spec.dockerfile.clone();
        let tar_data = tokio::task::spawn_blocking(move || build_context(&context, &dockerfile))
            .await
            .map_err(|e| ImageError::BuildFailed(format!("context packaging panicked: {}", e)))?
            .map_err(|e| {
                ImageError::BuildFailed(format!(
                    "failed to package build context {}: {}",
                    spec.context.display(),
                    e
                ))
            })?;

        let tag = spec.tag.to_string();
        let options = BuildImageOptions {
            dockerfile: DOCKERFILE_NAME.to_string(),
            t: Some(tag.clone()),
            ..Default::default()
        };

        let lines = build_lines(self.client.clone(), options, Bytes::from(tar_data));

        let client = self.client.clone();
        let image = async move {
            let details = client
                .inspect_image(&tag)
                .await
                .map_err(|e| map_image_inspect_error(e, &tag))?;
            Ok(ImageHandle {
                id: ImageId::new(details.id.unwrap_or_default()),
                tags: details.repo_tags.unwrap_or_default(),
            })
        }
        .boxed();

        Ok(BuildLog::new(lines, image))
    }

    async fn image_exists(&self, reference: &ImageRef) -> Result<bool, ImageError> {
        let image_name = reference.to_string();

        match self.client.inspect_image(&image_name).await {
            Ok(_) => Ok(true),
            Err(e) => match map_image_inspect_error(e, &image_name) {
                ImageError::NotFound(_) => Ok(false),
                other => Err(other),
            },
        }
    }

    async fn remove_image(&self, reference: &ImageRef, force: bool) -> Result<(), ImageError> {
        let image_name = reference.to_string();

        let opts = RemoveImageOptions {
            force,
            ..Default::default()
        };

        self.client
            .remove_image(&image_name, Some(opts), None)
            .await
            .map_err(|e| map_image_remove_error(e, &image_name))?;

        Ok(())
    }

    async fn list_images(&self) -> Result<Vec<ImageHandle>, ImageError> {
        let images = self
            .client
            .list_images(Some(ListImagesOptions::default()))
            .await
            .map_err(|e| {
                if is_unreachable(&e) {
                    ImageError::EngineUnavailable(e.to_string())
                } else {
                    ImageError::Runtime(e.to_string())
                }
            })?;

        Ok(images
            .into_iter()
            .map(|image| ImageHandle {
                id: ImageId::new(image.id),
                tags: image
                    .repo_tags
                    .into_iter()
                    .filter(|t| t != "<none>:<none>")
                    .collect(),
            })
            .collect())
    }
}

#[async_trait]
impl ContainerOps for BollardRuntime {
    async fn create_container(
        &self,
        spec: &ContainerSpec,
    ) -> Result<ContainerHandle, ContainerError> {
        let env: Vec<String> = spec
            .env_vars()
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();

        let mut labels: HashMap<String, String> = spec
            .labels()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        labels.insert(MANAGED_LABEL.to_string(), "true".to_string());

        let exposed_ports: Vec<String> = spec
            .exposed_ports()
            .iter()
            .map(|port| format!("{}/tcp", port))
            .collect();

        // Exposed ports land on ephemeral host ports; inspect reports which.
        // Attached runs read output after exit, so the daemon must not
        // remove them first; teardown does.
        let host_config = HostConfig {
            auto_remove: Some(spec.is_auto_remove() && spec.is_detached()),
            publish_all_ports: Some(!exposed_ports.is_empty()),
            ..Default::default()
        };

        let body = ContainerCreateBody {
            image: Some(spec.image().to_string()),
            cmd: spec.argv(),
            env: if env.is_empty() { None } else { Some(env) },
            labels: Some(labels),
            exposed_ports: if exposed_ports.is_empty() {
                None
            } else {
                Some(exposed_ports)
            },
            host_config: Some(host_config),
            ..Default::default()
        };

        let opts = CreateContainerOptions {
            name: spec.container_name().map(|n| n.to_string()),
            ..Default::default()
        };

        let response = self
            .client
            .create_container(Some(opts), body)
            .await
            .map_err(map_container_create_error)?;

        for warning in &response.warnings {
            tracing::warn!(container = %response.id, "{}", warning);
        }

        let name = spec
            .container_name()
            .map(|n| n.to_string())
            .unwrap_or_default();
        Ok(ContainerHandle::new(ContainerId::new(response.id), name))
    }

    async fn start_container(&self, id: &ContainerId) -> Result<(), ContainerError> {
        self.client
            .start_container(
                id.as_str(),
                None::<bollard::query_parameters::StartContainerOptions>,
            )
            .await
            .map_err(map_container_transition_error)
    }

    async fn stop_container(
        &self,
        id: &ContainerId,
        timeout: Duration,
    ) -> Result<(), ContainerError> {
        let opts = StopContainerOptions {
            t: Some(timeout.as_secs() as i32),
            signal: None,
        };

        self.client
            .stop_container(id.as_str(), Some(opts))
            .await
            .map_err(map_container_transition_error)
    }

    async fn remove_container(&self, id: &ContainerId, force: bool) -> Result<(), ContainerError> {
        let opts = RemoveContainerOptions {
            force,
            ..Default::default()
        };

        self.client
            .remove_container(id.as_str(), Some(opts))
            .await
            .map_err(map_container_remove_error)
    }

    async fn inspect_container(&self, id: &ContainerId) -> Result<ContainerHandle, ContainerError> {
        let details = self
            .client
            .inspect_container(id.as_str(), None::<InspectContainerOptions>)
            .await
            .map_err(map_container_not_found_error)?;

        let status = details
            .state
            .as_ref()
            .and_then(|s| s.status)
            .map(map_status)
            .unwrap_or(ContainerStatus::Exited);

        let ports = details
            .network_settings
            .as_ref()
            .and_then(|n| n.ports.as_ref())
            .map(published_ports)
            .unwrap_or_default();

        Ok(ContainerHandle {
            id: id.clone(),
            name: details
                .name
                .unwrap_or_default()
                .trim_start_matches('/')
                .to_string(),
            status,
            ports,
        })
    }

    async fn wait_container(&self, id: &ContainerId) -> Result<i64, ContainerError> {
        // The wait response arrives only at exit, so the request timeout
        // bounds how long a container may run, not how fast the engine is.
        let client = self.client.clone().with_timeout(WAIT_TIMEOUT);
        let mut stream = client.wait_container(id.as_str(), None::<WaitContainerOptions>);

        match stream.next().await {
            Some(Ok(response)) => Ok(response.status_code),
            // bollard reports a non-zero exit as an error carrying the code.
            Some(Err(bollard::errors::Error::DockerContainerWaitError { code, .. })) => Ok(code),
            Some(Err(e)) => Err(map_wait_error(e, id)),
            None => Err(ContainerError::Runtime(format!(
                "wait on {} ended without an exit status",
                id
            ))),
        }
    }
}

#[async_trait]
impl LogOps for BollardRuntime {
    async fn container_logs(
        &self,
        id: &ContainerId,
        opts: &LogOptions,
    ) -> Result<LogLines, LogError> {
        let log_opts = LogsOptions {
            stdout: opts.stdout,
            stderr: opts.stderr,
            follow: opts.follow,
            tail: opts
                .tail
                .map(|n| n.to_string())
                .unwrap_or_else(|| "all".to_string()),
            ..Default::default()
        };

        let container = id.to_string();
        let stream = self.client.logs(id.as_str(), Some(log_opts));

        let mapped_stream = stream.map(move |result| {
            result
                .map(|output| {
                    let (stream_type, data) = match output {
                        bollard::container::LogOutput::StdErr { message } => {
                            (LogStream::Stderr, message)
                        }
                        bollard::container::LogOutput::StdOut { message }
                        | bollard::container::LogOutput::StdIn { message }
                        | bollard::container::LogOutput::Console { message } => {
                            (LogStream::Stdout, message)
                        }
                    };

                    LogLine {
                        content: String::from_utf8_lossy(&data).to_string(),
                        stream: stream_type,
                    }
                })
                .map_err(|e| match e {
                    bollard::errors::Error::DockerResponseServerError {
                        status_code: 404, ..
                    } => LogError::ContainerNotFound(container.clone()),
                    e if is_unreachable(&e) => LogError::Runtime(e.to_string()),
                    e => LogError::StreamError(e.to_string()),
                })
        });

        Ok(Box::pin(mapped_stream))
    }
}

// =============================================================================
// Local Connection
// =============================================================================

/// Detect the local runtime, connect to it, and check that it answers.
///
/// `config` overrides detection when it names a runtime or socket.
pub async fn connect_local(
    config: Option<&RuntimeConfig>,
) -> Result<BollardRuntime, RuntimeError> {
    let detected = detect_local(config)?;
    tracing::debug!(
        runtime = %detected.runtime_type,
        endpoint = %detected.endpoint,
        "connecting to runtime"
    );

    let runtime = BollardRuntime::connect(&detected)?;
    runtime.ping().await?;
    Ok(runtime)
}
