// ABOUTME: State transition methods for lifecycle runs.
// ABOUTME: Each method consumes self and returns the next state on success.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::diagnostics::{Diagnostics, Warning};
use crate::probe::{ProbeClient, ProbeRequest};
use crate::runtime::{
    ContainerError, ContainerHandle, ContainerOps, ContainerStatus, ImageError, ImageOps, LogOps,
};

use super::error::LifecycleError;
use super::machine::{Lifecycle, RunRecord};
use super::plan::ImageSource;
use super::state::{Created, HasContainer, ImageReady, Init, Probed, Removed, Running, Stopped};

/// Result type for transitions that hand the lifecycle back on failure.
pub type TransitionResult<T, S> = Result<Lifecycle<T>, (Lifecycle<S>, LifecycleError)>;

/// Await `fut` unless `cancel` fires first.
async fn cancellable<F, T, E>(cancel: &CancellationToken, fut: F) -> Result<T, LifecycleError>
where
    F: Future<Output = Result<T, E>>,
    LifecycleError: From<E>,
{
    tokio::select! {
        _ = cancel.cancelled() => Err(LifecycleError::Cancelled),
        result = fut => result.map_err(LifecycleError::from),
    }
}

async fn pause(cancel: &CancellationToken, duration: Duration) -> Result<(), LifecycleError> {
    tokio::select! {
        _ = cancel.cancelled() => Err(LifecycleError::Cancelled),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}

// =============================================================================
// Internal Helpers
// =============================================================================

impl<S> Lifecycle<S> {
    fn map_state<T>(self, f: impl FnOnce(S) -> T) -> Lifecycle<T> {
        Lifecycle {
            record: self.record,
            state: f(self.state),
        }
    }

    /// Remove the image this run pulled or built, if the plan asks for it.
    ///
    /// Failures become warnings.
    pub async fn remove_image<R: ImageOps>(&self, engine: &R, diagnostics: &mut Diagnostics) {
        if !self.record.plan.remove_image || self.record.image.is_none() {
            return;
        }
        let Some(reference) = self.record.plan.source.produced() else {
            return;
        };

        match engine.remove_image(reference, false).await {
            Ok(()) | Err(ImageError::NotFound(_)) => {
                tracing::debug!(image = %reference, "image removed");
            }
            Err(e) => diagnostics.warn(Warning::image_remove_failed(format!(
                "failed to remove image {}: {}",
                reference, e
            ))),
        }
    }
}

/// Stop unless already stopped. Benign errors count as stopped.
async fn stop_container<R: ContainerOps>(
    engine: &R,
    handle: &mut ContainerHandle,
    timeout: Duration,
    diagnostics: &mut Diagnostics,
) {
    if handle.status >= ContainerStatus::Exited {
        return;
    }

    let stopped = engine.stop_container(&handle.id, timeout).await;
    match stopped {
        Ok(()) | Err(ContainerError::AlreadyInState(_)) => {
            let _ = handle.advance(ContainerStatus::Exited);
        }
        Err(ContainerError::NotFound(_)) => {
            let _ = handle.advance(ContainerStatus::Removed);
        }
        Err(e) => diagnostics.warn(Warning::stop_failed(format!(
            "failed to stop container {}: {}",
            handle.label(),
            e
        ))),
    }
}

/// Remove unless already gone. A container that did not stop is removed by force.
async fn remove_container<R: ContainerOps>(
    engine: &R,
    handle: &mut ContainerHandle,
    diagnostics: &mut Diagnostics,
) {
    if handle.is_removed() {
        return;
    }

    let force = handle.status < ContainerStatus::Exited;
    let removed = engine.remove_container(&handle.id, force).await;
    match removed {
        Ok(()) => {}
        Err(e) if e.is_benign() => {
            tracing::debug!(container = %handle.label(), "{}", e);
        }
        Err(e) => {
            diagnostics.warn(Warning::remove_failed(format!(
                "failed to remove container {}: {}",
                handle.label(),
                e
            )));
            return;
        }
    }
    let _ = handle.advance(ContainerStatus::Removed);
}

impl<S: HasContainer> Lifecycle<S> {
    /// Merge a fresh inspect result into the handle.
    ///
    /// A container the runtime no longer knows counts as removed.
    pub async fn refresh<R: ContainerOps>(&mut self, engine: &R) -> Result<(), LifecycleError> {
        let handle = self.state.handle_mut();
        let observed = engine.inspect_container(&handle.id).await;
        match observed {
            Ok(observed) => handle.refresh(observed)?,
            Err(ContainerError::NotFound(_)) => handle.advance(ContainerStatus::Removed)?,
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    /// Stop and remove the container from whatever state the run reached.
    ///
    /// Never fails; problems are recorded in `diagnostics`.
    pub async fn teardown<R: ContainerOps>(
        mut self,
        engine: &R,
        diagnostics: &mut Diagnostics,
    ) -> Lifecycle<Removed> {
        tracing::debug!(container = %self.handle().label(), "tearing down");
        let timeout = self.record.plan.timeouts.stop;
        stop_container(engine, self.state.handle_mut(), timeout, diagnostics).await;
        remove_container(engine, self.state.handle_mut(), diagnostics).await;
        self.map_state(|s| Removed {
            handle: s.into_handle(),
        })
    }
}

// =============================================================================
// Init -> ImageReady
// =============================================================================

impl Lifecycle<Init> {
    /// Pull or build the image, or do nothing for an existing one.
    ///
    /// # Errors
    ///
    /// Returns `(self, error)`; no container exists yet. Build output read
    /// before a failure stays in the record.
    #[must_use = "lifecycle state must be used"]
    pub async fn prepare_image<R: ImageOps>(
        mut self,
        engine: &R,
        cancel: &CancellationToken,
    ) -> TransitionResult<ImageReady, Init> {
        match self.fetch_image(engine, cancel).await {
            Ok(()) => Ok(self.map_state(|_| ImageReady)),
            Err(e) => Err((self, e)),
        }
    }

    async fn fetch_image<R: ImageOps>(
        &mut self,
        engine: &R,
        cancel: &CancellationToken,
    ) -> Result<(), LifecycleError> {
        match self.record.plan.source.clone() {
            ImageSource::Existing => {}
            ImageSource::Pull(reference) => {
                tracing::debug!(image = %reference, "pulling image");
                let image = cancellable(cancel, engine.pull_image(&reference)).await?;
                self.record.image = Some(image);
            }
            ImageSource::Build(spec) => {
                tracing::debug!(tag = %spec.tag, "building image");
                let mut log = cancellable(cancel, engine.build_image(&spec)).await?;
                let lines = &mut self.record.build_log;
                let image = cancellable(cancel, async move {
                    while let Some(line) = log.next_line().await {
                        let line = line?;
                        tracing::debug!("build: {}", line.trim_end());
                        lines.push(line);
                    }
                    log.finish().await
                })
                .await?;
                self.record.image = Some(image);
            }
        }
        Ok(())
    }
}

// =============================================================================
// ImageReady -> Created
// =============================================================================

impl Lifecycle<ImageReady> {
    /// Create the container.
    ///
    /// # Errors
    ///
    /// Returns `(self, error)` so a prepared image can still be cleaned up.
    #[must_use = "lifecycle state must be used"]
    pub async fn create<R: ContainerOps>(
        self,
        engine: &R,
    ) -> TransitionResult<Created, ImageReady> {
        let created = engine.create_container(&self.record.plan.container).await;
        match created {
            Ok(handle) => {
                tracing::debug!(container = %handle.label(), "container created");
                Ok(self.map_state(|_| Created { handle }))
            }
            Err(e) => Err((self, e.into())),
        }
    }
}

// =============================================================================
// Created -> Running
// =============================================================================

impl Lifecycle<Created> {
    /// Start the container. Starting an already running container succeeds.
    #[must_use = "lifecycle state must be used"]
    pub async fn start<R: ContainerOps>(
        mut self,
        engine: &R,
    ) -> TransitionResult<Running, Created> {
        let started = engine.start_container(&self.state.handle.id).await;
        match started {
            Ok(()) | Err(ContainerError::AlreadyInState(_)) => {}
            Err(e) => return Err((self, e.into())),
        }

        if let Err(e) = self.state.handle.advance(ContainerStatus::Running) {
            return Err((self, e.into()));
        }

        tracing::debug!(container = %self.state.handle.label(), "container started");
        Ok(self.map_state(|s| Running { handle: s.handle }))
    }
}

// =============================================================================
// Running
// =============================================================================

impl Lifecycle<Running> {
    /// Wait for an attached container to exit and keep its output.
    ///
    /// # Errors
    ///
    /// `NonZeroExit` if the container failed, `Cancelled` if cancelled first.
    pub async fn await_exit<R: ContainerOps + LogOps>(
        &mut self,
        engine: &R,
        cancel: &CancellationToken,
        diagnostics: &mut Diagnostics,
    ) -> Result<(), LifecycleError> {
        let id = self.state.handle.id.clone();
        let code = cancellable(cancel, engine.wait_container(&id)).await?;
        self.state.handle.advance(ContainerStatus::Exited)?;
        tracing::debug!(container = %self.state.handle.label(), code, "container exited");

        match engine.logs(&id, None).await {
            Ok(text) => self.record.output = Some(text),
            Err(e) => diagnostics.warn(Warning::logs_unavailable(format!(
                "could not read output of {}: {}",
                self.state.handle.label(),
                e
            ))),
        }

        if code != 0 {
            return Err(LifecycleError::NonZeroExit { code });
        }
        Ok(())
    }

    /// Poll until every exposed port is published and the ready log line, if
    /// any, has appeared.
    ///
    /// # Errors
    ///
    /// `NotReady` on timeout or if the container stops first.
    pub async fn wait_ready<R: ContainerOps + LogOps>(
        &mut self,
        engine: &R,
        cancel: &CancellationToken,
    ) -> Result<(), LifecycleError> {
        let ports: Vec<u16> = self
            .record
            .plan
            .container
            .exposed_ports()
            .iter()
            .copied()
            .collect();
        let ready_log = self.record.plan.ready_log.clone();
        if ports.is_empty() && ready_log.is_none() {
            return Ok(());
        }

        let timeouts = self.record.plan.timeouts;
        let deadline = Instant::now() + timeouts.ready;

        loop {
            self.refresh(engine).await?;
            let handle = &self.state.handle;

            if handle.status > ContainerStatus::Running {
                return Err(LifecycleError::NotReady(format!(
                    "{} {} before becoming ready",
                    handle.label(),
                    handle.status
                )));
            }

            let published = ports.iter().all(|p| handle.host_port(*p).is_some());
            if handle.status == ContainerStatus::Running && published {
                let logged = match ready_log.as_deref() {
                    Some(text) => engine.logs(&handle.id, None).await?.contains(text),
                    None => true,
                };
                if logged {
                    tracing::debug!(
                        container = %handle.label(),
                        ports = ?handle.ports,
                        "container ready"
                    );
                    return Ok(());
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(LifecycleError::NotReady(format!(
                    "{} not ready after {:?}",
                    handle.label(),
                    timeouts.ready
                )));
            }
            pause(cancel, timeouts.poll_interval.min(deadline - now)).await?;
        }
    }

    /// Let the container run for the planned time, then keep its log tail.
    pub async fn observe<R: LogOps>(
        &mut self,
        engine: &R,
        cancel: &CancellationToken,
        diagnostics: &mut Diagnostics,
    ) -> Result<(), LifecycleError> {
        if let Some(duration) = self.record.plan.observe {
            tracing::debug!(container = %self.state.handle.label(), ?duration, "observing");
            pause(cancel, duration).await?;
        }

        if let Some(tail) = self.record.plan.log_tail {
            match engine.logs(&self.state.handle.id, Some(tail)).await {
                Ok(text) => self.record.output = Some(text),
                Err(e) => diagnostics.warn(Warning::logs_unavailable(format!(
                    "could not read logs of {}: {}",
                    self.state.handle.label(),
                    e
                ))),
            }
        }
        Ok(())
    }

    /// Probe the published port, if the plan has a probe.
    ///
    /// # Errors
    ///
    /// Returns `(self, error)` so the container can be torn down. The probe
    /// result is kept even when its status is rejected.
    #[must_use = "lifecycle state must be used"]
    pub async fn probe(mut self, client: &ProbeClient) -> TransitionResult<Probed, Running> {
        let Some(spec) = self.record.plan.probe.clone() else {
            return Ok(self.map_state(|s| Probed { handle: s.handle }));
        };

        let Some(host_port) = self.state.handle.host_port(spec.container_port) else {
            let err = LifecycleError::NotReady(format!(
                "container port {} is not published",
                spec.container_port
            ));
            return Err((self, err));
        };

        let timeouts = self.record.plan.timeouts;
        let mut request =
            ProbeRequest::get(self.record.plan.probe_host.clone(), host_port, &spec.path)
                .method(spec.method.clone())
                .timeout(timeouts.probe)
                .retry_for(timeouts.probe_retry);
        request.body = spec.body.clone();
        request.headers.extend(spec.headers.iter().cloned());

        tracing::debug!(url = %request.url(), "probing");
        let outcome = client.probe(&request).await;
        match outcome {
            Ok(result) => {
                let status = result.status;
                self.record.probe = Some(result);
                if spec.accept.contains(&status) {
                    Ok(self.map_state(|s| Probed { handle: s.handle }))
                } else {
                    Err((self, LifecycleError::ProbeRejected { status }))
                }
            }
            Err(e) => Err((self, e.into())),
        }
    }
}

// =============================================================================
// Probed -> Stopped -> Removed
// =============================================================================

impl Lifecycle<Probed> {
    /// Stop the container. Never fails; problems are recorded in `diagnostics`.
    #[must_use = "lifecycle state must be used"]
    pub async fn stop<R: ContainerOps>(
        mut self,
        engine: &R,
        diagnostics: &mut Diagnostics,
    ) -> Lifecycle<Stopped> {
        let timeout = self.record.plan.timeouts.stop;
        stop_container(engine, &mut self.state.handle, timeout, diagnostics).await;
        self.map_state(|s| Stopped { handle: s.handle })
    }
}

impl Lifecycle<Stopped> {
    /// Remove the container. Never fails; problems are recorded in `diagnostics`.
    #[must_use = "lifecycle state must be used"]
    pub async fn remove<R: ContainerOps>(
        mut self,
        engine: &R,
        diagnostics: &mut Diagnostics,
    ) -> Lifecycle<Removed> {
        remove_container(engine, &mut self.state.handle, diagnostics).await;
        self.map_state(|s| Removed { handle: s.handle })
    }
}

// =============================================================================
// Removed - Terminal State
// =============================================================================

impl Lifecycle<Removed> {
    /// Consume the lifecycle, returning what the run produced and the final handle.
    pub fn finish(self) -> (RunRecord, ContainerHandle) {
        (self.record, self.state.handle)
    }
}
