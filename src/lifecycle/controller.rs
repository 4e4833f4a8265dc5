// ABOUTME: Drives a run plan through every lifecycle state.
// ABOUTME: Guarantees teardown of any created container, whatever failed.

use std::time::Instant;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::diagnostics::Diagnostics;
use crate::probe::ProbeClient;
use crate::runtime::Engine;

use super::error::LifecycleError;
use super::machine::{Lifecycle, RunRecord};
use super::plan::RunPlan;
use super::report::RunReport;
use super::state::{HasContainer, Removed};

/// Runs plans against one engine.
///
/// Holds the engine by reference; several controllers may share it and run
/// concurrently.
pub struct LifecycleController<'a, R> {
    engine: &'a R,
    probe: ProbeClient,
    cancel: CancellationToken,
}

impl<'a, R: Engine> LifecycleController<'a, R> {
    pub fn new(engine: &'a R) -> Self {
        let cancel = CancellationToken::new();
        Self {
            engine,
            probe: ProbeClient::new().with_cancellation(cancel.clone()),
            cancel,
        }
    }

    /// Abort waits and probes when `token` fires. Teardown still runs.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.probe = self.probe.with_cancellation(token.clone());
        self.cancel = token;
        self
    }

    pub fn with_probe_client(mut self, client: ProbeClient) -> Self {
        self.probe = client.with_cancellation(self.cancel.clone());
        self
    }

    /// Run `plan` to completion.
    ///
    /// Never returns early with a live container: every failure after
    /// creation goes through teardown before the report is built.
    pub async fn run(&self, plan: RunPlan) -> RunReport {
        let started_at = Utc::now();
        let started = Instant::now();
        let label = plan.label.clone();
        let mut diagnostics = Diagnostics::default();
        tracing::debug!(run = %label, "run starting");

        let (record, container, outcome) = match self.drive(plan, &mut diagnostics).await {
            Driven::NoContainer(record, outcome) => (record, None, outcome),
            Driven::TornDown(lifecycle, outcome) => {
                let (record, handle) = lifecycle.finish();
                (record, Some(handle), outcome)
            }
        };

        match &outcome {
            Ok(()) => tracing::info!(run = %label, "run succeeded"),
            Err(e) => tracing::info!(run = %label, error = %e, "run failed"),
        }

        RunReport::new(
            record,
            container,
            outcome,
            diagnostics.into_warnings(),
            started_at,
            started.elapsed(),
        )
    }

    async fn drive(&self, plan: RunPlan, diagnostics: &mut Diagnostics) -> Driven {
        let engine = self.engine;

        let ready = match Lifecycle::new(plan)
            .prepare_image(engine, &self.cancel)
            .await
        {
            Ok(ready) => ready,
            Err((init, e)) => return Driven::NoContainer(init.into_record(), Err(e)),
        };

        let created = match ready.create(engine).await {
            Ok(created) => created,
            Err((ready, e)) => {
                ready.remove_image(engine, diagnostics).await;
                return Driven::NoContainer(ready.into_record(), Err(e));
            }
        };

        let mut running = match created.start(engine).await {
            Ok(running) => running,
            Err((created, e)) => return self.abort(created, e, diagnostics).await,
        };

        if !running.plan().container.is_detached() {
            if let Err(e) = running.await_exit(engine, &self.cancel, diagnostics).await {
                return self.abort(running, e, diagnostics).await;
            }
        } else {
            if let Err(e) = running.wait_ready(engine, &self.cancel).await {
                return self.abort(running, e, diagnostics).await;
            }
            if let Err(e) = running.observe(engine, &self.cancel, diagnostics).await {
                return self.abort(running, e, diagnostics).await;
            }
        }

        let mut probed = match running.probe(&self.probe).await {
            Ok(probed) => probed,
            Err((running, e)) => return self.abort(running, e, diagnostics).await,
        };

        if let Err(e) = probed.refresh(engine).await {
            return self.abort(probed, e, diagnostics).await;
        }
        tracing::debug!(
            container = %probed.handle().label(),
            status = %probed.handle().status,
            "container inspected"
        );

        let removed = probed
            .stop(engine, diagnostics)
            .await
            .remove(engine, diagnostics)
            .await;
        removed.remove_image(engine, diagnostics).await;
        Driven::TornDown(removed, Ok(()))
    }

    /// Tear down after a failure, keeping `error` as the outcome.
    async fn abort<S: HasContainer>(
        &self,
        lifecycle: Lifecycle<S>,
        error: LifecycleError,
        diagnostics: &mut Diagnostics,
    ) -> Driven {
        tracing::debug!(error = %error, "run failed, cleaning up");
        let removed = lifecycle.teardown(self.engine, diagnostics).await;
        removed.remove_image(self.engine, diagnostics).await;
        Driven::TornDown(removed, Err(error))
    }
}

/// How far a run got before it ended.
enum Driven {
    NoContainer(RunRecord, Result<(), LifecycleError>),
    TornDown(Lifecycle<Removed>, Result<(), LifecycleError>),
}
