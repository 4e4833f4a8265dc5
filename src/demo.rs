// ABOUTME: The demonstration run: CLI wrapper, runtime summary, and lifecycle scenarios.
// ABOUTME: Each scenario is a run plan driven by the lifecycle controller.

use std::path::PathBuf;

use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::lifecycle::{LifecycleController, ProbeSpec, RunPlan, RunReport};
use crate::output::Output;
use crate::runtime::{BuildSpec, ContainerSpec, Engine, RuntimeCli, RuntimeError};
use crate::types::{ContainerName, ImageRef};

/// Name of the long-running worker container.
pub const WORKER_NAME: &str = "berth-demo-worker";

/// Label naming the scenario a container belongs to.
pub const SCENARIO_LABEL: &str = "berth.scenario";

/// Images listed in the runtime summary.
const IMAGE_LIST_LIMIT: usize = 5;

const WORKER_COMMAND: &str =
    "i=0; while true; do i=$((i+1)); echo \"tick $i\"; sleep 1; done";

/// Attached run: print a line and exit.
pub fn echo_plan(config: &Config) -> RunPlan {
    let spec = ContainerSpec::new(config.base_image.clone())
        .label(SCENARIO_LABEL, "echo")
        .command("echo hi");
    RunPlan::new("echo", spec)
        .pull()
        .timeouts(config.timeouts.lifecycle())
}

/// Detached nginx, probed over HTTP on its published port.
pub fn web_plan(config: &Config) -> RunPlan {
    let spec = ContainerSpec::new(ImageRef::library("nginx", "alpine"))
        .label(SCENARIO_LABEL, "nginx")
        .expose(80)
        .detach(true)
        .auto_remove(true);
    RunPlan::new("nginx", spec)
        .pull()
        .probe(ProbeSpec::get(80, "/"))
        .probe_host(config.probe_host.clone())
        .timeouts(config.timeouts.lifecycle())
}

/// Named background worker, observed for a while and read back.
pub fn worker_plan(config: &Config) -> Result<RunPlan> {
    let name =
        ContainerName::new(WORKER_NAME).map_err(|e| Error::InvalidConfig(e.to_string()))?;
    let spec = ContainerSpec::new(config.base_image.clone())
        .name(name)
        .label(SCENARIO_LABEL, "worker")
        .command(WORKER_COMMAND)
        .detach(true);
    Ok(RunPlan::new("worker", spec)
        .ready_log("tick")
        .observe(config.timeouts.worker_observe)
        .log_tail(3)
        .timeouts(config.timeouts.lifecycle()))
}

/// Build a small image from Dockerfile text, run it, then drop the image.
pub fn build_plan(config: &Config) -> RunPlan {
    let dockerfile = format!(
        "FROM {}\nRUN echo 'built by berth' > /berth.txt\nCMD [\"cat\", \"/berth.txt\"]\n",
        config.base_image
    );
    let build = BuildSpec {
        context: empty_context(),
        dockerfile,
        tag: config.build_tag.clone(),
    };
    let spec = ContainerSpec::new(config.build_tag.clone()).label(SCENARIO_LABEL, "build");
    RunPlan::new("build", spec)
        .build(build)
        .remove_image(true)
        .timeouts(config.timeouts.lifecycle())
}

/// A directory that does not exist, so the context holds only the Dockerfile.
fn empty_context() -> PathBuf {
    std::env::temp_dir().join("berth-empty-context")
}

/// Drives every scenario against one engine.
pub struct Demo<'a, R> {
    engine: &'a R,
    config: &'a Config,
    output: &'a Output,
    cli: Option<RuntimeCli>,
    cancel: CancellationToken,
}

impl<'a, R: Engine> Demo<'a, R> {
    pub fn new(engine: &'a R, config: &'a Config, output: &'a Output) -> Self {
        Self {
            engine,
            config,
            output,
            cli: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Also exercise the runtime's command-line binary.
    pub fn with_cli(mut self, cli: RuntimeCli) -> Self {
        self.cli = Some(cli);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Run all scenarios and return their reports.
    ///
    /// Fails only if the runtime cannot be queried at all; scenario
    /// failures are in the reports.
    pub async fn run(&self) -> Result<Vec<RunReport>> {
        if let Some(cli) = &self.cli {
            self.cli_wrapper(cli).await;
        }
        self.summary().await?;

        let controller =
            LifecycleController::new(self.engine).with_cancellation(self.cancel.clone());
        let mut reports = Vec::new();

        self.output.section("echo");
        reports.push(self.finish(controller.run(echo_plan(self.config)).await));
        if self.cancel.is_cancelled() {
            return Ok(reports);
        }

        self.output.section("nginx and worker");
        let worker = worker_plan(self.config)?;
        let (web, worker) = tokio::join!(
            controller.run(web_plan(self.config)),
            controller.run(worker),
        );
        reports.push(self.finish(web));
        reports.push(self.finish(worker));
        if self.cancel.is_cancelled() {
            return Ok(reports);
        }

        self.output.section("build");
        reports.push(self.finish(controller.run(build_plan(self.config)).await));

        Ok(reports)
    }

    fn finish(&self, report: RunReport) -> RunReport {
        self.output.report(&report);
        report
    }

    /// Version, containers, and images as the CLI shows them. Failures are
    /// noted and skipped; the API is what the lifecycle depends on.
    async fn cli_wrapper(&self, cli: &RuntimeCli) {
        self.output.section(&format!("{} CLI", cli.binary()));
        let steps = [
            ("version", cli.version().await),
            ("containers", cli.list_containers().await),
            ("images", cli.list_images().await),
        ];
        for (what, result) in steps {
            match result {
                Ok(text) => {
                    self.output.progress(&format!("  {what}:"));
                    self.output.block(&text);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "{what} via CLI failed");
                    self.output.progress(&format!("  {what}: unavailable ({e})"));
                }
            }
        }
    }

    async fn summary(&self) -> Result<()> {
        let info = self.engine.info().await.map_err(RuntimeError::from)?;
        self.output.section("runtime");
        self.output.progress(&format!(
            "  {} {} ({}/{}), {} containers ({} running), {} images",
            info.name,
            info.version,
            info.os,
            info.arch,
            info.containers,
            info.containers_running,
            info.images
        ));

        match self.engine.list_images().await {
            Ok(images) => {
                for image in images.iter().take(IMAGE_LIST_LIMIT) {
                    self.output.progress(&format!(
                        "    {:<40} {}",
                        image.primary_tag(),
                        image.id.short()
                    ));
                }
            }
            Err(e) => tracing::warn!(error = %e, "listing images failed"),
        }
        Ok(())
    }
}

/// Error for a set of reports, if any run failed.
pub fn verdict(reports: &[RunReport]) -> Result<()> {
    match reports.iter().filter(|r| !r.is_success()).count() {
        0 => Ok(()),
        failed => Err(Error::RunsFailed(failed)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TimeoutsConfig;
    use crate::output::OutputMode;
    use crate::runtime::fake::FakeEngine;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn fast_config() -> Config {
        Config {
            timeouts: TimeoutsConfig {
                ready: Duration::from_millis(500),
                poll_interval: Duration::from_millis(20),
                stop: Duration::from_secs(1),
                probe: Duration::from_millis(500),
                probe_retry: Duration::from_secs(1),
                worker_observe: Duration::from_millis(50),
            },
            ..Config::default()
        }
    }

    async fn serve_ok() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            loop {
                let (mut socket, _) = listener.accept().await.unwrap();
                tokio::spawn(async move {
                    let mut buf = [0u8; 4096];
                    let _ = socket.read(&mut buf).await;
                    let _ = socket
                        .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 2\r\n\r\nok")
                        .await;
                });
            }
        });
        port
    }

    #[test]
    fn plans_describe_the_scenarios() {
        let config = Config::default();

        let echo = echo_plan(&config);
        assert!(!echo.container.is_detached());
        assert_eq!(echo.container.command_line(), Some("echo hi"));

        let web = web_plan(&config);
        assert!(web.container.is_detached());
        assert!(web.container.is_auto_remove());
        assert_eq!(web.probe.as_ref().map(|p| p.container_port), Some(80));

        let worker = worker_plan(&config).unwrap();
        assert_eq!(
            worker.container.container_name().map(ContainerName::as_str),
            Some(WORKER_NAME)
        );
        assert_eq!(worker.log_tail, Some(3));

        let build = build_plan(&config);
        assert!(build.remove_image);
        assert_eq!(build.container.image(), &config.build_tag);

        for plan in [&echo, &web, &worker, &build] {
            assert_eq!(
                plan.container.labels().get(SCENARIO_LABEL),
                Some(&plan.label),
                "{}",
                plan.label
            );
        }
    }

    #[test]
    fn build_dockerfile_starts_from_base_image() {
        let config = Config::default();
        let plan = build_plan(&config);
        let crate::lifecycle::ImageSource::Build(spec) = &plan.source else {
            panic!("build plan must build");
        };
        assert!(spec.dockerfile.starts_with("FROM alpine:latest\n"));
    }

    #[tokio::test]
    async fn all_scenarios_succeed_and_clean_up() {
        let port = serve_ok().await;
        let engine = FakeEngine::new()
            .with_registry_image("alpine:latest")
            .with_registry_image("nginx:alpine");
        engine.configure(|b| {
            b.output = "tick 1\ntick 2\ntick 3\ntick 4".to_string();
            b.host_port = Some(port);
        });
        let config = fast_config();
        let output = Output::new(OutputMode::Quiet);

        let reports = Demo::new(&engine, &config, &output).run().await.unwrap();

        assert_eq!(reports.len(), 4);
        for report in &reports {
            assert!(report.is_success(), "{}: {:?}", report.label, report.error());
        }
        assert!(verdict(&reports).is_ok());
        assert_eq!(engine.live_containers(), 0);
        assert!(!engine.has_image("berth-demo:latest"));

        let worker = &reports[2];
        assert_eq!(worker.output.as_deref(), Some("tick 2\ntick 3\ntick 4\n"));
    }

    #[tokio::test]
    async fn failed_runs_are_counted() {
        let engine = FakeEngine::new().with_registry_image("alpine:latest");
        engine.configure(|b| b.output = "tick 1".to_string());
        let config = fast_config();
        let output = Output::new(OutputMode::Quiet);

        let reports = Demo::new(&engine, &config, &output).run().await.unwrap();

        // nginx cannot be pulled; the rest succeed.
        assert!(matches!(verdict(&reports), Err(Error::RunsFailed(1))));
        assert_eq!(engine.live_containers(), 0);
    }

    #[tokio::test]
    async fn unreachable_runtime_stops_before_any_run() {
        let engine = FakeEngine::new();
        engine.configure(|b| b.unreachable = true);
        let config = Config::default();
        let output = Output::new(OutputMode::Quiet);

        let result = Demo::new(&engine, &config, &output).run().await;

        assert!(matches!(result, Err(Error::Runtime(_))));
        assert!(engine.calls().is_empty());
    }
}
