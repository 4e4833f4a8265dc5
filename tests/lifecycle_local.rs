// ABOUTME: End-to-end lifecycle tests against the local Docker/Podman daemon.
// ABOUTME: Skipped when no runtime answers; every test must leave no container behind.

mod support;

use berth::lifecycle::{LifecycleController, LifecycleErrorKind, ProbeSpec, RunPlan, Timeouts};
use berth::runtime::{
    BollardRuntime, BuildSpec, ContainerError, ContainerOps, ContainerSpec, ContainerStatus,
    ImageOps, connect_local,
};
use berth::types::ImageRef;
use std::time::Duration;

/// Get local runtime, skipping test if unavailable.
async fn local_runtime() -> Option<BollardRuntime> {
    connect_local(None).await.ok()
}

/// Skip test if no local runtime available.
macro_rules! require_runtime {
    () => {
        match local_runtime().await {
            Some(rt) => rt,
            None => {
                eprintln!("Skipping test: no local container runtime found");
                return;
            }
        }
    };
}

fn image(reference: &str) -> ImageRef {
    ImageRef::parse(reference).expect("valid image ref")
}

async fn assert_gone(runtime: &BollardRuntime, id: &berth::types::ContainerId) {
    match runtime.inspect_container(id).await {
        Err(ContainerError::NotFound(_)) => {}
        other => panic!("container {id} still present: {other:?}"),
    }
}

#[tokio::test]
async fn echo_runs_attached_and_is_removed() {
    support::init_tracing();
    let runtime = require_runtime!();

    let spec = ContainerSpec::new(image("alpine:latest")).command("echo hi");
    let report = LifecycleController::new(&runtime)
        .run(RunPlan::new("echo", spec).pull())
        .await;

    assert!(report.is_success(), "{:?}", report.error());
    assert_eq!(report.output.as_deref().map(str::trim), Some("hi"));
    assert!(report.warnings.is_empty(), "{:?}", report.warnings);

    let container = report.container.expect("container was created");
    assert_eq!(container.status, ContainerStatus::Removed);
    assert_gone(&runtime, &container.id).await;
}

#[tokio::test]
async fn nginx_answers_probe_and_is_removed() {
    support::init_tracing();
    let runtime = require_runtime!();

    let spec = ContainerSpec::new(image("nginx:alpine"))
        .expose(80)
        .detach(true)
        .auto_remove(true);
    let plan = RunPlan::new("nginx", spec)
        .pull()
        .probe(ProbeSpec::get(80, "/"));
    let report = LifecycleController::new(&runtime).run(plan).await;

    assert!(report.is_success(), "{:?}", report.error());
    let probe = report.probe.as_ref().expect("probe ran");
    assert!((200..=399).contains(&probe.status), "status {}", probe.status);
    assert!(
        runtime
            .image_exists(&image("nginx:alpine"))
            .await
            .expect("inspect image"),
        "pulled image stays without remove_image"
    );

    let container = report.container.expect("container was created");
    assert_gone(&runtime, &container.id).await;
}

#[tokio::test]
async fn missing_image_fails_without_diagnostics() {
    support::init_tracing();
    let runtime = require_runtime!();

    let spec = ContainerSpec::new(image("nonexistent-image-xyz:latest"));
    let report = LifecycleController::new(&runtime)
        .run(RunPlan::new("missing", spec))
        .await;

    assert_eq!(
        report.error().map(|e| e.kind()),
        Some(LifecycleErrorKind::ImageNotFound)
    );
    assert!(report.container.is_none());
    assert!(report.warnings.is_empty(), "{:?}", report.warnings);
}

#[tokio::test]
async fn stop_and_remove_are_idempotent() {
    support::init_tracing();
    let runtime = require_runtime!();
    let alpine = image("alpine:latest");
    runtime
        .pull_image(&alpine)
        .await
        .expect("pull should succeed");

    let spec = ContainerSpec::new(alpine).command("sleep 30").detach(true);
    let handle = runtime.create_container(&spec).await.expect("create");
    runtime.start_container(&handle.id).await.expect("start");

    let timeout = Duration::from_secs(1);
    runtime
        .stop_container(&handle.id, timeout)
        .await
        .expect("first stop");
    match runtime.stop_container(&handle.id, timeout).await {
        Ok(()) | Err(ContainerError::AlreadyInState(_)) => {}
        Err(e) => panic!("second stop: {e}"),
    }

    runtime
        .remove_container(&handle.id, false)
        .await
        .expect("first remove");
    match runtime.remove_container(&handle.id, false).await {
        Err(e) if e.is_benign() => {}
        other => panic!("second remove: {other:?}"),
    }
    assert_gone(&runtime, &handle.id).await;
}

#[tokio::test]
async fn concurrent_runs_share_one_engine() {
    support::init_tracing();
    let runtime = require_runtime!();
    let controller = LifecycleController::new(&runtime);

    let first = ContainerSpec::new(image("alpine:latest")).command("echo one");
    let second = ContainerSpec::new(image("alpine:latest")).command("echo two");
    let (a, b) = tokio::join!(
        controller.run(RunPlan::new("one", first).pull()),
        controller.run(RunPlan::new("two", second).pull()),
    );

    assert!(a.is_success(), "{:?}", a.error());
    assert!(b.is_success(), "{:?}", b.error());
    assert_eq!(a.output.as_deref().map(str::trim), Some("one"));
    assert_eq!(b.output.as_deref().map(str::trim), Some("two"));
}

#[tokio::test]
async fn environment_reaches_the_container() {
    support::init_tracing();
    let runtime = require_runtime!();

    let spec = ContainerSpec::new(image("alpine:latest"))
        .env("GREETING", "hello from berth")
        .label("berth.test", "environment")
        .command("echo \"$GREETING\"");
    let report = LifecycleController::new(&runtime)
        .run(RunPlan::new("env", spec).pull())
        .await;

    assert!(report.is_success(), "{:?}", report.error());
    assert_eq!(
        report.output.as_deref().map(str::trim),
        Some("hello from berth")
    );
}

#[tokio::test]
async fn built_image_runs_and_is_removed() {
    support::init_tracing();
    let runtime = require_runtime!();

    let context = tempfile::tempdir().expect("tempdir");
    std::fs::write(context.path().join("message.txt"), "built by berth\n").expect("write");
    let tag = image("berth-test-build:latest");
    let build = BuildSpec {
        context: context.path().to_path_buf(),
        dockerfile: "FROM alpine:latest\nCOPY message.txt /message.txt\nCMD [\"cat\", \"/message.txt\"]\n"
            .to_string(),
        tag: tag.clone(),
    };
    let plan = RunPlan::new("build", ContainerSpec::new(tag.clone()))
        .build(build)
        .remove_image(true);

    let report = LifecycleController::new(&runtime).run(plan).await;

    assert!(report.is_success(), "{:?}", report.error());
    assert!(!report.build_log.is_empty(), "build output was streamed");
    assert_eq!(
        report.output.as_deref().map(str::trim),
        Some("built by berth")
    );
    assert!(
        !runtime.image_exists(&tag).await.expect("inspect image"),
        "built image was removed"
    );
}

#[tokio::test]
async fn httpbin_echoes_posted_json() {
    support::init_tracing();
    let runtime = require_runtime!();

    let payload = serde_json::json!({"message": "Hello from a container!"});
    let spec = ContainerSpec::new(image("kennethreitz/httpbin"))
        .expose(80)
        .detach(true);
    let plan = RunPlan::new("httpbin", spec)
        .pull()
        .ready_log("Listening at:")
        .probe(ProbeSpec::post_json(80, "/post", &payload).accept(200..=200))
        .timeouts(Timeouts {
            ready: Duration::from_secs(60),
            ..Timeouts::default()
        });

    let report = LifecycleController::new(&runtime).run(plan).await;

    assert!(report.is_success(), "{:?}", report.error());
    let probe = report.probe.as_ref().expect("probe ran");
    let echoed: serde_json::Value = probe.json().expect("json reply");
    assert_eq!(echoed["json"], payload);

    let container = report.container.expect("container was created");
    assert_gone(&runtime, &container.id).await;
}
