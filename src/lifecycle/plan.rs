// ABOUTME: Run plans: what to prepare, what to run, and how to check it.
// ABOUTME: A plan is built up front and consumed by one lifecycle run.

use std::ops::RangeInclusive;
use std::time::Duration;

use bytes::Bytes;
use hyper::Method;

use crate::runtime::{BuildSpec, ContainerSpec};
use crate::types::ImageRef;

/// Where the container image comes from.
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// Use what is already local. A missing image fails at create.
    Existing,
    /// Pull before creating.
    Pull(ImageRef),
    /// Build from a Dockerfile before creating.
    Build(BuildSpec),
}

impl ImageSource {
    /// The reference this source produces locally, if it produces one.
    pub fn produced(&self) -> Option<&ImageRef> {
        match self {
            ImageSource::Existing => None,
            ImageSource::Pull(reference) => Some(reference),
            ImageSource::Build(spec) => Some(&spec.tag),
        }
    }
}

/// An HTTP check against one exposed container port.
#[derive(Debug, Clone)]
pub struct ProbeSpec {
    pub container_port: u16,
    pub path: String,
    pub method: Method,
    pub body: Option<Bytes>,
    pub headers: Vec<(String, String)>,
    /// Statuses that count as a healthy answer.
    pub accept: RangeInclusive<u16>,
}

impl ProbeSpec {
    /// `GET path` on `container_port`, accepting 200..=399.
    pub fn get(container_port: u16, path: impl Into<String>) -> Self {
        Self {
            container_port,
            path: path.into(),
            method: Method::GET,
            body: None,
            headers: Vec::new(),
            accept: 200..=399,
        }
    }

    /// `POST path` with a JSON body.
    pub fn post_json(
        container_port: u16,
        path: impl Into<String>,
        value: &serde_json::Value,
    ) -> Self {
        let mut spec = Self::get(container_port, path);
        spec.method = Method::POST;
        spec.body = Some(Bytes::from(value.to_string()));
        spec.headers.push(("content-type".to_string(), "application/json".to_string()));
        spec
    }

    pub fn accept(mut self, accept: RangeInclusive<u16>) -> Self {
        self.accept = accept;
        self
    }
}

/// Bounds on the waits of one run.
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    /// Time allowed for ports and log readiness.
    pub ready: Duration,
    pub poll_interval: Duration,
    /// Grace period before the runtime kills a stopping container.
    pub stop: Duration,
    /// Bound on a single probe attempt.
    pub probe: Duration,
    /// Window for retrying probe connection failures.
    pub probe_retry: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            ready: Duration::from_secs(10),
            poll_interval: Duration::from_millis(250),
            stop: Duration::from_secs(10),
            probe: Duration::from_secs(5),
            probe_retry: Duration::from_secs(30),
        }
    }
}

/// Everything one lifecycle run does.
#[derive(Debug, Clone)]
pub struct RunPlan {
    /// Name used in logs and reports.
    pub label: String,
    pub source: ImageSource,
    pub container: ContainerSpec,
    pub probe: Option<ProbeSpec>,
    /// Consider the container ready once its logs contain this text.
    pub ready_log: Option<String>,
    /// Let a detached container run this long before checking it.
    pub observe: Option<Duration>,
    /// Keep the last lines of a detached container's logs as run output.
    pub log_tail: Option<u64>,
    /// Remove the pulled or built image after teardown.
    pub remove_image: bool,
    /// Host used to reach published ports.
    pub probe_host: String,
    pub timeouts: Timeouts,
}

impl RunPlan {
    pub fn new(label: impl Into<String>, container: ContainerSpec) -> Self {
        Self {
            label: label.into(),
            source: ImageSource::Existing,
            container,
            probe: None,
            ready_log: None,
            observe: None,
            log_tail: None,
            remove_image: false,
            probe_host: "127.0.0.1".to_string(),
            timeouts: Timeouts::default(),
        }
    }

    pub fn pull(mut self) -> Self {
        self.source = ImageSource::Pull(self.container.image().clone());
        self
    }

    /// Build `dockerfile` in `spec` first. The container runs the built tag.
    pub fn build(mut self, spec: BuildSpec) -> Self {
        self.source = ImageSource::Build(spec);
        self
    }

    pub fn probe(mut self, probe: ProbeSpec) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn ready_log(mut self, text: impl Into<String>) -> Self {
        self.ready_log = Some(text.into());
        self
    }

    pub fn observe(mut self, duration: Duration) -> Self {
        self.observe = Some(duration);
        self
    }

    pub fn log_tail(mut self, lines: u64) -> Self {
        self.log_tail = Some(lines);
        self
    }

    pub fn remove_image(mut self, remove: bool) -> Self {
        self.remove_image = remove;
        self
    }

    pub fn probe_host(mut self, host: impl Into<String>) -> Self {
        self.probe_host = host.into();
        self
    }

    pub fn timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn pull_uses_container_image() {
        let image = ImageRef::parse("nginx:alpine").unwrap();
        let plan = RunPlan::new("web", ContainerSpec::new(image.clone())).pull();
        assert_eq!(plan.source.produced(), Some(&image));
    }

    #[test]
    fn build_produces_its_tag() {
        let tag = ImageRef::parse("berth-demo:latest").unwrap();
        let plan = RunPlan::new("build", ContainerSpec::new(tag.clone())).build(BuildSpec {
            context: PathBuf::from("."),
            dockerfile: "FROM alpine:latest\n".to_string(),
            tag: tag.clone(),
        });
        assert_eq!(plan.source.produced(), Some(&tag));
    }

    #[test]
    fn existing_source_produces_nothing() {
        let plan = RunPlan::new("x", ContainerSpec::new(ImageRef::parse("alpine").unwrap()));
        assert!(plan.source.produced().is_none());
    }

    #[test]
    fn probe_accepts_success_and_redirects_by_default() {
        let probe = ProbeSpec::get(80, "/");
        assert!(probe.accept.contains(&200));
        assert!(probe.accept.contains(&399));
        assert!(!probe.accept.contains(&404));
    }

    #[test]
    fn json_probe_carries_body_and_narrowed_range() {
        let payload = serde_json::json!({"message": "Hello from a container!"});
        let probe = ProbeSpec::post_json(80, "/post", &payload).accept(200..=200);

        assert_eq!(probe.method, Method::POST);
        let sent: serde_json::Value = serde_json::from_slice(probe.body.as_ref().unwrap()).unwrap();
        assert_eq!(sent, payload);
        assert!(probe.accept.contains(&200));
        assert!(!probe.accept.contains(&201));
    }
}
