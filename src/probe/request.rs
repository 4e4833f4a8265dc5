// ABOUTME: Probe request and result types.
// ABOUTME: Describes one HTTP exchange against a published container port.

use bytes::Bytes;
use hyper::Method;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::time::Instant;

const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(5);

/// A request to `http://{host}:{port}{path}`.
#[derive(Debug, Clone)]
pub struct ProbeRequest {
    pub host: String,
    pub port: u16,
    pub path: String,
    pub method: Method,
    pub body: Option<Bytes>,
    pub headers: Vec<(String, String)>,
    /// Bound on a single attempt, connection included.
    pub timeout: Duration,
    /// Retry connection failures until this instant. `None` means one attempt.
    pub retry_until: Option<Instant>,
}

impl ProbeRequest {
    /// A single `GET` attempt.
    pub fn get(host: impl Into<String>, port: u16, path: &str) -> Self {
        Self {
            host: host.into(),
            port,
            path: normalize_path(path),
            method: Method::GET,
            body: None,
            headers: Vec::new(),
            timeout: DEFAULT_ATTEMPT_TIMEOUT,
            retry_until: None,
        }
    }

    /// A `POST` carrying `value` as a JSON body.
    pub fn post_json(
        host: impl Into<String>,
        port: u16,
        path: &str,
        value: &serde_json::Value,
    ) -> Self {
        let mut request = Self::get(host, port, path);
        request.method = Method::POST;
        request.body = Some(Bytes::from(value.to_string()));
        request
            .headers
            .push(("content-type".to_string(), "application/json".to_string()));
        request
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Keep retrying for `window` from now.
    pub fn retry_for(mut self, window: Duration) -> Self {
        self.retry_until = Some(Instant::now() + window);
        self
    }

    pub fn retry_until(mut self, deadline: Instant) -> Self {
        self.retry_until = Some(deadline);
        self
    }

    /// `host:port`, also sent as the `Host` header. IPv6 literals are
    /// bracketed.
    pub fn authority(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}{}", self.authority(), self.path)
    }
}

fn normalize_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

/// Outcome of a probe that got an HTTP response, whatever its status.
#[derive(Debug, Clone)]
pub struct ProbeResult {
    pub status: u16,
    pub body: String,
    /// Time from the first attempt to the response.
    pub elapsed: Duration,
    pub attempts: u32,
}

impl ProbeResult {
    /// Decode the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}
