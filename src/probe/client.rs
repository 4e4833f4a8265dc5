// ABOUTME: HTTP/1.1 probe client over a plain TCP connection.
// ABOUTME: Retries connection failures with a fixed backoff until the request deadline.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper_util::rt::TokioIo;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::error::ProbeError;
use super::request::{ProbeRequest, ProbeResult};

/// Pause between attempts of a retried probe.
pub const DEFAULT_BACKOFF: Duration = Duration::from_millis(500);

/// Sends probe requests. Never touches container state.
#[derive(Debug, Clone)]
pub struct ProbeClient {
    backoff: Duration,
    cancel: CancellationToken,
}

impl Default for ProbeClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ProbeClient {
    pub fn new() -> Self {
        Self {
            backoff: DEFAULT_BACKOFF,
            cancel: CancellationToken::new(),
        }
    }

    /// Abort in-flight probes and pending retries when `token` fires.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Send `request`, retrying connection failures while its deadline allows.
    ///
    /// Any HTTP response is a result, including 4xx and 5xx.
    pub async fn probe(&self, request: &ProbeRequest) -> Result<ProbeResult, ProbeError> {
        let started = Instant::now();
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            let outcome = tokio::select! {
                _ = self.cancel.cancelled() => return Err(ProbeError::Cancelled),
                outcome = self.attempt(request) => outcome,
            };

            let err = match outcome {
                Ok((status, body)) => {
                    tracing::debug!(url = %request.url(), status, attempts, "probe answered");
                    return Ok(ProbeResult {
                        status,
                        body,
                        elapsed: started.elapsed(),
                        attempts,
                    });
                }
                Err(e) => e,
            };

            let deadline = match request.retry_until {
                Some(deadline) if err.is_retryable() => deadline,
                _ => return Err(err),
            };

            let now = Instant::now();
            if now >= deadline {
                return Err(ProbeError::ProbeTimeout {
                    attempts,
                    elapsed: started.elapsed(),
                    last: err.to_string(),
                });
            }

            tracing::debug!(url = %request.url(), attempts, error = %err, "probe retrying");
            let pause = self.backoff.min(deadline - now);
            tokio::select! {
                _ = self.cancel.cancelled() => return Err(ProbeError::Cancelled),
                _ = tokio::time::sleep(pause) => {}
            }
        }
    }

    /// One attempt, bounded by the request timeout and the retry deadline.
    async fn attempt(&self, request: &ProbeRequest) -> Result<(u16, String), ProbeError> {
        let budget = match request.retry_until {
            Some(deadline) => request
                .timeout
                .min(deadline.saturating_duration_since(Instant::now())),
            None => request.timeout,
        };
        if budget.is_zero() {
            return Err(ProbeError::AttemptTimeout(budget));
        }

        match tokio::time::timeout(budget, exchange(request)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ProbeError::AttemptTimeout(budget)),
        }
    }
}

async fn exchange(request: &ProbeRequest) -> Result<(u16, String), ProbeError> {
    let addr = request.authority();
    let connection_error = |message: String| ProbeError::Connection {
        addr: addr.clone(),
        message,
    };

    let stream = TcpStream::connect(&addr)
        .await
        .map_err(|e| connection_error(e.to_string()))?;
    let io = TokioIo::new(stream);

    let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
        .await
        .map_err(|e| connection_error(format!("HTTP handshake failed: {e}")))?;

    tokio::spawn(async move {
        if let Err(e) = conn.await {
            tracing::debug!("probe connection closed: {}", e);
        }
    });

    let mut builder = hyper::Request::builder()
        .method(request.method.clone())
        .uri(&request.path)
        .header(hyper::header::HOST, &addr);
    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    let req = builder
        .body(Full::new(request.body.clone().unwrap_or_else(Bytes::new)))
        .map_err(|e| ProbeError::InvalidRequest(e.to_string()))?;

    let resp = sender.send_request(req).await.map_err(|e| {
        if e.is_parse() {
            ProbeError::Protocol {
                addr: addr.clone(),
                message: e.to_string(),
            }
        } else {
            connection_error(format!("request failed: {e}"))
        }
    })?;

    let status = resp.status().as_u16();
    let body = resp
        .into_body()
        .collect()
        .await
        .map_err(|e| connection_error(format!("failed to read response: {e}")))?
        .to_bytes();

    Ok((status, String::from_utf8_lossy(&body).into_owned()))
}
