// ABOUTME: HTTP probes against services running inside containers.
// ABOUTME: One-shot or retried until a deadline, with cancellation.

mod client;
mod error;
mod request;

pub use client::{DEFAULT_BACKOFF, ProbeClient};
pub use error::ProbeError;
pub use request::{ProbeRequest, ProbeResult};
