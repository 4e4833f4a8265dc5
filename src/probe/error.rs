// ABOUTME: Error types for HTTP probes.
// ABOUTME: Separates retryable connection failures from final outcomes.

use std::time::Duration;

/// Errors from probing an endpoint.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    /// Refused, reset, or failed handshake.
    #[error("connection to {addr} failed: {message}")]
    Connection { addr: String, message: String },

    /// A single attempt ran past its timeout.
    #[error("probe attempt timed out after {0:?}")]
    AttemptTimeout(Duration),

    /// Retries ran out before the deadline.
    #[error("probe gave up after {attempts} attempt(s) in {elapsed:?}: {last}")]
    ProbeTimeout {
        attempts: u32,
        elapsed: Duration,
        last: String,
    },

    /// The server answered with something that is not HTTP.
    #[error("invalid response from {addr}: {message}")]
    Protocol { addr: String, message: String },

    #[error("invalid probe request: {0}")]
    InvalidRequest(String),

    #[error("probe cancelled")]
    Cancelled,
}

impl ProbeError {
    /// Failures worth another attempt while the deadline allows.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProbeError::Connection { .. } | ProbeError::AttemptTimeout(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_connection_level_failures_are_retryable() {
        let refused = ProbeError::Connection {
            addr: "127.0.0.1:1".to_string(),
            message: "connection refused".to_string(),
        };
        assert!(refused.is_retryable());
        assert!(ProbeError::AttemptTimeout(Duration::from_secs(1)).is_retryable());

        assert!(!ProbeError::Cancelled.is_retryable());
        assert!(!ProbeError::InvalidRequest("bad".to_string()).is_retryable());
        assert!(
            !ProbeError::Protocol {
                addr: "127.0.0.1:1".to_string(),
                message: "garbage".to_string(),
            }
            .is_retryable()
        );
    }
}
