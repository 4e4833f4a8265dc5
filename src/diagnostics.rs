// ABOUTME: Diagnostics accumulator for non-fatal warnings during a lifecycle run.
// ABOUTME: Collects cleanup problems that must be reported but never fail the run.

use serde::Serialize;

/// Collects non-fatal warnings during a run.
#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    /// Record a warning, auto-logging it via tracing.
    pub fn warn(&mut self, warning: Warning) {
        tracing::warn!("{}", warning.message);
        self.warnings.push(warning);
    }

    /// Get all collected warnings.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Check if any warnings were collected.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn into_warnings(self) -> Vec<Warning> {
        self.warnings
    }
}

/// A non-fatal warning collected during a run.
#[derive(Debug, Clone, Serialize)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    /// Stopping the container failed for a reason other than it already being stopped.
    pub fn stop_failed(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::StopFailed,
            message: message.into(),
        }
    }

    /// Removing the container failed; it may still exist.
    pub fn remove_failed(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::RemoveFailed,
            message: message.into(),
        }
    }

    pub fn image_remove_failed(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::ImageRemoveFailed,
            message: message.into(),
        }
    }

    /// Reading container output for the report failed.
    pub fn logs_unavailable(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::LogsUnavailable,
            message: message.into(),
        }
    }
}

/// Categories of warnings that can occur during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    StopFailed,
    RemoveFailed,
    ImageRemoveFailed,
    LogsUnavailable,
}
