// ABOUTME: Final outcome of a lifecycle run.
// ABOUTME: Primary result plus cleanup warnings, and a serializable summary.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::diagnostics::Warning;
use crate::probe::ProbeResult;
use crate::runtime::{ContainerHandle, ImageHandle};

use super::error::{LifecycleError, LifecycleErrorKind};
use super::machine::RunRecord;

/// What one run did and how it ended.
///
/// `outcome` is the first failure, if any. Cleanup problems never change it;
/// they are listed in `warnings`.
#[derive(Debug)]
pub struct RunReport {
    pub label: String,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
    pub outcome: Result<(), LifecycleError>,
    /// Final handle, if a container was created.
    pub container: Option<ContainerHandle>,
    pub image: Option<ImageHandle>,
    pub build_log: Vec<String>,
    pub output: Option<String>,
    pub probe: Option<ProbeResult>,
    pub warnings: Vec<Warning>,
}

impl RunReport {
    pub(crate) fn new(
        record: RunRecord,
        container: Option<ContainerHandle>,
        outcome: Result<(), LifecycleError>,
        warnings: Vec<Warning>,
        started_at: DateTime<Utc>,
        elapsed: Duration,
    ) -> Self {
        Self {
            label: record.plan.label,
            started_at,
            elapsed,
            outcome,
            container,
            image: record.image,
            build_log: record.build_log,
            output: record.output,
            probe: record.probe,
            warnings,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn error(&self) -> Option<&LifecycleError> {
        self.outcome.as_ref().err()
    }

    /// Process exit code for this outcome.
    pub fn exit_code(&self) -> i32 {
        if self.is_success() { 0 } else { 1 }
    }

    pub fn summary(&self) -> RunSummary<'_> {
        RunSummary {
            label: &self.label,
            success: self.is_success(),
            error: self.error().map(ToString::to_string),
            error_kind: self.error().map(LifecycleError::kind),
            started_at: self.started_at,
            elapsed_ms: self.elapsed.as_millis() as u64,
            container: self.container.as_ref(),
            image: self.image.as_ref(),
            probe_status: self.probe.as_ref().map(|p| p.status),
            output: self.output.as_deref(),
            warnings: &self.warnings,
        }
    }
}

/// JSON view of a [`RunReport`].
#[derive(Debug, Serialize)]
pub struct RunSummary<'a> {
    pub label: &'a str,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<LifecycleErrorKind>,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container: Option<&'a ContainerHandle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<&'a ImageHandle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probe_status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<&'a str>,
    #[serde(skip_serializing_if = "<[Warning]>::is_empty")]
    pub warnings: &'a [Warning],
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::RunPlan;
    use crate::runtime::{ContainerSpec, ContainerStatus};
    use crate::types::{ContainerId, ImageRef};

    fn record() -> RunRecord {
        let spec = ContainerSpec::new(ImageRef::parse("alpine").unwrap());
        RunRecord {
            plan: RunPlan::new("echo", spec),
            image: None,
            build_log: Vec::new(),
            output: Some("hi\n".to_string()),
            probe: None,
        }
    }

    #[test]
    fn failure_summary_carries_kind() {
        let report = RunReport::new(
            record(),
            None,
            Err(LifecycleError::ImageNotFound("nope:latest".to_string())),
            Vec::new(),
            Utc::now(),
            Duration::from_millis(12),
        );

        assert!(!report.is_success());
        assert_eq!(report.exit_code(), 1);

        let json = serde_json::to_value(report.summary()).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error_kind"], "image_not_found");
        assert!(json.get("warnings").is_none());
    }

    #[test]
    fn success_with_warnings_is_still_success() {
        let mut handle = ContainerHandle::new(ContainerId::new("abc"), "echo");
        handle.advance(ContainerStatus::Exited).unwrap();

        let report = RunReport::new(
            record(),
            Some(handle),
            Ok(()),
            vec![Warning::remove_failed("remove refused")],
            Utc::now(),
            Duration::from_millis(5),
        );

        assert!(report.is_success());
        assert_eq!(report.exit_code(), 0);

        let json = serde_json::to_value(report.summary()).unwrap();
        assert_eq!(json["container"]["status"], "exited");
        assert_eq!(json["output"], "hi\n");
        assert_eq!(json["warnings"][0]["kind"], "remove_failed");
    }
}
