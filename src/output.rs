// ABOUTME: Output formatting for CLI feedback.
// ABOUTME: Supports normal, quiet (CI), and JSON output modes for run reports.

use std::str::FromStr;
use std::time::Instant;

use serde::Serialize;

use crate::lifecycle::RunReport;

/// Output mode for CLI feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Human-friendly output with progress messages
    #[default]
    Normal,
    /// Minimal output for CI (only final results)
    Quiet,
    /// JSON lines for scripting
    Json,
}

impl FromStr for OutputMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(OutputMode::Normal),
            "quiet" => Ok(OutputMode::Quiet),
            "json" => Ok(OutputMode::Json),
            other => Err(format!(
                "unknown output mode '{other}' (expected normal, quiet, or json)"
            )),
        }
    }
}

/// Handles CLI output based on the configured mode.
pub struct Output {
    mode: OutputMode,
    start_time: Instant,
}

impl Output {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            start_time: Instant::now(),
        }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Seconds since this output was created.
    pub fn elapsed_secs(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64()
    }

    /// Print a section heading (normal mode only).
    pub fn section(&self, title: &str) {
        if self.mode == OutputMode::Normal {
            println!();
            println!("== {title} ==");
        }
    }

    /// Print a progress message (suppressed in quiet/json mode).
    pub fn progress(&self, message: &str) {
        if self.mode == OutputMode::Normal {
            println!("{message}");
        }
    }

    /// Print an informational block, indented, in normal mode.
    pub fn block(&self, text: &str) {
        if self.mode == OutputMode::Normal {
            for line in text.lines() {
                println!("    {line}");
            }
        }
    }

    /// Print the outcome of one lifecycle run.
    pub fn report(&self, report: &RunReport) {
        match self.mode {
            OutputMode::Normal => self.report_normal(report),
            OutputMode::Quiet => {
                let verdict = if report.is_success() { "ok" } else { "FAILED" };
                println!("{}: {verdict}", report.label);
                if let Some(err) = report.error() {
                    eprintln!("Error: {}: {err}", report.label);
                }
            }
            OutputMode::Json => {
                let event = JsonEvent {
                    event: "run",
                    message: None,
                    duration_secs: None,
                    run: Some(report.summary()),
                };
                emit(&event, report.is_success());
            }
        }
    }

    fn report_normal(&self, report: &RunReport) {
        if let Some(container) = &report.container {
            println!(
                "  container {} ({}) ended {}",
                container.label(),
                container.id.short(),
                container.status
            );
        }
        if let Some(image) = &report.image {
            println!("  image {} ({})", image.primary_tag(), image.id.short());
        }
        for line in &report.build_log {
            println!("  | {line}");
        }
        if let Some(output) = &report.output {
            println!("  output:");
            for line in output.lines() {
                println!("    {line}");
            }
        }
        if let Some(probe) = &report.probe {
            println!(
                "  probe: HTTP {} after {} attempt(s) in {:.0?}",
                probe.status, probe.attempts, probe.elapsed
            );
        }
        for warning in &report.warnings {
            eprintln!("  warning: {}", warning.message);
        }
        match report.error() {
            None => println!(
                "  ✓ {} succeeded ({:.1}s)",
                report.label,
                report.elapsed.as_secs_f64()
            ),
            Some(err) => eprintln!("  ✗ {} failed: {err}", report.label),
        }
    }

    /// Print the final verdict with overall timing.
    pub fn success(&self, message: &str) {
        match self.mode {
            OutputMode::Normal => println!("{message} ({:.1}s)", self.elapsed_secs()),
            OutputMode::Quiet => println!("{message}"),
            OutputMode::Json => emit(&self.event("success", message), true),
        }
    }

    /// Print an error message.
    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => eprintln!("Error: {message}"),
            OutputMode::Json => emit(&self.event("error", message), false),
        }
    }

    fn event<'a>(&self, event: &'a str, message: &'a str) -> JsonEvent<'a> {
        JsonEvent {
            event,
            message: Some(message),
            duration_secs: Some(self.elapsed_secs()),
            run: None,
        }
    }
}

fn emit(event: &JsonEvent<'_>, to_stdout: bool) {
    if let Ok(json) = serde_json::to_string(event) {
        if to_stdout {
            println!("{json}");
        } else {
            eprintln!("{json}");
        }
    }
}

#[derive(Serialize)]
struct JsonEvent<'a> {
    event: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_secs: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    run: Option<crate::lifecycle::RunSummary<'a>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_modes() {
        assert_eq!("json".parse::<OutputMode>().unwrap(), OutputMode::Json);
        assert_eq!("quiet".parse::<OutputMode>().unwrap(), OutputMode::Quiet);
        assert!("loud".parse::<OutputMode>().is_err());
    }

    #[test]
    fn error_event_omits_run() {
        let output = Output::new(OutputMode::Json);
        let json = serde_json::to_value(output.event("error", "boom")).unwrap();
        assert_eq!(json["event"], "error");
        assert_eq!(json["message"], "boom");
        assert!(json.get("run").is_none());
    }
}
