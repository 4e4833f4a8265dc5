// ABOUTME: Thin wrapper around the docker/podman command-line binary.
// ABOUTME: Runs a subcommand, captures its output, and reports failures with stderr.

use super::types::RuntimeType;
use std::process::Stdio;
use tokio::process::Command;

/// Captured output of a successful CLI invocation.
#[derive(Debug, Clone)]
pub struct CliOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Errors from running the runtime CLI.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0} is not installed or not on PATH")]
    NotInstalled(String),

    #[error("`{command}` exited with {}: {stderr}", describe_exit(.exit_code))]
    Failed {
        command: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("failed to run {0}: {1}")]
    Io(String, #[source] std::io::Error),
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "a signal".to_string(),
    }
}

/// Runs subcommands of the runtime's CLI binary.
#[derive(Debug, Clone)]
pub struct RuntimeCli {
    binary: String,
}

impl RuntimeCli {
    /// Use the CLI matching `runtime` (`docker` or `podman`).
    pub fn for_runtime(runtime: RuntimeType) -> Self {
        Self::new(runtime.cli_binary())
    }

    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Run `binary args...` and return its output, failing on non-zero exit.
    pub async fn run(&self, args: &[&str]) -> Result<CliOutput, CliError> {
        let command = format!("{} {}", self.binary, args.join(" "));
        tracing::debug!(%command, "running runtime CLI");

        let output = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => CliError::NotInstalled(self.binary.clone()),
                _ => CliError::Io(self.binary.clone(), e),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        if !output.status.success() {
            return Err(CliError::Failed {
                command,
                exit_code: output.status.code(),
                stderr,
            });
        }

        Ok(CliOutput { stdout, stderr })
    }

    /// `docker --version`
    pub async fn version(&self) -> Result<String, CliError> {
        self.run(&["--version"]).await.map(|o| o.stdout)
    }

    /// `docker ps -a`
    pub async fn list_containers(&self) -> Result<String, CliError> {
        self.run(&["ps", "-a"]).await.map(|o| o.stdout)
    }

    /// `docker images`
    pub async fn list_images(&self) -> Result<String, CliError> {
        self.run(&["images"]).await.map(|o| o.stdout)
    }
}
