// ABOUTME: Log operations trait for container runtimes.
// ABOUTME: Stream container logs or read the tail as text.

use super::sealed::Sealed;
use crate::types::ContainerId;
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use std::pin::Pin;

/// Boxed stream of container log lines.
pub type LogLines = Pin<Box<dyn Stream<Item = Result<LogLine, LogError>> + Send>>;

/// Log streaming operations.
#[async_trait]
pub trait LogOps: Sealed + Send + Sync {
    /// Stream logs from a container.
    async fn container_logs(
        &self,
        id: &ContainerId,
        opts: &LogOptions,
    ) -> Result<LogLines, LogError>;

    /// Read stdout and stderr as one string, optionally only the last `tail`
    /// lines.
    async fn logs(&self, id: &ContainerId, tail: Option<u64>) -> Result<String, LogError> {
        let mut stream = self.container_logs(id, &LogOptions::snapshot(tail)).await?;
        let mut text = String::new();
        while let Some(line) = stream.next().await {
            text.push_str(&line?.content);
        }
        Ok(text)
    }
}

/// Which output to read and how much of it.
#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    /// Include stdout.
    pub stdout: bool,
    /// Include stderr.
    pub stderr: bool,
    /// Keep the stream open until the container exits.
    pub follow: bool,
    /// Number of lines to show from the end (`None` = all).
    pub tail: Option<u64>,
}

impl LogOptions {
    /// Both streams as they are now, without following.
    pub fn snapshot(tail: Option<u64>) -> Self {
        Self {
            stdout: true,
            stderr: true,
            follow: false,
            tail,
        }
    }
}

/// A chunk of container output, usually one line with its newline.
#[derive(Debug, Clone)]
pub struct LogLine {
    pub content: String,
    pub stream: LogStream,
}

/// Log stream type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStream {
    Stdout,
    Stderr,
}

/// Errors from log operations.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("container not found: {0}")]
    ContainerNotFound(String),

    #[error("stream error: {0}")]
    StreamError(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}
